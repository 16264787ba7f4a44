//! Long-polling client for an HTTP actor channel broker.
//!
//! Broker endpoints:
//! - `POST   {base}/v1/channels/actor/subscriptions` → `{"subscription_id": "..."}`
//! - `GET    {base}/v1/channels/actor/subscriptions/{id}/messages?timeout_ms=N`
//!   → `{"items": [{"key": "...", "payload": {...} | null}]}`
//! - `DELETE {base}/v1/channels/actor/subscriptions/{id}`

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ActorSubscriber, ChannelError, RawMessage};

/// Extra time allowed on top of the long-poll timeout for the HTTP round trip.
const POLL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct SubscribeResponse {
    subscription_id: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    items: Vec<MessageItem>,
}

#[derive(Debug, Deserialize)]
struct MessageItem {
    key: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

/// Actor channel subscriber over HTTP long-polling.
#[derive(Debug)]
pub struct HttpSubscriber {
    client: reqwest::Client,
    base_url: String,
    subscription_id: Option<String>,
}

impl HttpSubscriber {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("actorlens-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ChannelError::Transient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            subscription_id: None,
        })
    }

    fn subscriptions_url(&self) -> String {
        format!("{}/v1/channels/actor/subscriptions", self.base_url)
    }
}

async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("status={status}: {body}")
}

#[async_trait]
impl ActorSubscriber for HttpSubscriber {
    async fn subscribe(&mut self) -> Result<(), ChannelError> {
        if self.subscription_id.is_some() {
            return Ok(());
        }

        let resp = self
            .client
            .post(self.subscriptions_url())
            .send()
            .await
            .map_err(|e| ChannelError::Transient(format!("subscribe request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChannelError::Transient(format!(
                "subscribe rejected ({})",
                error_body(resp).await
            )));
        }

        let body: SubscribeResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::Transient(format!("invalid subscribe response: {e}")))?;

        info!(
            subscription_id = %body.subscription_id,
            broker = %self.base_url,
            "subscribed to actor channel"
        );
        self.subscription_id = Some(body.subscription_id);
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, ChannelError> {
        let Some(subscription_id) = self.subscription_id.clone() else {
            return Err(ChannelError::NotSubscribed);
        };

        let url = format!("{}/{subscription_id}/messages", self.subscriptions_url());
        let resp = self
            .client
            .get(url)
            .query(&[("timeout_ms", timeout.as_millis() as u64)])
            .timeout(timeout + POLL_GRACE)
            .send()
            .await
            .map_err(|e| ChannelError::Transient(format!("poll request failed: {e}")))?;

        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                self.subscription_id = None;
                return Err(ChannelError::Closed(error_body(resp).await));
            }
            _ => {
                return Err(ChannelError::Transient(format!(
                    "poll failed ({})",
                    error_body(resp).await
                )));
            }
        }

        let body: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::Transient(format!("invalid poll response: {e}")))?;

        body.items
            .into_iter()
            .map(|item| {
                let payload = match item.payload {
                    None | Some(serde_json::Value::Null) => None,
                    Some(value) => Some(Bytes::from(serde_json::to_vec(&value).map_err(
                        |e| ChannelError::Transient(format!("failed to re-encode payload: {e}")),
                    )?)),
                };
                Ok(RawMessage::new(item.key, payload))
            })
            .collect()
    }

    async fn close(&mut self) {
        let Some(subscription_id) = self.subscription_id.take() else {
            return;
        };

        let url = format!("{}/{subscription_id}", self.subscriptions_url());
        match self.client.delete(url).send().await {
            Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND => {
                debug!(subscription_id = %subscription_id, "actor channel subscription released");
            }
            Ok(resp) => {
                warn!(
                    subscription_id = %subscription_id,
                    status = %resp.status(),
                    "broker refused to release subscription"
                );
            }
            Err(e) => {
                warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "failed to release subscription"
                );
            }
        }
    }
}
