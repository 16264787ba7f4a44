//! In-process actor channel.
//!
//! Publishing fans out to every subscriber registered at publish time, so a
//! message published before `subscribe()` is not seen by that subscriber.

use std::sync::Arc;
use std::time::Duration;

use actorlens_events::{encode_actor_message, ActorEvent, DecodeError};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::{ActorSubscriber, ChannelError, RawMessage};

/// Maximum messages returned by one poll.
const MAX_POLL_BATCH: usize = 256;

#[derive(Debug, Default)]
struct BrokerInner {
    subscribers: Vec<mpsc::UnboundedSender<RawMessage>>,
    injected_failures: usize,
}

/// In-process broker for the actor channel.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Mutex<BrokerInner>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a subscriber bound to this broker. It receives nothing until
    /// [`ActorSubscriber::subscribe`] is called.
    pub fn subscriber(&self) -> MemorySubscriber {
        MemorySubscriber {
            broker: self.clone(),
            rx: None,
        }
    }

    /// Publishes a raw message; returns how many subscribers received it.
    pub async fn publish(&self, key: impl Into<String>, payload: Option<Bytes>) -> usize {
        let message = RawMessage::new(key, payload);
        let mut inner = self.inner.lock().await;
        inner
            .subscribers
            .retain(|tx| tx.send(message.clone()).is_ok());
        inner.subscribers.len()
    }

    /// Encodes and publishes an actor event.
    pub async fn publish_event(&self, event: &ActorEvent) -> Result<usize, DecodeError> {
        let (key, payload) = encode_actor_message(event)?;
        Ok(self.publish(key, Some(Bytes::from(payload))).await)
    }

    /// Publishes a heartbeat (absent payload).
    pub async fn publish_heartbeat(&self, key: impl Into<String>) -> usize {
        self.publish(key, None).await
    }

    /// Makes the next `count` polls (across all subscribers) fail transiently.
    pub async fn fail_next_polls(&self, count: usize) {
        self.inner.lock().await.injected_failures = count;
    }

    /// Number of live subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    async fn take_injected_failure(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.injected_failures == 0 {
            return false;
        }
        inner.injected_failures -= 1;
        true
    }

    async fn register(&self) -> mpsc::UnboundedReceiver<RawMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().await.subscribers.push(tx);
        rx
    }
}

/// Subscriber side of a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemorySubscriber {
    broker: MemoryBroker,
    rx: Option<mpsc::UnboundedReceiver<RawMessage>>,
}

#[async_trait]
impl ActorSubscriber for MemorySubscriber {
    async fn subscribe(&mut self) -> Result<(), ChannelError> {
        if self.rx.is_none() {
            self.rx = Some(self.broker.register().await);
            debug!("memory subscriber registered");
        }
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, ChannelError> {
        if self.broker.take_injected_failure().await {
            return Err(ChannelError::Transient("injected failure".to_string()));
        }

        let Some(rx) = self.rx.as_mut() else {
            return Err(ChannelError::NotSubscribed);
        };

        let first = match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                self.rx = None;
                return Err(ChannelError::Closed("broker dropped subscription".to_string()));
            }
            Err(_) => return Ok(Vec::new()),
        };

        let mut batch = vec![first];
        while batch.len() < MAX_POLL_BATCH {
            match rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }
        Ok(batch)
    }

    async fn close(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            debug!("memory subscriber closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_publish_before_subscribe_is_not_delivered() {
        let broker = MemoryBroker::new();
        let mut sub = broker.subscriber();

        assert_eq!(broker.publish("a", None).await, 0);
        sub.subscribe().await.unwrap();
        assert!(sub.poll(POLL).await.unwrap().is_empty());

        assert_eq!(broker.publish("b", Some(Bytes::from_static(b"{}"))).await, 1);
        let batch = sub.poll(POLL).await.unwrap();
        assert_eq!(batch, vec![RawMessage::new("b", Some(Bytes::from_static(b"{}")))]);
    }

    #[tokio::test]
    async fn test_poll_before_subscribe_errors() {
        let broker = MemoryBroker::new();
        let mut sub = broker.subscriber();
        assert_eq!(sub.poll(POLL).await, Err(ChannelError::NotSubscribed));
    }

    #[tokio::test]
    async fn test_poll_batches_in_order() {
        let broker = MemoryBroker::new();
        let mut sub = broker.subscriber();
        sub.subscribe().await.unwrap();

        for key in ["1", "2", "3"] {
            broker.publish_heartbeat(key).await;
        }

        let keys: Vec<String> = sub
            .poll(POLL)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let broker = MemoryBroker::new();
        let mut sub = broker.subscriber();
        sub.subscribe().await.unwrap();
        broker.fail_next_polls(1).await;

        assert!(matches!(
            sub.poll(POLL).await,
            Err(ChannelError::Transient(_))
        ));
        assert!(sub.poll(POLL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_releases_subscription() {
        let broker = MemoryBroker::new();
        let mut sub = broker.subscriber();
        sub.subscribe().await.unwrap();
        assert_eq!(broker.subscriber_count().await, 1);

        sub.close().await;
        sub.close().await;
        assert_eq!(broker.subscriber_count().await, 0);
    }
}
