//! Actor channel subscription.
//!
//! Transports implement [`ActorSubscriber`]; the [`SubscriberWorker`] drives
//! one of them, decodes every message and forwards the decoded events to the
//! aggregator loop over an mpsc channel.

mod backoff;
pub mod http;
pub mod memory;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub use backoff::BackoffPolicy;
pub use http::HttpSubscriber;
pub use memory::{MemoryBroker, MemorySubscriber};
pub use worker::{SubscriberConfig, SubscriberStats, SubscriberWorker};

/// One undecoded message from the actor channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Hex actor id.
    pub key: String,
    /// JSON actor record, or `None` for heartbeats/tombstones.
    pub payload: Option<Bytes>,
}

impl RawMessage {
    pub fn new(key: impl Into<String>, payload: Option<Bytes>) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

/// Channel-level failures.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Connection hiccup; retry after backoff.
    #[error("transient channel error: {0}")]
    Transient(String),

    /// The subscription is gone and must be re-established.
    #[error("subscription closed: {0}")]
    Closed(String),

    /// `poll` was called before `subscribe`.
    #[error("not subscribed")]
    NotSubscribed,
}

impl ChannelError {
    /// Returns true if the subscription must be re-established.
    pub fn needs_resubscribe(&self) -> bool {
        matches!(self, ChannelError::Closed(_) | ChannelError::NotSubscribed)
    }
}

/// A connection to the actor channel.
#[async_trait]
pub trait ActorSubscriber: Send {
    /// Registers interest in the channel. Messages published after this
    /// returns are delivered to subsequent polls.
    async fn subscribe(&mut self) -> Result<(), ChannelError>;

    /// Waits up to `timeout` for messages. An empty result means timeout.
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, ChannelError>;

    /// Releases the subscription. Must be safe to call more than once.
    async fn close(&mut self);
}

#[async_trait]
impl<S: ActorSubscriber + ?Sized> ActorSubscriber for Box<S> {
    async fn subscribe(&mut self) -> Result<(), ChannelError> {
        (**self).subscribe().await
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, ChannelError> {
        (**self).poll(timeout).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}

/// Shared readiness flag: set once the subscriber holds a live subscription.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    subscribed: Arc<AtomicBool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_subscribed(&self, subscribed: bool) {
        self.subscribed.store(subscribed, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }
}
