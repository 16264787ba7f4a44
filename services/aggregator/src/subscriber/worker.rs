//! Subscriber worker: poll, decode, forward.
//!
//! The worker runs in a loop:
//! 1. Subscribe (retrying with backoff) and mark the service ready
//! 2. Poll the channel for up to `poll_timeout`
//! 3. Decode each message; heartbeats are skipped, bad messages are logged
//! 4. Forward decoded events to the aggregator, then repeat
//!
//! The shutdown signal is checked between polls. The subscription is released
//! on every exit path.

use std::time::Duration;

use actorlens_events::{decode_actor_message, ActorEvent};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, trace, warn};

use super::{ActorSubscriber, BackoffPolicy, ChannelError, Readiness};

/// Configuration for the subscriber worker.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Maximum time a single poll may block.
    pub poll_timeout: Duration,

    /// Reconnect backoff.
    pub backoff: BackoffPolicy,

    /// Consecutive failures after which warnings escalate to errors.
    pub escalate_after: u32,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(1000),
            backoff: BackoffPolicy::default(),
            escalate_after: 3,
        }
    }
}

/// Counters reported when the worker stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberStats {
    pub messages: u64,
    pub heartbeats: u64,
    pub decode_failures: u64,
    pub forwarded: u64,
    pub channel_errors: u64,
    pub resubscribes: u64,
}

enum Stop {
    Shutdown,
    AggregatorGone,
}

/// Drives an [`ActorSubscriber`] and feeds the aggregator.
pub struct SubscriberWorker<S> {
    subscriber: S,
    events: mpsc::Sender<ActorEvent>,
    readiness: Readiness,
    config: SubscriberConfig,
    stats: SubscriberStats,
}

impl<S: ActorSubscriber> SubscriberWorker<S> {
    pub fn new(
        subscriber: S,
        events: mpsc::Sender<ActorEvent>,
        readiness: Readiness,
        config: SubscriberConfig,
    ) -> Self {
        Self {
            subscriber,
            events,
            readiness,
            config,
            stats: SubscriberStats::default(),
        }
    }

    /// Run until shutdown, or until the aggregator stops receiving.
    ///
    /// Dropping the returned worker's event sender lets the aggregator drain
    /// and exit.
    #[instrument(skip(self, shutdown), name = "subscriber_worker")]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SubscriberStats {
        info!("Starting subscriber worker");

        let reason = self.run_inner(&mut shutdown).await;

        self.readiness.set_subscribed(false);
        self.subscriber.close().await;

        match reason {
            Stop::Shutdown => info!(
                messages = self.stats.messages,
                forwarded = self.stats.forwarded,
                decode_failures = self.stats.decode_failures,
                "Subscriber worker stopped"
            ),
            Stop::AggregatorGone if *shutdown.borrow() => warn!(
                messages = self.stats.messages,
                forwarded = self.stats.forwarded,
                "Aggregator closed the event channel during shutdown, subscriber worker exiting"
            ),
            Stop::AggregatorGone => error!(
                messages = self.stats.messages,
                "Aggregator stopped receiving events, subscriber worker exiting"
            ),
        }

        self.stats
    }

    async fn run_inner(&mut self, shutdown: &mut watch::Receiver<bool>) -> Stop {
        if !self.subscribe_with_retry(shutdown).await {
            return Stop::Shutdown;
        }

        let mut consecutive_failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("Shutdown signal received, stopping subscriber worker");
                return Stop::Shutdown;
            }

            let messages = match self.subscriber.poll(self.config.poll_timeout).await {
                Ok(messages) => {
                    consecutive_failures = 0;
                    messages
                }
                Err(e) => {
                    self.stats.channel_errors += 1;
                    self.log_failure(&e, consecutive_failures, "Actor channel poll failed");

                    if e.needs_resubscribe() {
                        self.readiness.set_subscribed(false);
                        self.stats.resubscribes += 1;
                    }

                    if !wait_or_shutdown(shutdown, self.config.backoff.delay(consecutive_failures))
                        .await
                    {
                        return Stop::Shutdown;
                    }
                    consecutive_failures = consecutive_failures.saturating_add(1);

                    if e.needs_resubscribe() && !self.subscribe_with_retry(shutdown).await {
                        return Stop::Shutdown;
                    }
                    continue;
                }
            };

            if messages.is_empty() {
                trace!("poll timed out with no messages");
                continue;
            }

            debug!(count = messages.len(), "Processing actor message batch");

            for message in messages {
                self.stats.messages += 1;

                match decode_actor_message(&message.key, message.payload.as_deref()) {
                    Ok(None) => {
                        self.stats.heartbeats += 1;
                        trace!(key = %message.key, "heartbeat");
                    }
                    Ok(Some(event)) => {
                        if self.events.send(event).await.is_err() {
                            return Stop::AggregatorGone;
                        }
                        self.stats.forwarded += 1;
                    }
                    Err(e) => {
                        self.stats.decode_failures += 1;
                        warn!(
                            key = %message.key,
                            error = %e,
                            "Dropping undecodable actor message"
                        );
                    }
                }
            }
        }
    }

    /// Returns false if shutdown was requested before a subscription was made.
    async fn subscribe_with_retry(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                return false;
            }

            match self.subscriber.subscribe().await {
                Ok(()) => {
                    self.readiness.set_subscribed(true);
                    info!(attempt, "Subscribed to actor channel");
                    return true;
                }
                Err(e) => {
                    self.stats.channel_errors += 1;
                    self.log_failure(&e, attempt, "Actor channel subscribe failed");
                }
            }

            if !wait_or_shutdown(shutdown, self.config.backoff.delay(attempt)).await {
                return false;
            }
            attempt = attempt.saturating_add(1);
        }
    }

    fn log_failure(&self, e: &ChannelError, failures: u32, msg: &str) {
        if failures < self.config.escalate_after {
            warn!(error = %e, consecutive_failures = failures + 1, "{msg}");
        } else {
            error!(error = %e, consecutive_failures = failures + 1, "{msg}");
        }
    }
}

/// Sleeps for `delay`; returns false if shutdown arrived first.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        changed = shutdown.changed() => {
            changed.is_ok() && !*shutdown.borrow()
        }
        _ = sleep(delay) => true,
    }
}
