//! The aggregator loop: the only writer to the actor view.
//!
//! Decoded events arrive from the subscriber worker over a bounded mpsc
//! channel and are applied one at a time. On shutdown the loop keeps
//! receiving until the subscriber worker has finished its last poll and
//! dropped its sender, so nothing it already read from the channel is lost.
//! `drain_timeout` bounds that wait; once it passes the receiver is closed
//! and only what is already queued gets applied.

use std::time::Duration;

use actorlens_events::{ActorEvent, Address};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::subscriber::{
    ActorSubscriber, Readiness, SubscriberConfig, SubscriberStats, SubscriberWorker,
};
use crate::view::{ActorWriter, ApplyOutcome, ViewError};

/// Configuration for the aggregator loop.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// How often to log progress (in events applied).
    pub log_interval: u64,
    /// How long to wait for the subscriber to hang up after shutdown.
    pub drain_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            log_interval: 1000,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub received: u64,
    pub applied: u64,
    pub stale: u64,
    pub evicted: u64,
    pub errors: u64,
}

/// Single consumer of decoded actor events.
pub struct Aggregator {
    writer: ActorWriter,
    config: AggregatorConfig,
    stats: AggregatorStats,
}

impl Aggregator {
    pub fn new(writer: ActorWriter, config: AggregatorConfig) -> Self {
        Self {
            writer,
            config,
            stats: AggregatorStats::default(),
        }
    }

    /// Run until shutdown or until every sender is dropped.
    #[instrument(skip_all, name = "aggregator")]
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<ActorEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> AggregatorStats {
        info!("Starting aggregator loop");

        let drain = sleep(self.config.drain_timeout);
        tokio::pin!(drain);
        let mut draining = false;

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed(), if !draining => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, waiting for subscriber to hang up");
                        drain.as_mut().reset(Instant::now() + self.config.drain_timeout);
                        draining = true;
                    }
                }
                event = rx.recv() => {
                    match event {
                        Some(event) => self.apply(&event).await,
                        None => break,
                    }
                }
                _ = &mut drain, if draining => {
                    warn!(
                        timeout_ms = self.config.drain_timeout.as_millis() as u64,
                        "Subscriber still attached after drain timeout, closing event channel"
                    );
                    rx.close();
                    while let Some(event) = rx.recv().await {
                        self.apply(&event).await;
                    }
                    break;
                }
            }
        }

        info!(
            received = self.stats.received,
            applied = self.stats.applied,
            stale = self.stats.stale,
            evicted = self.stats.evicted,
            errors = self.stats.errors,
            "Aggregator loop stopped"
        );
        self.stats
    }

    async fn apply(&mut self, event: &ActorEvent) {
        self.stats.received += 1;

        match self.writer.apply(event).await {
            Ok(ApplyOutcome::Applied {
                created,
                state,
                changed,
                evicted,
            }) => {
                self.stats.applied += 1;
                debug!(
                    actor_id = %event.actor_id,
                    state = %state,
                    created,
                    changed = ?changed,
                    fields = ?event.update.present_fields(),
                    node = ?event.update.address.as_ref().and_then(Address::placed_node),
                    "Applied actor event"
                );
                if let Some(evicted) = evicted {
                    self.stats.evicted += 1;
                    debug!(actor_id = %evicted, "Evicted oldest dead actor");
                }
            }
            Ok(ApplyOutcome::Stale) => {
                self.stats.stale += 1;
            }
            Err(e @ ViewError::CapacityViolation { .. }) => {
                self.stats.errors += 1;
                error!(actor_id = %event.actor_id, error = %e, "Dead actor cache invariant violated");
            }
        }

        if self.config.log_interval > 0 && self.stats.received % self.config.log_interval == 0 {
            info!(
                received = self.stats.received,
                applied = self.stats.applied,
                stale = self.stats.stale,
                "Aggregator progress"
            );
        }
    }
}

/// Handles for the two ingestion tasks.
pub struct Ingestion {
    pub subscriber: JoinHandle<SubscriberStats>,
    pub aggregator: JoinHandle<AggregatorStats>,
}

impl Ingestion {
    /// Waits for both tasks, giving each at most `timeout`.
    pub async fn join(self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.subscriber).await {
            Ok(Ok(stats)) => debug!(forwarded = stats.forwarded, "Subscriber task joined"),
            Ok(Err(e)) => error!(error = %e, "Subscriber task panicked"),
            Err(_) => warn!("Subscriber worker did not shut down in time"),
        }
        match tokio::time::timeout(timeout, self.aggregator).await {
            Ok(Ok(stats)) => debug!(applied = stats.applied, "Aggregator task joined"),
            Ok(Err(e)) => error!(error = %e, "Aggregator task panicked"),
            Err(_) => warn!("Aggregator did not shut down in time"),
        }
    }
}

/// Wires a subscriber to the view writer and spawns both halves.
pub fn spawn_ingestion<S>(
    subscriber: S,
    writer: ActorWriter,
    readiness: Readiness,
    event_buffer: usize,
    subscriber_config: SubscriberConfig,
    aggregator_config: AggregatorConfig,
    shutdown: watch::Receiver<bool>,
) -> Ingestion
where
    S: ActorSubscriber + 'static,
{
    let (tx, rx) = mpsc::channel(event_buffer.max(1));

    let worker = SubscriberWorker::new(subscriber, tx, readiness, subscriber_config);
    let aggregator = Aggregator::new(writer, aggregator_config);

    Ingestion {
        subscriber: tokio::spawn(worker.run(shutdown.clone())),
        aggregator: tokio::spawn(aggregator.run(rx, shutdown)),
    }
}
