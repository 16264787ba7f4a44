//! Aggregated in-memory view of all known actors.
//!
//! The view is split into a single [`ActorWriter`] (owned by the aggregator
//! loop) and any number of cloneable [`ActorView`] read handles. Both share
//! one `RwLock<ActorTables>`:
//!
//! - the writer holds the write lock only while applying one event, so a
//!   reader never sees a half-applied event across store, cache and index
//! - readers hold the read lock only long enough to copy results out

mod dead_cache;
mod node_index;
mod record;
mod store;
mod tables;

use std::collections::BTreeMap;
use std::sync::Arc;

use actorlens_events::{ActorEvent, ActorState};
use actorlens_id::{ActorId, JobId, NodeId};
use tokio::sync::RwLock;

pub use dead_cache::{DeadActorCache, DEFAULT_MAX_DEAD_ACTORS};
pub use node_index::NodeIndex;
pub use record::ActorRecord;
pub use store::{RecordStore, Upserted};
pub use tables::{ActorTables, ApplyOutcome, ViewStats};

/// Result type for view operations.
pub type ViewResult<T> = Result<T, ViewError>;

/// Errors raised while applying events to the view.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// The dead-actor cache holds more entries than its capacity.
    #[error("dead actor cache holds {size} entries, capacity is {capacity}")]
    CapacityViolation { size: usize, capacity: usize },
}

/// Optional filters for actor listings. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorFilter {
    pub job_id: Option<JobId>,
    pub state: Option<ActorState>,
    pub node_id: Option<NodeId>,
}

impl ActorFilter {
    pub fn is_empty(&self) -> bool {
        self.job_id.is_none() && self.state.is_none() && self.node_id.is_none()
    }

    pub fn matches(&self, record: &ActorRecord) -> bool {
        if let Some(job_id) = &self.job_id {
            if record.job_id.as_ref() != Some(job_id) {
                return false;
            }
        }
        if let Some(state) = self.state {
            if record.state != state {
                return false;
            }
        }
        if let Some(node_id) = &self.node_id {
            if node_id.is_nil() || &record.address.node_id != node_id {
                return false;
            }
        }
        true
    }
}

/// Creates an empty view, returning its only writer and a read handle.
pub fn new_view(max_dead_actors: usize) -> (ActorWriter, ActorView) {
    let tables = Arc::new(RwLock::new(ActorTables::new(max_dead_actors)));
    (
        ActorWriter {
            tables: Arc::clone(&tables),
        },
        ActorView { tables },
    )
}

/// Exclusive write access to the view. Not `Clone`.
#[derive(Debug)]
pub struct ActorWriter {
    tables: Arc<RwLock<ActorTables>>,
}

impl ActorWriter {
    /// Applies one event atomically with respect to readers.
    pub async fn apply(&mut self, event: &ActorEvent) -> ViewResult<ApplyOutcome> {
        let mut tables = self.tables.write().await;
        tables.apply(event)
    }

    /// Returns a read handle onto the same view.
    pub fn view(&self) -> ActorView {
        ActorView {
            tables: Arc::clone(&self.tables),
        }
    }
}

/// Read-only handle onto the view. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ActorView {
    tables: Arc<RwLock<ActorTables>>,
}

impl ActorView {
    /// Point-in-time copy of the actors matching `filter`.
    pub async fn list_actors(&self, filter: &ActorFilter) -> BTreeMap<ActorId, ActorRecord> {
        self.tables.read().await.list(filter)
    }

    pub async fn get_actor(&self, actor_id: &ActorId) -> Option<ActorRecord> {
        self.tables.read().await.get(actor_id).cloned()
    }

    /// Node-keyed index; never contains the sentinel node.
    pub async fn node_actors(&self) -> BTreeMap<NodeId, Vec<ActorId>> {
        self.tables.read().await.node_actors()
    }

    pub async fn dead_actors(&self) -> Vec<ActorId> {
        self.tables.read().await.dead_actors()
    }

    pub async fn stats(&self) -> ViewStats {
        self.tables.read().await.stats()
    }

    pub async fn actor_count(&self) -> usize {
        self.tables.read().await.len()
    }
}
