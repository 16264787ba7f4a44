//! Record store: one record per actor identity.

use std::collections::{BTreeMap, HashMap};

use actorlens_events::ActorUpdate;
use actorlens_id::ActorId;

use super::record::ActorRecord;

/// Result of folding an update into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    /// True if this update created the record.
    pub created: bool,
    /// Fields whose stored value changed.
    pub changed: Vec<&'static str>,
}

/// Keyed mapping from actor identity to its latest known record.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: HashMap<ActorId, ActorRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up or creates the record for `actor_id` and folds `update` into it.
    pub fn upsert(&mut self, actor_id: ActorId, update: &ActorUpdate) -> Upserted {
        let mut created = false;
        let record = self.records.entry(actor_id).or_insert_with(|| {
            created = true;
            ActorRecord::new(actor_id)
        });
        let changed = record.apply_update(update);
        Upserted { created, changed }
    }

    pub fn get(&self, actor_id: &ActorId) -> Option<&ActorRecord> {
        self.records.get(actor_id)
    }

    pub fn remove(&mut self, actor_id: &ActorId) -> Option<ActorRecord> {
        self.records.remove(actor_id)
    }

    pub fn contains(&self, actor_id: &ActorId) -> bool {
        self.records.contains_key(actor_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActorRecord> {
        self.records.values()
    }

    /// Copy of every record, ordered by actor id.
    pub fn snapshot(&self) -> BTreeMap<ActorId, ActorRecord> {
        self.records
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actorlens_events::ActorState;

    #[test]
    fn test_upsert_creates_then_updates_in_place() {
        let mut store = RecordStore::new();
        let actor_id = ActorId::random();

        let first = store.upsert(actor_id, &ActorUpdate::with_state(ActorState::PendingCreation));
        assert!(first.created);

        let second = store.upsert(actor_id, &ActorUpdate::with_state(ActorState::Alive));
        assert!(!second.created);
        assert_eq!(second.changed, vec!["state"]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&actor_id).unwrap().state, ActorState::Alive);
    }

    #[test]
    fn test_remove_and_snapshot() {
        let mut store = RecordStore::new();
        let a = ActorId::random();
        let b = ActorId::random();
        store.upsert(a, &ActorUpdate::with_state(ActorState::Alive));
        store.upsert(b, &ActorUpdate::with_state(ActorState::Alive));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);

        assert!(store.remove(&a).is_some());
        assert!(store.remove(&a).is_none());
        assert!(!store.contains(&a));
        assert_eq!(store.len(), 1);

        // The earlier snapshot is an independent copy.
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_upsert_same_update_twice_is_idempotent() {
        let mut store = RecordStore::new();
        let actor_id = ActorId::random();
        let update = ActorUpdate {
            pid: Some(10),
            ..ActorUpdate::with_state(ActorState::Alive)
        };

        store.upsert(actor_id, &update);
        let again = store.upsert(actor_id, &update);
        assert!(again.changed.is_empty());
        assert_eq!(store.len(), 1);
    }
}
