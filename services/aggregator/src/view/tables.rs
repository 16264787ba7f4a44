//! The writer-owned tables and the per-event application step.

use std::collections::BTreeMap;

use actorlens_events::{ActorEvent, ActorState};
use actorlens_id::{ActorId, NodeId};
use serde::Serialize;
use tracing::{debug, info};

use super::dead_cache::DeadActorCache;
use super::node_index::NodeIndex;
use super::record::ActorRecord;
use super::store::RecordStore;
use super::{ActorFilter, ViewError, ViewResult};

/// What applying one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied {
        created: bool,
        state: ActorState,
        changed: Vec<&'static str>,
        evicted: Option<ActorId>,
    },
    /// The event was older than the stored record, or was a re-delivered
    /// `DEAD` for an evicted actor, and was dropped.
    Stale,
}

/// Aggregate counters for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStats {
    pub total_actors: usize,
    pub by_state: BTreeMap<String, usize>,
    pub dead_cached: usize,
    pub dead_capacity: usize,
    pub nodes: usize,
    pub unplaced_actors: usize,
    pub events_applied: u64,
    pub events_stale: u64,
    pub evictions: u64,
}

/// Record store, dead-actor cache and node index, mutated together.
#[derive(Debug)]
pub struct ActorTables {
    store: RecordStore,
    dead: DeadActorCache,
    nodes: NodeIndex,
    events_applied: u64,
    events_stale: u64,
    evictions: u64,
}

impl ActorTables {
    pub fn new(max_dead_actors: usize) -> Self {
        Self {
            store: RecordStore::new(),
            dead: DeadActorCache::new(max_dead_actors),
            nodes: NodeIndex::new(),
            events_applied: 0,
            events_stale: 0,
            evictions: 0,
        }
    }

    /// Applies one decoded event to the store, dead cache and node index.
    pub fn apply(&mut self, event: &ActorEvent) -> ViewResult<ApplyOutcome> {
        let actor_id = event.actor_id;
        let update = &event.update;

        let previous = self.store.get(&actor_id).map(|record| {
            (
                record.state,
                record.address.node_id,
                record.is_stale(update),
            )
        });

        if let Some((_, _, true)) = previous {
            self.events_stale += 1;
            debug!(
                actor_id = %actor_id,
                state = %update.state,
                "dropping stale actor event"
            );
            return Ok(ApplyOutcome::Stale);
        }

        if previous.is_none() && self.dead.was_evicted(&actor_id) {
            if update.state.is_dead() {
                self.events_stale += 1;
                debug!(actor_id = %actor_id, "dropping DEAD event for evicted actor");
                return Ok(ApplyOutcome::Stale);
            }
            self.dead.forget_eviction(&actor_id);
        }

        let upserted = self.store.upsert(actor_id, update);
        let (state, new_node) = match self.store.get(&actor_id) {
            Some(record) => (record.state, record.address.node_id),
            None => (update.state, NodeId::SENTINEL),
        };
        let prior_state = previous.map(|(s, _, _)| s);
        let prior_node = previous.map(|(_, n, _)| n);

        let mut evicted = None;
        if state.is_dead() {
            if let Some(oldest) = self.dead.mark_dead(actor_id) {
                self.evict(oldest);
                evicted = Some(oldest);
            }
        } else if prior_state == Some(ActorState::Dead) && self.dead.forget(&actor_id) {
            info!(actor_id = %actor_id, state = %state, "actor left DEAD state");
        }

        if prior_node != Some(new_node) {
            self.nodes
                .on_actor_node_changed(actor_id, prior_node, new_node);
        }

        self.events_applied += 1;

        // The record and index are already consistent when this fires.
        if self.dead.size() > self.dead.capacity() {
            return Err(ViewError::CapacityViolation {
                size: self.dead.size(),
                capacity: self.dead.capacity(),
            });
        }

        Ok(ApplyOutcome::Applied {
            created: upserted.created,
            state,
            changed: upserted.changed,
            evicted,
        })
    }

    fn evict(&mut self, actor_id: ActorId) {
        if let Some(record) = self.store.remove(&actor_id) {
            self.nodes.remove_actor(&actor_id, &record.address.node_id);
        }
        self.evictions += 1;
        debug!(actor_id = %actor_id, "evicted dead actor");
    }

    pub fn get(&self, actor_id: &ActorId) -> Option<&ActorRecord> {
        self.store.get(actor_id)
    }

    /// Records matching `filter`, keyed by actor id.
    pub fn list(&self, filter: &ActorFilter) -> BTreeMap<ActorId, ActorRecord> {
        if filter.is_empty() {
            return self.store.snapshot();
        }

        if let Some(node_id) = &filter.node_id {
            return self
                .nodes
                .actors_for_node(node_id)
                .iter()
                .filter_map(|id| self.store.get(id))
                .filter(|record| filter.matches(record))
                .map(|record| (record.actor_id, record.clone()))
                .collect();
        }

        self.store
            .iter()
            .filter(|record| filter.matches(record))
            .map(|record| (record.actor_id, record.clone()))
            .collect()
    }

    pub fn node_actors(&self) -> BTreeMap<NodeId, Vec<ActorId>> {
        self.nodes.snapshot()
    }

    /// Cached dead actors, oldest death first.
    pub fn dead_actors(&self) -> Vec<ActorId> {
        self.dead.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> ViewStats {
        let mut by_state: BTreeMap<String, usize> = BTreeMap::new();
        for record in self.store.iter() {
            *by_state.entry(record.state.to_string()).or_default() += 1;
        }

        ViewStats {
            total_actors: self.store.len(),
            by_state,
            dead_cached: self.dead.size(),
            dead_capacity: self.dead.capacity(),
            nodes: self.nodes.node_count(),
            unplaced_actors: self.nodes.unplaced_count(),
            events_applied: self.events_applied,
            events_stale: self.events_stale,
            evictions: self.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actorlens_events::{ActorUpdate, Address};
    use actorlens_id::JobId;

    fn event(actor_id: ActorId, update: ActorUpdate) -> ActorEvent {
        ActorEvent::new(actor_id, update)
    }

    fn on_node(node_id: NodeId) -> Address {
        Address {
            node_id,
            ip_address: "10.0.0.1".to_string(),
            port: 10001,
            ..Address::default()
        }
    }

    fn alive(actor_id: ActorId, node_id: NodeId) -> ActorEvent {
        event(
            actor_id,
            ActorUpdate {
                address: Some(on_node(node_id)),
                pid: Some(100),
                ..ActorUpdate::with_state(ActorState::Alive)
            },
        )
    }

    fn dead(actor_id: ActorId) -> ActorEvent {
        event(actor_id, ActorUpdate::with_state(ActorState::Dead))
    }

    fn dead_count(tables: &ActorTables) -> usize {
        tables
            .list(&ActorFilter::default())
            .values()
            .filter(|r| r.state.is_dead())
            .count()
    }

    #[test]
    fn test_live_actors_are_never_evicted() {
        let mut tables = ActorTables::new(3);
        let node = NodeId::random();
        let actors: Vec<ActorId> = (0..7).map(|_| ActorId::random()).collect();

        for id in &actors {
            tables.apply(&alive(*id, node)).unwrap();
        }
        assert_eq!(tables.len(), 7);

        for id in &actors {
            tables.apply(&dead(*id)).unwrap();
        }

        assert_eq!(tables.len(), 3);
        let kept: Vec<ActorId> = tables.list(&ActorFilter::default()).into_keys().collect();
        for id in &actors[4..] {
            assert!(kept.contains(id));
        }
        assert_eq!(tables.dead_actors(), actors[4..].to_vec());
        assert_eq!(tables.node_actors().get(&node).map(Vec::len), Some(3));
        assert_eq!(tables.stats().evictions, 4);
    }

    #[test]
    fn test_dead_retained_is_min_of_total_and_capacity() {
        let capacity = 4;
        let mut tables = ActorTables::new(capacity);

        for total in 1..=10 {
            let id = ActorId::random();
            tables.apply(&alive(id, NodeId::random())).unwrap();
            tables.apply(&dead(id)).unwrap();
            assert_eq!(dead_count(&tables), total.min(capacity));
        }
    }

    #[test]
    fn test_eviction_is_reported() {
        let mut tables = ActorTables::new(1);
        let first = ActorId::random();
        let second = ActorId::random();

        tables.apply(&dead(first)).unwrap();
        let outcome = tables.apply(&dead(second)).unwrap();

        assert!(matches!(
            outcome,
            ApplyOutcome::Applied { evicted: Some(id), .. } if id == first
        ));
        assert!(tables.get(&first).is_none());
    }

    #[test]
    fn test_pending_actor_not_indexed_under_sentinel() {
        let mut tables = ActorTables::new(10);
        let actor = ActorId::random();

        tables
            .apply(&event(
                actor,
                ActorUpdate {
                    address: Some(Address::default()),
                    pid: Some(0),
                    ..ActorUpdate::with_state(ActorState::PendingCreation)
                },
            ))
            .unwrap();

        assert!(tables.node_actors().is_empty());
        assert_eq!(tables.get(&actor).unwrap().pid, 0);
        assert_eq!(tables.stats().unplaced_actors, 1);
        assert!(tables
            .list(&ActorFilter {
                node_id: Some(NodeId::SENTINEL),
                ..Default::default()
            })
            .is_empty());
    }

    #[test]
    fn test_actor_moves_node_on_restart() {
        let mut tables = ActorTables::new(10);
        let actor = ActorId::random();
        let first = NodeId::random();
        let second = NodeId::random();

        tables.apply(&alive(actor, first)).unwrap();
        tables
            .apply(&event(
                actor,
                ActorUpdate {
                    address: Some(on_node(second)),
                    num_restarts: Some(1),
                    ..ActorUpdate::with_state(ActorState::Restarting)
                },
            ))
            .unwrap();

        let nodes = tables.node_actors();
        assert!(!nodes.contains_key(&first));
        assert_eq!(nodes.get(&second), Some(&vec![actor]));
        assert_eq!(tables.get(&actor).unwrap().num_restarts, 1);
    }

    #[test]
    fn test_stale_event_is_dropped() {
        let mut tables = ActorTables::new(10);
        let actor = ActorId::random();

        tables
            .apply(&event(
                actor,
                ActorUpdate {
                    timestamp: Some(20.0),
                    ..ActorUpdate::with_state(ActorState::Dead)
                },
            ))
            .unwrap();
        let outcome = tables
            .apply(&event(
                actor,
                ActorUpdate {
                    timestamp: Some(10.0),
                    ..ActorUpdate::with_state(ActorState::Alive)
                },
            ))
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Stale);
        assert_eq!(tables.get(&actor).unwrap().state, ActorState::Dead);
        assert_eq!(tables.stats().events_stale, 1);
    }

    #[test]
    fn test_duplicate_dead_event_does_not_evict() {
        let mut tables = ActorTables::new(2);
        let a = ActorId::random();
        let b = ActorId::random();

        tables.apply(&dead(a)).unwrap();
        tables.apply(&dead(b)).unwrap();
        tables.apply(&dead(b)).unwrap();

        assert_eq!(tables.len(), 2);
        assert_eq!(tables.dead_actors(), vec![a, b]);
    }

    #[test]
    fn test_redelivered_dead_for_evicted_actor_is_stale() {
        let mut tables = ActorTables::new(2);
        let node = NodeId::random();
        let actors: Vec<ActorId> = (0..3).map(|_| ActorId::random()).collect();

        for id in &actors {
            tables.apply(&alive(*id, node)).unwrap();
            tables.apply(&dead(*id)).unwrap();
        }
        assert!(tables.get(&actors[0]).is_none());

        let outcome = tables.apply(&dead(actors[0])).unwrap();

        assert_eq!(outcome, ApplyOutcome::Stale);
        assert!(tables.get(&actors[0]).is_none());
        assert!(tables.get(&actors[1]).is_some());
        assert_eq!(tables.dead_actors(), actors[1..].to_vec());
        assert_eq!(tables.stats().evictions, 1);
    }

    #[test]
    fn test_evicted_actor_seen_alive_is_recreated() {
        let mut tables = ActorTables::new(1);
        let a = ActorId::random();
        let b = ActorId::random();
        let node = NodeId::random();

        tables.apply(&dead(a)).unwrap();
        tables.apply(&dead(b)).unwrap();
        assert!(tables.get(&a).is_none());

        tables.apply(&alive(a, node)).unwrap();
        assert_eq!(tables.get(&a).unwrap().state, ActorState::Alive);

        // A later death is a real one again.
        let outcome = tables.apply(&dead(a)).unwrap();
        assert!(matches!(
            outcome,
            ApplyOutcome::Applied { evicted: Some(id), .. } if id == b
        ));
    }

    #[test]
    fn test_capacity_violation_leaves_index_consistent() {
        let mut tables = ActorTables::new(1);
        tables.dead.insert_unbounded(ActorId::random());
        tables.dead.insert_unbounded(ActorId::random());
        let actor = ActorId::random();
        let node = NodeId::random();

        let err = tables.apply(&alive(actor, node)).unwrap_err();

        assert_eq!(
            err,
            ViewError::CapacityViolation {
                size: 2,
                capacity: 1
            }
        );
        assert_eq!(tables.get(&actor).unwrap().address.node_id, node);
        assert_eq!(tables.node_actors().get(&node), Some(&vec![actor]));
        assert_eq!(tables.stats().events_applied, 1);
    }

    #[test]
    fn test_revived_actor_leaves_dead_cache() {
        let mut tables = ActorTables::new(1);
        let a = ActorId::random();
        let b = ActorId::random();

        tables.apply(&dead(a)).unwrap();
        tables
            .apply(&event(a, ActorUpdate::with_state(ActorState::Alive)))
            .unwrap();
        tables.apply(&dead(b)).unwrap();

        // `a` is alive again, so `b` dying must not evict it.
        assert_eq!(tables.len(), 2);
        assert_eq!(tables.dead_actors(), vec![b]);
    }

    #[test]
    fn test_filters() {
        let mut tables = ActorTables::new(10);
        let job = JobId::random();
        let node = NodeId::random();
        let a = ActorId::random();
        let b = ActorId::random();

        tables
            .apply(&event(
                a,
                ActorUpdate {
                    job_id: Some(job),
                    ..ActorUpdate::with_state(ActorState::PendingCreation)
                },
            ))
            .unwrap();
        tables.apply(&alive(a, node)).unwrap();
        tables.apply(&alive(b, NodeId::random())).unwrap();

        let by_job = tables.list(&ActorFilter {
            job_id: Some(job),
            ..Default::default()
        });
        assert_eq!(by_job.keys().copied().collect::<Vec<_>>(), vec![a]);

        let by_node = tables.list(&ActorFilter {
            node_id: Some(node),
            ..Default::default()
        });
        assert_eq!(by_node.keys().copied().collect::<Vec<_>>(), vec![a]);

        let by_state = tables.list(&ActorFilter {
            state: Some(ActorState::Alive),
            ..Default::default()
        });
        assert_eq!(by_state.len(), 2);

        let none = tables.list(&ActorFilter {
            state: Some(ActorState::Dead),
            ..Default::default()
        });
        assert!(none.is_empty());
    }

    #[test]
    fn test_stats_counts_by_state() {
        let mut tables = ActorTables::new(10);
        tables.apply(&alive(ActorId::random(), NodeId::random())).unwrap();
        tables.apply(&dead(ActorId::random())).unwrap();

        let stats = tables.stats();
        assert_eq!(stats.total_actors, 2);
        assert_eq!(stats.by_state.get("ALIVE"), Some(&1));
        assert_eq!(stats.by_state.get("DEAD"), Some(&1));
        assert_eq!(stats.dead_cached, 1);
        assert_eq!(stats.dead_capacity, 10);
        assert_eq!(stats.events_applied, 2);
    }
}
