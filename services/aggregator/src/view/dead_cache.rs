//! Bounded FIFO of actors whose last observed state is `DEAD`.
//!
//! Only dead actors are subject to eviction. When a new actor dies while the
//! cache is full, the actor that died longest ago is evicted and returned so
//! the caller can drop it from the record store and node index.
//!
//! Evicted ids are remembered in a second FIFO of the same capacity so that a
//! re-delivered `DEAD` event for an actor that is already gone can be told
//! apart from a first sighting.

use std::collections::{BTreeMap, HashMap};

use actorlens_id::ActorId;

/// Default retention for dead actors.
pub const DEFAULT_MAX_DEAD_ACTORS: usize = 1000;

/// Insertion-ordered set with logarithmic removal from the middle.
#[derive(Debug, Default)]
struct FifoSet {
    by_seq: BTreeMap<u64, ActorId>,
    seq_of: HashMap<ActorId, u64>,
    next_seq: u64,
}

impl FifoSet {
    fn push(&mut self, actor_id: ActorId) -> bool {
        if self.seq_of.contains_key(&actor_id) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_of.insert(actor_id, seq);
        self.by_seq.insert(seq, actor_id);
        true
    }

    fn remove(&mut self, actor_id: &ActorId) -> bool {
        match self.seq_of.remove(actor_id) {
            Some(seq) => {
                self.by_seq.remove(&seq);
                true
            }
            None => false,
        }
    }

    fn pop_oldest(&mut self) -> Option<ActorId> {
        let (_, actor_id) = self.by_seq.pop_first()?;
        self.seq_of.remove(&actor_id);
        Some(actor_id)
    }

    fn contains(&self, actor_id: &ActorId) -> bool {
        self.seq_of.contains_key(actor_id)
    }

    fn len(&self) -> usize {
        self.by_seq.len()
    }

    fn iter(&self) -> impl Iterator<Item = &ActorId> {
        self.by_seq.values()
    }
}

#[derive(Debug)]
pub struct DeadActorCache {
    capacity: usize,
    /// Oldest death first.
    dead: FifoSet,
    /// Oldest eviction first.
    evicted: FifoSet,
}

impl DeadActorCache {
    /// Creates a cache retaining at most `capacity` dead actors (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            dead: FifoSet::default(),
            evicted: FifoSet::default(),
        }
    }

    /// Records that `actor_id` died.
    ///
    /// Returns the evicted actor if the cache overflowed. Marking an actor that
    /// is already cached does not change its position.
    pub fn mark_dead(&mut self, actor_id: ActorId) -> Option<ActorId> {
        if !self.dead.push(actor_id) {
            return None;
        }
        self.evicted.remove(&actor_id);

        if self.dead.len() > self.capacity {
            let oldest = self.dead.pop_oldest()?;
            self.evicted.push(oldest);
            if self.evicted.len() > self.capacity {
                self.evicted.pop_oldest();
            }
            return Some(oldest);
        }
        None
    }

    /// Drops `actor_id` from the cache without evicting its record.
    ///
    /// Used when an actor is observed alive again after a `DEAD` event.
    pub fn forget(&mut self, actor_id: &ActorId) -> bool {
        self.dead.remove(actor_id)
    }

    /// Whether `actor_id` was evicted recently enough to still be remembered.
    pub fn was_evicted(&self, actor_id: &ActorId) -> bool {
        self.evicted.contains(actor_id)
    }

    /// Stops remembering an eviction, e.g. when the actor is seen alive again.
    pub fn forget_eviction(&mut self, actor_id: &ActorId) -> bool {
        self.evicted.remove(actor_id)
    }

    pub fn contains(&self, actor_id: &ActorId) -> bool {
        self.dead.contains(actor_id)
    }

    pub fn size(&self) -> usize {
        self.dead.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached actors, oldest death first.
    pub fn iter(&self) -> impl Iterator<Item = &ActorId> {
        self.dead.iter()
    }

    /// Inserts without enforcing the capacity.
    #[cfg(test)]
    pub(super) fn insert_unbounded(&mut self, actor_id: ActorId) {
        self.dead.push(actor_id);
    }
}

impl Default for DeadActorCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEAD_ACTORS)
    }
}
