//! Secondary index from node identity to the actors last seen on it.
//!
//! The sentinel node (nil id) means "not placed yet". Actors on it are kept in
//! a separate unplaced set and never show up under any node key.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use actorlens_id::{ActorId, NodeId};

#[derive(Debug, Default)]
pub struct NodeIndex {
    by_node: HashMap<NodeId, BTreeSet<ActorId>>,
    unplaced: BTreeSet<ActorId>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `actor_id` from `old_node` (if it was indexed) to `new_node`.
    pub fn on_actor_node_changed(
        &mut self,
        actor_id: ActorId,
        old_node: Option<NodeId>,
        new_node: NodeId,
    ) {
        if let Some(old) = old_node {
            self.detach(&actor_id, &old);
        }

        if new_node.is_nil() {
            self.unplaced.insert(actor_id);
        } else {
            self.by_node.entry(new_node).or_default().insert(actor_id);
        }
    }

    /// Removes `actor_id` from the index entirely.
    pub fn remove_actor(&mut self, actor_id: &ActorId, node: &NodeId) {
        self.detach(actor_id, node);
    }

    fn detach(&mut self, actor_id: &ActorId, node: &NodeId) {
        if node.is_nil() {
            self.unplaced.remove(actor_id);
            return;
        }

        if let Some(actors) = self.by_node.get_mut(node) {
            actors.remove(actor_id);
            if actors.is_empty() {
                self.by_node.remove(node);
            }
        }
    }

    /// Actors last seen on `node_id`. Always empty for the sentinel node.
    pub fn actors_for_node(&self, node_id: &NodeId) -> BTreeSet<ActorId> {
        if node_id.is_nil() {
            return BTreeSet::new();
        }
        self.by_node.get(node_id).cloned().unwrap_or_default()
    }

    /// Node-keyed view of the index; never contains the sentinel node.
    pub fn snapshot(&self) -> BTreeMap<NodeId, Vec<ActorId>> {
        self.by_node
            .iter()
            .filter(|(node, _)| !node.is_nil())
            .map(|(node, actors)| (*node, actors.iter().copied().collect()))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.by_node.len()
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_node_is_never_a_key() {
        let mut index = NodeIndex::new();
        let actor = ActorId::random();

        index.on_actor_node_changed(actor, None, NodeId::SENTINEL);

        assert!(index.snapshot().is_empty());
        assert!(index.actors_for_node(&NodeId::SENTINEL).is_empty());
        assert_eq!(index.unplaced_count(), 1);
    }

    #[test]
    fn test_move_from_sentinel_to_node() {
        let mut index = NodeIndex::new();
        let actor = ActorId::random();
        let node = NodeId::random();

        index.on_actor_node_changed(actor, None, NodeId::SENTINEL);
        index.on_actor_node_changed(actor, Some(NodeId::SENTINEL), node);

        assert_eq!(index.unplaced_count(), 0);
        assert_eq!(index.actors_for_node(&node), BTreeSet::from([actor]));
        assert_eq!(index.snapshot().len(), 1);
    }

    #[test]
    fn test_move_between_nodes_drops_empty_entry() {
        let mut index = NodeIndex::new();
        let actor = ActorId::random();
        let first = NodeId::random();
        let second = NodeId::random();

        index.on_actor_node_changed(actor, None, first);
        index.on_actor_node_changed(actor, Some(first), second);

        assert!(index.actors_for_node(&first).is_empty());
        assert_eq!(index.node_count(), 1);
        assert_eq!(index.snapshot().get(&second), Some(&vec![actor]));
    }

    #[test]
    fn test_remove_actor() {
        let mut index = NodeIndex::new();
        let node = NodeId::random();
        let a = ActorId::random();
        let b = ActorId::random();

        index.on_actor_node_changed(a, None, node);
        index.on_actor_node_changed(b, None, node);
        index.remove_actor(&a, &node);

        assert_eq!(index.actors_for_node(&node), BTreeSet::from([b]));
        index.remove_actor(&b, &node);
        assert!(index.snapshot().is_empty());
    }
}
