//! Typed ID definitions.
//!
//! Widths follow the runtime's own binary id layout so that ids can be copied
//! straight off the channel without re-encoding.

use crate::define_id;

define_id!(JobId, 4, "job id");
define_id!(ActorId, 16, "actor id");
define_id!(NodeId, 28, "node id");
define_id!(WorkerId, 28, "worker id");

impl NodeId {
    /// The sentinel node identity: "no node assigned yet".
    ///
    /// Actors that are pending creation (or infeasible) report this node.
    pub const SENTINEL: NodeId = NodeId::nil();
}

// =============================================================================
// Tests
// =============================================================================
