//! Decoded actor state types.

use std::collections::BTreeMap;

use actorlens_id::{ActorId, JobId, NodeId, WorkerId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Actor State
// =============================================================================

/// Lifecycle state of an actor.
///
/// The ordinals match the runtime's enum; `DependenciesUnready` is 0 and is
/// therefore omitted from payloads that elide default values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorState {
    #[default]
    DependenciesUnready,
    PendingCreation,
    Alive,
    Restarting,
    Dead,
}

impl ActorState {
    /// All states in ordinal order.
    pub const ALL: [ActorState; 5] = [
        ActorState::DependenciesUnready,
        ActorState::PendingCreation,
        ActorState::Alive,
        ActorState::Restarting,
        ActorState::Dead,
    ];

    /// Returns the wire ordinal.
    pub const fn ordinal(self) -> i64 {
        match self {
            ActorState::DependenciesUnready => 0,
            ActorState::PendingCreation => 1,
            ActorState::Alive => 2,
            ActorState::Restarting => 3,
            ActorState::Dead => 4,
        }
    }

    /// Looks up a state by wire ordinal.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.ordinal() == ordinal)
    }

    /// Returns the canonical upper-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ActorState::DependenciesUnready => "DEPENDENCIES_UNREADY",
            ActorState::PendingCreation => "PENDING_CREATION",
            ActorState::Alive => "ALIVE",
            ActorState::Restarting => "RESTARTING",
            ActorState::Dead => "DEAD",
        }
    }

    /// Looks up a state by canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Returns true for the terminal state.
    pub fn is_dead(self) -> bool {
        matches!(self, ActorState::Dead)
    }
}

impl std::fmt::Display for ActorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActorState {
    type Err = crate::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| crate::DecodeError::UnknownState(s.to_string()))
    }
}

// =============================================================================
// Address
// =============================================================================

/// Process location of an actor or its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub node_id: NodeId,
    pub ip_address: String,
    pub port: u16,
    pub worker_id: WorkerId,
}

impl Address {
    /// Returns the node this address is on, or `None` for the sentinel node.
    pub fn placed_node(&self) -> Option<NodeId> {
        (!self.node_id.is_nil()).then_some(self.node_id)
    }
}

impl Default for Address {
    fn default() -> Self {
        Self {
            node_id: NodeId::SENTINEL,
            ip_address: String::new(),
            port: 0,
            worker_id: WorkerId::nil(),
        }
    }
}

// =============================================================================
// Partial Update
// =============================================================================

/// One actor state change as carried on the channel.
///
/// Every field except `state` is optional: `None` means the field was not
/// present in the payload, and the stored value must be retained.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActorUpdate {
    pub state: ActorState,
    pub job_id: Option<JobId>,
    pub address: Option<Address>,
    pub owner_address: Option<Address>,
    pub class_name: Option<String>,
    pub name: Option<String>,
    pub serialized_runtime_env: Option<String>,
    pub ray_namespace: Option<String>,
    pub function_descriptor: Option<serde_json::Value>,
    pub is_detached: Option<bool>,
    pub max_restarts: Option<i64>,
    pub num_restarts: Option<u64>,
    pub pid: Option<u32>,
    pub timestamp: Option<f64>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub death_cause: Option<serde_json::Value>,
    pub required_resources: Option<BTreeMap<String, f64>>,
}

impl ActorUpdate {
    /// Creates an update that only carries a state.
    pub fn with_state(state: ActorState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    /// Wire names of the fields carried by this update.
    pub fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = vec!["state"];
        let optional = [
            ("jobId", self.job_id.is_some()),
            ("address", self.address.is_some()),
            ("ownerAddress", self.owner_address.is_some()),
            ("className", self.class_name.is_some()),
            ("name", self.name.is_some()),
            ("serializedRuntimeEnv", self.serialized_runtime_env.is_some()),
            ("rayNamespace", self.ray_namespace.is_some()),
            ("functionDescriptor", self.function_descriptor.is_some()),
            ("isDetached", self.is_detached.is_some()),
            ("maxRestarts", self.max_restarts.is_some()),
            ("numRestarts", self.num_restarts.is_some()),
            ("pid", self.pid.is_some()),
            ("timestamp", self.timestamp.is_some()),
            ("startTime", self.start_time.is_some()),
            ("endTime", self.end_time.is_some()),
            ("deathCause", self.death_cause.is_some()),
            ("requiredResources", self.required_resources.is_some()),
        ];
        fields.extend(optional.into_iter().filter(|(_, p)| *p).map(|(f, _)| f));
        fields
    }
}

/// A decoded actor state change for one actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorEvent {
    pub actor_id: ActorId,
    pub update: ActorUpdate,
}

impl ActorEvent {
    pub fn new(actor_id: ActorId, update: ActorUpdate) -> Self {
        Self { actor_id, update }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ActorState::DependenciesUnready, 0, "DEPENDENCIES_UNREADY")]
    #[case(ActorState::PendingCreation, 1, "PENDING_CREATION")]
    #[case(ActorState::Alive, 2, "ALIVE")]
    #[case(ActorState::Restarting, 3, "RESTARTING")]
    #[case(ActorState::Dead, 4, "DEAD")]
    fn test_state_ordinals_and_names(
        #[case] state: ActorState,
        #[case] ordinal: i64,
        #[case] name: &str,
    ) {
        assert_eq!(state.ordinal(), ordinal);
        assert_eq!(ActorState::from_ordinal(ordinal), Some(state));
        assert_eq!(state.to_string(), name);
        assert_eq!(name.parse::<ActorState>().unwrap(), state);
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            format!("\"{name}\"")
        );
    }

    #[test]
    fn test_unknown_state_name_is_error() {
        let err = "ZOMBIE".parse::<ActorState>().unwrap_err();
        assert!(matches!(err, crate::DecodeError::UnknownState(s) if s == "ZOMBIE"));
        assert_eq!(ActorState::from_ordinal(5), None);
    }

    #[test]
    fn test_default_address_is_unplaced() {
        let address = Address::default();
        assert!(address.node_id.is_nil());
        assert_eq!(address.placed_node(), None);
    }

    #[test]
    fn test_present_fields_state_only() {
        let update = ActorUpdate::with_state(ActorState::Dead);
        assert_eq!(update.present_fields(), vec!["state"]);
        assert!(update.address.is_none());
    }

    #[test]
    fn test_present_fields_keeps_pid_zero() {
        let update = ActorUpdate {
            pid: Some(0),
            ..ActorUpdate::with_state(ActorState::PendingCreation)
        };
        assert_eq!(update.present_fields(), vec!["state", "pid"]);
    }
}
