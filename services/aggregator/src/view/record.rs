//! The per-actor record and how partial updates fold into it.

use std::collections::BTreeMap;

use actorlens_events::{ActorState, ActorUpdate, Address};
use actorlens_id::{ActorId, JobId};
use serde::Serialize;

/// Latest known state of one actor.
///
/// Serializes to the served view shape: camelCase keys, `state` as its name,
/// `address` always an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRecord {
    pub actor_id: ActorId,
    pub job_id: Option<JobId>,
    pub class_name: Option<String>,
    pub name: Option<String>,
    pub state: ActorState,
    pub address: Address,
    pub pid: u32,
    pub num_restarts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialized_runtime_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ray_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_descriptor: Option<serde_json::Value>,
    pub is_detached: bool,
    pub max_restarts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_cause: Option<serde_json::Value>,
    pub required_resources: BTreeMap<String, f64>,
}

impl ActorRecord {
    /// A fresh record before any update has been folded in.
    pub fn new(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            job_id: None,
            class_name: None,
            name: None,
            state: ActorState::DependenciesUnready,
            address: Address::default(),
            pid: 0,
            num_restarts: 0,
            owner_address: None,
            serialized_runtime_env: None,
            ray_namespace: None,
            function_descriptor: None,
            is_detached: false,
            max_restarts: 0,
            timestamp: None,
            start_time: None,
            end_time: None,
            death_cause: None,
            required_resources: BTreeMap::new(),
        }
    }

    /// True if `update` is older than what this record already reflects.
    pub fn is_stale(&self, update: &ActorUpdate) -> bool {
        matches!(
            (self.timestamp, update.timestamp),
            (Some(current), Some(incoming)) if incoming < current
        )
    }

    /// Folds a partial update into the record and returns the changed fields.
    ///
    /// Creation metadata is only taken the first time it is observed.
    pub fn apply_update(&mut self, update: &ActorUpdate) -> Vec<&'static str> {
        let mut changed = Vec::new();

        if self.state != update.state {
            self.state = update.state;
            changed.push("state");
        }

        set_once(&mut self.job_id, &update.job_id, "jobId", &mut changed);
        set_once(&mut self.class_name, &update.class_name, "className", &mut changed);
        set_once(&mut self.name, &update.name, "name", &mut changed);
        set_once(
            &mut self.owner_address,
            &update.owner_address,
            "ownerAddress",
            &mut changed,
        );
        set_once(
            &mut self.serialized_runtime_env,
            &update.serialized_runtime_env,
            "serializedRuntimeEnv",
            &mut changed,
        );
        set_once(
            &mut self.ray_namespace,
            &update.ray_namespace,
            "rayNamespace",
            &mut changed,
        );
        set_once(
            &mut self.function_descriptor,
            &update.function_descriptor,
            "functionDescriptor",
            &mut changed,
        );

        if let Some(v) = update.is_detached {
            if v != self.is_detached {
                self.is_detached = v;
                changed.push("isDetached");
            }
        }

        if let Some(v) = update.max_restarts {
            if v != self.max_restarts {
                self.max_restarts = v;
                changed.push("maxRestarts");
            }
        }

        overwrite(&mut self.address, &update.address, "address", &mut changed);
        overwrite(&mut self.pid, &update.pid, "pid", &mut changed);
        overwrite(
            &mut self.num_restarts,
            &update.num_restarts,
            "numRestarts",
            &mut changed,
        );
        overwrite(
            &mut self.required_resources,
            &update.required_resources,
            "requiredResources",
            &mut changed,
        );

        if update.timestamp.is_some() && update.timestamp != self.timestamp {
            self.timestamp = update.timestamp;
            changed.push("timestamp");
        }
        if update.start_time.is_some() && update.start_time != self.start_time {
            self.start_time = update.start_time;
            changed.push("startTime");
        }
        if update.end_time.is_some() && update.end_time != self.end_time {
            self.end_time = update.end_time;
            changed.push("endTime");
        }
        if update.death_cause.is_some() && update.death_cause != self.death_cause {
            self.death_cause = update.death_cause.clone();
            changed.push("deathCause");
        }

        changed
    }
}

fn set_once<T: Clone>(
    slot: &mut Option<T>,
    incoming: &Option<T>,
    field: &'static str,
    changed: &mut Vec<&'static str>,
) {
    if slot.is_none() {
        if let Some(v) = incoming {
            *slot = Some(v.clone());
            changed.push(field);
        }
    }
}

fn overwrite<T: Clone + PartialEq>(
    slot: &mut T,
    incoming: &Option<T>,
    field: &'static str,
    changed: &mut Vec<&'static str>,
) {
    if let Some(v) = incoming {
        if v != slot {
            *slot = v.clone();
            changed.push(field);
        }
    }
}
