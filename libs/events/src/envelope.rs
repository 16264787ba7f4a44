//! Wire records and message decoding.

use std::collections::BTreeMap;

use actorlens_id::{ActorId, IdError, JobId, NodeId, WorkerId};
use serde::{Deserialize, Serialize};

use crate::{ActorEvent, ActorState, ActorUpdate, Address, DecodeError};

/// A state value as it appears on the wire: by name or by ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireState {
    Name(String),
    Ordinal(i64),
}

impl WireState {
    fn resolve(&self) -> Result<ActorState, DecodeError> {
        match self {
            WireState::Name(name) => name.parse(),
            WireState::Ordinal(ordinal) => ActorState::from_ordinal(*ordinal)
                .ok_or_else(|| DecodeError::UnknownState(ordinal.to_string())),
        }
    }
}

/// Address as carried on the wire. Missing fields take the runtime defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireAddress {
    #[serde(alias = "rayletId", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub ip_address: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

impl WireAddress {
    fn decode(&self, field: &'static str) -> Result<Address, DecodeError> {
        let node_id = match self.node_id.as_deref() {
            Some(s) if !s.is_empty() => parse_id::<NodeId>(field, s, NodeId::parse)?,
            _ => NodeId::SENTINEL,
        };
        let worker_id = match self.worker_id.as_deref() {
            Some(s) if !s.is_empty() => parse_id::<WorkerId>(field, s, WorkerId::parse)?,
            _ => WorkerId::nil(),
        };

        Ok(Address {
            node_id,
            ip_address: self.ip_address.clone(),
            port: self.port,
            worker_id,
        })
    }
}

impl From<&Address> for WireAddress {
    fn from(address: &Address) -> Self {
        Self {
            node_id: Some(address.node_id.to_string()),
            ip_address: address.ip_address.clone(),
            port: address.port,
            worker_id: Some(address.worker_id.to_string()),
        }
    }
}

/// Actor table record as published on the actor channel.
///
/// Every field is optional; only the fields relevant to a transition are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorTableData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<WireState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<WireAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<WireAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialized_runtime_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ray_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_descriptor: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_detached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_restarts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_restarts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_cause: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_resources: Option<BTreeMap<String, f64>>,
}

impl ActorTableData {
    /// Converts the wire record into a typed partial update.
    pub fn into_update(self) -> Result<ActorUpdate, DecodeError> {
        let state = match &self.state {
            Some(state) => state.resolve()?,
            None => ActorState::DependenciesUnready,
        };

        let job_id = self
            .job_id
            .as_deref()
            .map(|s| parse_id::<JobId>("jobId", s, JobId::parse))
            .transpose()?;
        let address = self
            .address
            .as_ref()
            .map(|a| a.decode("address"))
            .transpose()?;
        let owner_address = self
            .owner_address
            .as_ref()
            .map(|a| a.decode("ownerAddress"))
            .transpose()?;

        Ok(ActorUpdate {
            state,
            job_id,
            address,
            owner_address,
            class_name: self.class_name,
            name: self.name,
            serialized_runtime_env: self.serialized_runtime_env,
            ray_namespace: self.ray_namespace,
            function_descriptor: self.function_descriptor,
            is_detached: self.is_detached,
            max_restarts: self.max_restarts,
            num_restarts: self.num_restarts,
            pid: self.pid,
            timestamp: self.timestamp,
            start_time: self.start_time,
            end_time: self.end_time,
            death_cause: self.death_cause,
            required_resources: self.required_resources,
        })
    }

    /// Builds the wire record for an event. Used by publishers and tests.
    pub fn from_event(event: &ActorEvent) -> Self {
        let update = &event.update;
        Self {
            actor_id: Some(event.actor_id.to_string()),
            job_id: update.job_id.map(|id| id.to_string()),
            state: Some(WireState::Name(update.state.as_str().to_string())),
            address: update.address.as_ref().map(WireAddress::from),
            owner_address: update.owner_address.as_ref().map(WireAddress::from),
            class_name: update.class_name.clone(),
            name: update.name.clone(),
            serialized_runtime_env: update.serialized_runtime_env.clone(),
            ray_namespace: update.ray_namespace.clone(),
            function_descriptor: update.function_descriptor.clone(),
            is_detached: update.is_detached,
            max_restarts: update.max_restarts,
            num_restarts: update.num_restarts,
            pid: update.pid,
            timestamp: update.timestamp,
            start_time: update.start_time,
            end_time: update.end_time,
            death_cause: update.death_cause.clone(),
            required_resources: update.required_resources.clone(),
        }
    }
}

fn parse_id<T>(
    field: &'static str,
    raw: &str,
    parse: fn(&str) -> Result<T, IdError>,
) -> Result<T, DecodeError> {
    parse(raw).map_err(|source| DecodeError::InvalidId { field, source })
}

/// Decodes one channel message.
///
/// Returns `Ok(None)` for an absent payload (heartbeat/tombstone).
pub fn decode_actor_message(
    key: &str,
    payload: Option<&[u8]>,
) -> Result<Option<ActorEvent>, DecodeError> {
    let Some(payload) = payload else {
        return Ok(None);
    };

    let actor_id = ActorId::parse(key).map_err(|source| DecodeError::InvalidKey {
        key: key.to_string(),
        source,
    })?;

    let data: ActorTableData = serde_json::from_slice(payload)?;

    if let Some(raw) = data.actor_id.as_deref() {
        let payload_id = parse_id::<ActorId>("actorId", raw, ActorId::parse)?;
        if payload_id != actor_id {
            return Err(DecodeError::KeyMismatch {
                key: actor_id,
                payload: payload_id,
            });
        }
    }

    let update = data.into_update()?;
    Ok(Some(ActorEvent::new(actor_id, update)))
}

/// Encodes an event into its `(key, payload)` channel form.
pub fn encode_actor_message(event: &ActorEvent) -> Result<(String, Vec<u8>), DecodeError> {
    let payload = serde_json::to_vec(&ActorTableData::from_event(event))?;
    Ok((event.actor_id.to_string(), payload))
}
