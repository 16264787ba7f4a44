//! Error types for actor message decoding.

use actorlens_id::{ActorId, IdError};
use thiserror::Error;

/// Errors that can occur when decoding an actor channel message.
#[derive(Debug, Error, Clone)]
pub enum DecodeError {
    /// The payload is not valid JSON for an actor record.
    #[error("invalid actor payload JSON: {0}")]
    InvalidJson(String),

    /// The message key is not an actor id.
    #[error("invalid message key {key:?}: {source}")]
    InvalidKey { key: String, source: IdError },

    /// The payload names a different actor than the message key.
    #[error("payload actorId {payload} does not match message key {key}")]
    KeyMismatch { key: ActorId, payload: ActorId },

    /// The state is not one of the known actor states.
    #[error("unknown actor state: {0}")]
    UnknownState(String),

    /// An id field failed to parse.
    #[error("invalid {field}: {source}")]
    InvalidId {
        field: &'static str,
        source: IdError,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::InvalidJson(err.to_string())
    }
}
