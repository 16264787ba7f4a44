//! Error types for ID parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The ID string is empty.
    #[error("ID cannot be empty")]
    Empty,

    /// The ID does not have the expected hex length.
    #[error("invalid {kind} length: expected {expected} hex chars, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The ID contains non-hex characters.
    #[error("invalid hex in {kind}: {message}")]
    InvalidHex { kind: &'static str, message: String },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// Returns true if this error indicates a width mismatch.
    pub fn is_length_error(&self) -> bool {
        matches!(self, IdError::InvalidLength { .. })
    }
}
