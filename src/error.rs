//! Error types for the session.

use crate::types::Identity;
use thiserror::Error;

/// Errors raised by a storage relation while executing a queued operation.
///
/// The session never generates these itself; they are surfaced verbatim
/// from [`crate::StorageRelation`] implementations during commit.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StorageError {
    #[error("Duplicate key {identity} in relation {relation}")]
    DuplicateKey { relation: String, identity: Identity },

    #[error("No tuple with key {identity} in relation {relation}")]
    NotFound { relation: String, identity: Identity },

    #[error("Tuple for relation {relation} is missing key attribute {attribute}")]
    MissingKey { relation: String, attribute: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Main error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown identity {identity} in relation {relation}")]
    UnknownIdentity { relation: String, identity: Identity },

    #[error("Illegal transition: cannot {intent} an object in state {from}")]
    IllegalTransition {
        from: &'static str,
        intent: &'static str,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SessionError {
    /// The storage error behind a failed commit, if this is one.
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            SessionError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
