//! Storage error types for lattice-storage.
//!
//! [`StorageError`] covers the failure taxonomy of the storage layer:
//! caller contract violations rejected before any I/O, conflict and
//! not-found conditions, graph topology errors, and wrapped database
//! failures carrying the operation context in which they occurred.

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A network or entity with the same identity already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The target of an operation does not exist.
    #[error("{0} does not exist")]
    NotFound(String),

    /// The request violates the storage contract (rejected before I/O).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A page token could not be decoded.
    #[error("invalid page token")]
    InvalidPageToken,

    /// A loaded graph has no root entities because every member has an
    /// incoming edge (the component is a closed cycle).
    #[error("graph {graph_id} has no root entities")]
    NoRootEntities { graph_id: String },

    /// An underlying database call failed. `context` names the operation
    /// that was being attempted.
    #[error("{context}: {source}")]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Wraps a rusqlite error with the operation context in which it
    /// occurred, e.g. `"error querying for networks"`.
    pub fn database(context: impl Into<String>, source: rusqlite::Error) -> Self {
        StorageError::Database {
            context: context.into(),
            source,
        }
    }
}

/// Shorthand adapter for `map_err` on rusqlite calls.
pub(crate) fn db_err(context: &'static str) -> impl FnOnce(rusqlite::Error) -> StorageError {
    move |source| StorageError::database(context, source)
}
