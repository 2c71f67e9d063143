//! Storage error types

use beacon_crypto::ChainError;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No record at this timestamp
    #[error("no chain record at timestamp {timestamp}")]
    NotFound {
        /// Timestamp that was looked up
        timestamp: u64,
    },

    /// Write would break record immutability
    ///
    /// Raised when inserting over an existing timestamp, or when filling in
    /// an identifier that was already set.
    #[error("chain record conflict at timestamp {timestamp}: {reason}")]
    Conflict {
        /// Timestamp of the conflicting record
        timestamp: u64,
        /// What the write would have overwritten
        reason: &'static str,
    },

    /// A stored seed or identifier string does not decode
    #[error("corrupt stored value: {0}")]
    Corrupt(#[from] ChainError),

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}
