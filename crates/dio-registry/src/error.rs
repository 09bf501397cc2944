//! Error types for the worker registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer failures. Always surfaced to the caller, never swallowed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open registry: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupt record for worker {worker_id}: {reason}")]
    Corrupt { worker_id: String, reason: String },
}
