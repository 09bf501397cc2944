//! Worker call errors.

use std::time::Duration;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Why a `Predict` call did not produce a response.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// No connection could be established (refused, unroutable, connect timeout).
    #[error("worker at {address} is unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    /// Connected, but no answer arrived before the deadline.
    #[error("worker at {address} did not answer within {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    /// The worker answered with a non-success status.
    #[error("worker at {address} returned {status}: {message}")]
    Application {
        address: String,
        status: u16,
        message: String,
    },

    /// The exchange broke down after connecting (bad framing, bad JSON).
    #[error("invalid exchange with worker at {address}: {reason}")]
    Protocol { address: String, reason: String },
}

impl WorkerError {
    /// True when the worker could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, WorkerError::Unreachable { .. })
    }
}
