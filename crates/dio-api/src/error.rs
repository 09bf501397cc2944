//! Dispatch errors and their HTTP mapping.

use axum::http::StatusCode;
use thiserror::Error;

use dio_registry::StoreError;
use dio_worker::WorkerError;

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Why an inference request could not be served.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no worker available")]
    NoWorkerAvailable,

    #[error("registry error: {0}")]
    Registry(#[from] StoreError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl DispatchError {
    /// Status code returned to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::NoWorkerAvailable => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Worker(WorkerError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::Worker(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
