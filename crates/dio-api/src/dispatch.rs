//! ExecuteInference: refresh, pick, forward.

use serde::Serialize;
use tracing::{debug, warn};

use dio_worker::{InferenceRequest, InferenceResponse, WorkerClient};

use crate::ApiState;
use crate::error::{DispatchError, DispatchResult};

/// A served inference request and the worker that served it.
#[derive(Debug, Clone, Serialize)]
pub struct Dispatched {
    pub worker_id: String,
    #[serde(flatten)]
    pub response: InferenceResponse,
}

/// Forward `request` to the next worker in rotation.
///
/// The scheduler is rebuilt from the registry first, so a worker that
/// registered or was evicted since the last call is taken into account.
pub async fn dispatch<C: WorkerClient>(
    state: &ApiState<C>,
    request: &InferenceRequest,
) -> DispatchResult<Dispatched> {
    state.scheduler.refresh_from(&state.registry)?;

    let worker = state
        .scheduler
        .pick_next()
        .ok_or(DispatchError::NoWorkerAvailable)?;

    debug!(
        worker_id = %worker.worker_id,
        address = %worker.address,
        model_id = %request.model_id,
        "dispatching inference"
    );

    match state
        .client
        .predict(&worker.address, request, state.dispatch_timeout)
        .await
    {
        Ok(response) => Ok(Dispatched {
            worker_id: worker.worker_id,
            response,
        }),
        Err(e) => {
            warn!(worker_id = %worker.worker_id, error = %e, "inference dispatch failed");
            Err(e.into())
        }
    }
}
