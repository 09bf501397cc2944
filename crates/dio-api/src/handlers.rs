//! REST API handlers.
//!
//! Registration and listing go straight to the `WorkerRegistry`; inference
//! goes through [`dispatch`](crate::dispatch::dispatch). All handlers return
//! the same JSON envelope, including for request bodies that fail to parse.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use dio_registry::WorkerRecord;
use dio_worker::{InferenceRequest, WorkerClient};

use crate::ApiState;
use crate::dispatch::dispatch;
use crate::error::DispatchError;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// Answer a body that is not valid JSON for `T` inside the envelope.
fn rejection_response(rejection: JsonRejection) -> Response {
    error_response(&rejection.body_text(), rejection.status())
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        error_response(&self.to_string(), self.status_code())
    }
}

/// Acknowledgement returned to a registering worker.
#[derive(Debug, Serialize)]
pub struct RegisterAck {
    pub worker_id: String,
    /// False when an existing registration was overwritten.
    pub created: bool,
}

// ── Workers ────────────────────────────────────────────────────

/// POST /api/v1/workers
pub async fn register_worker<C: WorkerClient>(
    State(state): State<ApiState<C>>,
    payload: Result<Json<WorkerRecord>, JsonRejection>,
) -> Response {
    let Json(record) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    if record.worker_id.trim().is_empty() || record.address.trim().is_empty() {
        return error_response("worker_id and address are required", StatusCode::BAD_REQUEST);
    }

    let created = match state.registry.register(&record) {
        Ok(created) => created,
        Err(e) => {
            error!(worker_id = %record.worker_id, error = %e, "failed to register worker");
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    if created {
        info!(
            worker_id = %record.worker_id,
            address = %record.address,
            models = ?record.models,
            "worker registered"
        );
        // Any new worker id settles the oldest pending spawn, whether or not
        // the autoscaler started it; a stray settle skips one spawn at most.
        if let Some(ledger) = &state.ledger {
            if ledger.settle_one() {
                debug!(worker_id = %record.worker_id, "pending spawn settled");
            }
        }
    } else {
        info!(worker_id = %record.worker_id, address = %record.address, "worker re-registered");
    }

    if let Err(e) = state.scheduler.refresh_from(&state.registry) {
        warn!(error = %e, "scheduler refresh after registration failed");
    }

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let ack = RegisterAck {
        worker_id: record.worker_id,
        created,
    };
    (status, ApiResponse::ok(ack)).into_response()
}

/// GET /api/v1/workers
pub async fn list_workers<C: WorkerClient>(State(state): State<ApiState<C>>) -> Response {
    match state.registry.list_all() {
        Ok(workers) => ApiResponse::ok(workers).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// ── Inference ──────────────────────────────────────────────────

/// POST /api/v1/inference
pub async fn execute_inference<C: WorkerClient>(
    State(state): State<ApiState<C>>,
    payload: Result<Json<InferenceRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match dispatch(&state, &request).await {
        Ok(served) => ApiResponse::ok(served).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> Response {
    ApiResponse::ok("ok").into_response()
}
