//! dio-api — the control plane's HTTP surface.
//!
//! Workers register here when they start, and clients submit inference
//! requests here to be forwarded to a worker chosen by the scheduler.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/workers` | Register (or re-register) a worker |
//! | GET | `/api/v1/workers` | List registered workers |
//! | POST | `/api/v1/inference` | Dispatch an inference request |
//! | GET | `/healthz` | Control-plane liveness |
//!
//! Every JSON response uses the `{success, data?, error?}` envelope.

pub mod dispatch;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};

use dio_autoscale::SpawnLedger;
use dio_registry::WorkerRegistry;
use dio_scheduler::Scheduler;
use dio_worker::WorkerClient;

pub use dispatch::dispatch;
pub use error::{DispatchError, DispatchResult};

/// Default upper bound on one forwarded `Predict` call.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState<C> {
    pub registry: WorkerRegistry,
    pub scheduler: Arc<Scheduler>,
    pub client: C,
    /// Settled when a previously unknown worker registers.
    pub ledger: Option<SpawnLedger>,
    pub dispatch_timeout: Duration,
}

impl<C: WorkerClient> ApiState<C> {
    pub fn new(registry: WorkerRegistry, scheduler: Arc<Scheduler>, client: C) -> Self {
        Self {
            registry,
            scheduler,
            client,
            ledger: None,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    pub fn with_ledger(mut self, ledger: SpawnLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }
}

/// Build the complete API router.
pub fn build_router<C>(state: ApiState<C>) -> Router
where
    C: WorkerClient + Clone + 'static,
{
    let api_routes = Router::new()
        .route(
            "/workers",
            get(handlers::list_workers::<C>).post(handlers::register_worker::<C>),
        )
        .route("/inference", post(handlers::execute_inference::<C>))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
