//! dio-worker — talking to inference workers.
//!
//! Workers expose a single `Predict` operation over JSON/HTTP:
//!
//! ```text
//! POST http://{address}/predict
//!   body:  InferenceRequest  { model_id, data }
//!   2xx:   InferenceResponse { output, latency_ms, tokens_used, context_full }
//!   other: application error, body carries the message
//! ```
//!
//! The control plane calls it to forward dispatched requests and, with an
//! empty request, as the health probe. `WorkerClient` is the seam both
//! callers are generic over; `HttpWorkerClient` is the real transport.

pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpWorkerClient, WorkerClient};
pub use error::{WorkerError, WorkerResult};
pub use types::{InferenceRequest, InferenceResponse};
