//! Inference payloads exchanged with workers.

use serde::{Deserialize, Serialize};

/// A request forwarded to a worker's `Predict` endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InferenceRequest {
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl InferenceRequest {
    /// The empty request used as a liveness probe.
    pub fn probe() -> Self {
        Self::default()
    }
}

/// A worker's answer to `Predict`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InferenceResponse {
    #[serde(default)]
    pub output: Vec<u8>,
    #[serde(default)]
    pub latency_ms: f64,
    /// Prompt plus completion tokens, when the worker counts them.
    #[serde(default)]
    pub tokens_used: u32,
    /// Set when the worker's context window is nearly exhausted.
    #[serde(default)]
    pub context_full: bool,
}
