//! Domain types for the worker registry.

use serde::{Deserialize, Serialize};

/// Unique identifier for a worker, assigned by the worker or an operator.
pub type WorkerId = String;

/// Identity of a worker process as announced at registration.
///
/// The same struct is stored in the registry, cached by the scheduler, and
/// carried over the API, so the persisted and in-memory forms cannot drift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerRecord {
    pub worker_id: WorkerId,
    /// Network location (`host:port`) used to reach the worker.
    pub address: String,
    /// Models the worker advertises. Informational only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

impl WorkerRecord {
    pub fn new(worker_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            address: address.into(),
            models: Vec::new(),
        }
    }

    /// Attach the advertised model list.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }
}
