//! dio-health — liveness checking for registered workers.
//!
//! On every tick the monitor lists the registry, probes each worker with
//! an empty `Predict` call, and logs the outcome. Probes run concurrently
//! in their own tasks, so a slow or crashing probe never holds up the rest.
//!
//! # Architecture
//!
//! ```text
//! HealthMonitor
//!   ├── WorkerRegistry (list workers, deregister evicted ones)
//!   ├── WorkerClient   (probe = Predict with an empty request)
//!   └── FailureTracker per worker (consecutive failures)
//! ```
//!
//! # Eviction
//!
//! A worker that fails `eviction_threshold` probes in a row is removed from
//! the registry. One healthy probe resets its counter. Probe results are
//! otherwise advisory: they never reorder or filter dispatch directly.

pub mod checker;
pub mod monitor;

pub use checker::{FailureTracker, HealthStatus};
pub use monitor::{EvictionCallback, HealthMonitor, ProbeReport};
