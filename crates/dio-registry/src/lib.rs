//! dio-registry — durable worker registry for the DIO control plane.
//!
//! Backed by [redb](https://docs.rs/redb). Every worker that announces
//! itself to the control plane is recorded here, keyed by its `worker_id`.
//! The registry is the single source of truth for worker identity; the
//! scheduler's rotation list is a disposable cache rebuilt from it.
//!
//! # Architecture
//!
//! `WorkerRecord`s are JSON-serialized into the `workers` table
//! (`&str` keys, `&[u8]` values). Every write is its own redb write
//! transaction, committed before the call returns, so a crash mid-write
//! leaves the previous record intact.
//!
//! The `WorkerRegistry` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks. The database is
//! closed when the last clone is dropped.

pub mod error;
pub mod registry;
pub mod tables;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use registry::WorkerRegistry;
pub use types::*;
