//! dio-autoscale — keeps enough workers running.
//!
//! Compares the scheduler's live worker count against a floor and, when
//! short, asks a `ContainerProvisioner` to start one more worker. Scale-up
//! only; new workers join by registering themselves.
//!
//! # Scaling Algorithm
//!
//! ```text
//! live    = scheduler.live_count()
//! pending = spawns requested but not yet registered (and not timed out)
//!
//! if live + pending < threshold:
//!     provisioner.spawn_worker(image)   // at most once per tick
//!     on success: pending += 1
//! ```
//!
//! A pending spawn is settled when a new worker id registers, or dropped
//! once `spawn_timeout` elapses, so a slow container start does not trigger
//! a second spawn for the same deficit.

pub mod ledger;
pub mod provisioner;
pub mod scaler;

pub use ledger::SpawnLedger;
pub use provisioner::{ContainerProvisioner, DockerProvisioner, ProvisionError, ProvisionResult};
pub use scaler::{Autoscaler, ScaleDecision};
