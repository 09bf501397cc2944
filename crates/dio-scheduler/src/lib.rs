//! dio-scheduler — worker selection for request dispatch.
//!
//! Holds an in-memory snapshot of the registered workers and hands them
//! out in strict round-robin order. The snapshot is rebuilt wholesale from
//! the `WorkerRegistry` right before each dispatch decision.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (shared via Arc)
//!   └── Mutex<SchedulerState>
//!       ├── Vec<WorkerRecord>   (registry snapshot)
//!       └── RoundRobinCursor    (next index to hand out)
//! ```
//!
//! `refresh` and `pick_next` take the same lock, so a pick never observes
//! a half-replaced list.

pub mod cursor;
pub mod scheduler;

pub use cursor::RoundRobinCursor;
pub use scheduler::Scheduler;
