//! redb table definitions for the worker registry.

use redb::TableDefinition;

/// Worker registrations keyed by `worker_id`, values are JSON `WorkerRecord`s.
pub const WORKERS: TableDefinition<&str, &[u8]> = TableDefinition::new("workers");
