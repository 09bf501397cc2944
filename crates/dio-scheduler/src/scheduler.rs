//! Scheduler — picks the worker that serves the next request.
//!
//! The `Scheduler` owns the rotation state used by the dispatch path:
//! - A snapshot of the registered workers, replaced on every refresh
//! - A round-robin cursor that survives refreshes (normalized to the new length)
//!
//! It is an explicit instance shared by handle (`Arc<Scheduler>`), never a
//! global. An empty worker list is a normal outcome (`None`), not an error.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use dio_registry::{StoreResult, WorkerRecord, WorkerRegistry};

use crate::cursor::RoundRobinCursor;

/// Rotation state guarded by the scheduler lock.
#[derive(Debug, Default)]
struct SchedulerState {
    /// Registry snapshot as of the last refresh.
    workers: Vec<WorkerRecord>,
    cursor: RoundRobinCursor,
}

/// Round-robin worker selection over the last refreshed worker list.
#[derive(Debug, Default)]
pub struct Scheduler {
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    /// Create a scheduler with no workers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the worker list in one step.
    ///
    /// The cursor is kept and wrapped into the new bounds, so refreshing
    /// with an unchanged list does not disturb the rotation.
    pub fn refresh(&self, workers: Vec<WorkerRecord>) {
        let mut state = self.lock();
        state.cursor.normalize(workers.len());
        state.workers = workers;
        debug!(
            workers = state.workers.len(),
            cursor = state.cursor.position(),
            "scheduler refreshed"
        );
    }

    /// Reload the worker list from the registry.
    ///
    /// Returns the number of workers now eligible for dispatch. On a
    /// registry error the previous list is left untouched.
    pub fn refresh_from(&self, registry: &WorkerRegistry) -> StoreResult<usize> {
        let workers = registry.list_all()?;
        let count = workers.len();
        self.refresh(workers);
        Ok(count)
    }

    /// Select the next worker in rotation.
    ///
    /// Returns `None` when no workers are known.
    pub fn pick_next(&self) -> Option<WorkerRecord> {
        let mut state = self.lock();
        let len = state.workers.len();
        let idx = state.cursor.advance(len)?;
        let worker = state.workers[idx].clone();
        debug!(worker_id = %worker.worker_id, index = idx, of = len, "worker picked");
        Some(worker)
    }

    /// Number of workers in the current snapshot.
    pub fn live_count(&self) -> usize {
        self.lock().workers.len()
    }

    /// Cursor position (for diagnostics).
    pub fn cursor_position(&self) -> usize {
        self.lock().cursor.position()
    }

    #[cfg(test)]
    fn with_cursor(workers: Vec<WorkerRecord>, position: usize) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                workers,
                cursor: RoundRobinCursor::at(position),
            }),
        }
    }

    // The guarded state is always left consistent, so a panic in another
    // holder does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn workers(n: usize) -> Vec<WorkerRecord> {
        (0..n)
            .map(|i| WorkerRecord::new(format!("w{i}"), format!("10.0.0.{i}:50052")))
            .collect()
    }

    fn pick_ids(scheduler: &Scheduler, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| scheduler.pick_next().unwrap().worker_id)
            .collect()
    }

    #[test]
    fn empty_scheduler_returns_none() {
        let scheduler = Scheduler::new();
        for _ in 0..5 {
            assert!(scheduler.pick_next().is_none());
        }
        assert_eq!(scheduler.cursor_position(), 0);
        assert_eq!(scheduler.live_count(), 0);
    }

    #[test]
    fn picks_in_round_robin_order() {
        let scheduler = Scheduler::new();
        scheduler.refresh(workers(3));

        assert_eq!(pick_ids(&scheduler, 7), vec!["w0", "w1", "w2", "w0", "w1", "w2", "w0"]);
    }

    #[test]
    fn fairness_over_many_picks() {
        for k in 1..=6 {
            for n in [0, 1, k - 1, k, k + 1, 3 * k + 2, 100] {
                let scheduler = Scheduler::new();
                scheduler.refresh(workers(k));

                let mut counts: HashMap<String, usize> = HashMap::new();
                for id in pick_ids(&scheduler, n) {
                    *counts.entry(id).or_default() += 1;
                }

                let floor = n / k;
                let ceil = n.div_ceil(k);
                for w in workers(k) {
                    let c = counts.get(&w.worker_id).copied().unwrap_or(0);
                    assert!(
                        c == floor || c == ceil,
                        "k={k} n={n} worker={} picked {c} times",
                        w.worker_id
                    );
                }
            }
        }
    }

    #[test]
    fn sequence_is_deterministic_from_fixed_cursor() {
        let a = Scheduler::with_cursor(workers(4), 2);
        let b = Scheduler::with_cursor(workers(4), 2);

        let seq = pick_ids(&a, 9);
        assert_eq!(seq, pick_ids(&b, 9));
        assert_eq!(&seq[..4], &["w2", "w3", "w0", "w1"]);
    }

    #[test]
    fn shrinking_refresh_keeps_cursor_in_bounds() {
        let scheduler = Scheduler::with_cursor(workers(5), 4);
        scheduler.refresh(workers(2));

        assert!(scheduler.cursor_position() < 2);
        let picked = scheduler.pick_next().unwrap();
        assert!(picked.worker_id == "w0" || picked.worker_id == "w1");
    }

    #[test]
    fn refresh_to_empty_resets_cursor() {
        let scheduler = Scheduler::new();
        scheduler.refresh(workers(3));
        scheduler.pick_next();
        scheduler.pick_next();

        scheduler.refresh(Vec::new());
        assert_eq!(scheduler.cursor_position(), 0);
        assert!(scheduler.pick_next().is_none());

        scheduler.refresh(workers(3));
        assert_eq!(scheduler.pick_next().unwrap().worker_id, "w0");
    }

    #[test]
    fn refresh_with_same_list_continues_rotation() {
        let scheduler = Scheduler::new();
        let list = workers(3);

        let mut seq = Vec::new();
        for _ in 0..6 {
            scheduler.refresh(list.clone());
            seq.push(scheduler.pick_next().unwrap().worker_id);
        }
        assert_eq!(seq, vec!["w0", "w1", "w2", "w0", "w1", "w2"]);
    }

    #[test]
    fn refresh_from_registry() {
        let registry = WorkerRegistry::open_in_memory().unwrap();
        registry.register(&WorkerRecord::new("w1", "A")).unwrap();
        registry.register(&WorkerRecord::new("w2", "B")).unwrap();

        let scheduler = Scheduler::new();
        assert_eq!(scheduler.refresh_from(&registry).unwrap(), 2);
        assert_eq!(scheduler.live_count(), 2);

        registry.deregister("w1").unwrap();
        assert_eq!(scheduler.refresh_from(&registry).unwrap(), 1);
        assert_eq!(scheduler.pick_next().unwrap().worker_id, "w2");
    }

    #[test]
    fn newly_registered_worker_needs_refresh() {
        let registry = WorkerRegistry::open_in_memory().unwrap();
        let scheduler = Scheduler::new();
        scheduler.refresh_from(&registry).unwrap();

        registry.register(&WorkerRecord::new("w1", "A")).unwrap();
        assert!(scheduler.pick_next().is_none());

        scheduler.refresh_from(&registry).unwrap();
        assert_eq!(scheduler.pick_next().unwrap().worker_id, "w1");
    }

    #[test]
    fn concurrent_refresh_and_pick_never_tear() {
        use std::thread;

        let scheduler = Arc::new(Scheduler::new());
        scheduler.refresh(workers(4));
        let mut handles = vec![];

        for t in 0..4 {
            let scheduler = scheduler.clone();
            handles.push(thread::spawn(move || {
                let mut picked = Vec::new();
                for i in 0..200 {
                    if t % 2 == 0 && i % 10 == 0 {
                        scheduler.refresh(workers(1 + (i / 10) % 5));
                    }
                    if let Some(w) = scheduler.pick_next() {
                        picked.push(w.worker_id);
                    }
                }
                picked
            }));
        }

        let known: Vec<String> = workers(5).into_iter().map(|w| w.worker_id).collect();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(known.contains(&id));
            }
        }
        assert!(scheduler.cursor_position() < scheduler.live_count().max(1));
    }
}
