//! Health monitor — background loop that probes every registered worker.
//!
//! Each tick is a fresh evaluation: list the registry, probe every worker
//! in its own task, classify the outcomes. The only state carried between
//! ticks is the per-worker consecutive-failure count used for eviction.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use dio_registry::{StoreResult, WorkerId, WorkerRecord, WorkerRegistry};
use dio_worker::WorkerClient;

use crate::checker::{probe, FailureTracker, HealthStatus};

/// Callback invoked after a worker has been evicted from the registry.
///
/// The daemon uses this to refresh the scheduler right away instead of
/// waiting for the next dispatch.
pub type EvictionCallback = Arc<dyn Fn(WorkerRecord) -> BoxFuture + Send + Sync>;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Outcome of probing one worker during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub worker: WorkerRecord,
    pub status: HealthStatus,
    /// Consecutive failures including this probe.
    pub consecutive_failures: u32,
    /// Whether this tick removed the worker from the registry.
    pub evicted: bool,
}

/// Probes registered workers on an interval and evicts dead ones.
pub struct HealthMonitor<C> {
    registry: WorkerRegistry,
    client: C,
    probe_timeout: Duration,
    eviction_threshold: u32,
    /// worker_id → consecutive failure tracking.
    trackers: Mutex<HashMap<WorkerId, FailureTracker>>,
    on_evict: Option<EvictionCallback>,
}

impl<C> HealthMonitor<C>
where
    C: WorkerClient + Clone + 'static,
{
    /// Create a monitor with a 2s probe timeout and an eviction threshold of 3.
    pub fn new(registry: WorkerRegistry, client: C) -> Self {
        Self {
            registry,
            client,
            probe_timeout: Duration::from_secs(2),
            eviction_threshold: 3,
            trackers: Mutex::new(HashMap::new()),
            on_evict: None,
        }
    }

    /// Set the deadline for a single probe.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set how many consecutive failures evict a worker. Zero disables eviction.
    pub fn with_eviction_threshold(mut self, threshold: u32) -> Self {
        self.eviction_threshold = threshold;
        self
    }

    /// Set a callback for evicted workers.
    pub fn with_eviction_callback(mut self, callback: EvictionCallback) -> Self {
        self.on_evict = Some(callback);
        self
    }

    /// Probe every registered worker once.
    ///
    /// Fails only if the registry cannot be listed; individual probe
    /// failures are reported in the returned list.
    pub async fn tick(&self) -> StoreResult<Vec<ProbeReport>> {
        let workers = self.registry.list_all()?;

        // Spawn every probe before awaiting any of them.
        let probes: Vec<_> = workers
            .into_iter()
            .map(|worker| {
                let client = self.client.clone();
                let timeout = self.probe_timeout;
                let task_worker = worker.clone();
                let handle =
                    tokio::spawn(async move { probe(&client, &task_worker, timeout).await });
                (worker, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(probes.len());
        for (worker, handle) in probes {
            let status = match handle.await {
                Ok(status) => status,
                Err(e) => {
                    warn!(worker_id = %worker.worker_id, error = %e, "probe task failed");
                    HealthStatus::FailedProbe
                }
            };
            outcomes.push((worker, status));
        }

        let mut reports = Vec::with_capacity(outcomes.len());
        let mut to_evict = Vec::new();
        {
            let mut trackers = self.lock_trackers();
            let present: HashSet<&str> =
                outcomes.iter().map(|(w, _)| w.worker_id.as_str()).collect();
            trackers.retain(|id, _| present.contains(id.as_str()));

            for (worker, status) in outcomes {
                let tracker = trackers
                    .entry(worker.worker_id.clone())
                    .or_insert_with(|| FailureTracker::new(self.eviction_threshold));
                if tracker.record(status) {
                    to_evict.push(reports.len());
                }
                reports.push(ProbeReport {
                    consecutive_failures: tracker.consecutive_failures(),
                    worker,
                    status,
                    evicted: false,
                });
            }
        }

        for idx in to_evict {
            let evicted = self.evict(&reports[idx].worker).await;
            reports[idx].evicted = evicted;
        }

        let unhealthy = reports.iter().filter(|r| r.status.is_failure()).count();
        debug!(probed = reports.len(), unhealthy, "health tick complete");
        Ok(reports)
    }

    /// Run the monitor loop until `shutdown` fires.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = interval.as_secs(),
            probe_timeout_ms = self.probe_timeout.as_millis() as u64,
            eviction_threshold = self.eviction_threshold,
            "health monitor started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "health tick could not list workers");
                    }
                }
                _ = shutdown.changed() => {
                    info!("health monitor shutting down");
                    break;
                }
            }
        }
    }

    /// Current consecutive failure count for a worker.
    pub fn consecutive_failures(&self, worker_id: &str) -> u32 {
        self.lock_trackers()
            .get(worker_id)
            .map(FailureTracker::consecutive_failures)
            .unwrap_or(0)
    }

    /// Remove a worker from the registry. Returns true if it was removed.
    ///
    /// Only the exact record that was probed is removed; if the worker
    /// re-registered meanwhile, the newer registration stays and its
    /// failure count starts over. On a registry error the tracker keeps its
    /// count, so the next tick retries.
    async fn evict(&self, worker: &WorkerRecord) -> bool {
        match self.registry.deregister_if(worker) {
            Ok(true) => {
                self.lock_trackers().remove(&worker.worker_id);
                info!(
                    worker_id = %worker.worker_id,
                    address = %worker.address,
                    threshold = self.eviction_threshold,
                    "worker evicted after repeated probe failures"
                );
                if let Some(ref cb) = self.on_evict {
                    cb(worker.clone()).await;
                }
                true
            }
            Ok(false) => {
                self.lock_trackers().remove(&worker.worker_id);
                info!(
                    worker_id = %worker.worker_id,
                    address = %worker.address,
                    "worker re-registered or removed since probe, eviction skipped"
                );
                false
            }
            Err(e) => {
                error!(worker_id = %worker.worker_id, error = %e, "failed to evict worker");
                false
            }
        }
    }

    fn lock_trackers(&self) -> MutexGuard<'_, HashMap<WorkerId, FailureTracker>> {
        self.trackers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
