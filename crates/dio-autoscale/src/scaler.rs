//! Autoscaler — threshold-driven worker provisioning.
//!
//! Reads the live worker count from the scheduler and, when it (plus any
//! spawns still in flight) falls below the configured floor, requests one
//! new worker per tick. Provisioning failures are logged and retried on
//! the next tick; they never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use dio_scheduler::Scheduler;

use crate::ledger::SpawnLedger;
use crate::provisioner::ContainerProvisioner;

/// What a single autoscaler tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Enough workers are live or on their way.
    NoChange,
    /// The provisioner accepted a spawn request.
    SpawnRequested,
    /// The provisioner was asked and failed.
    SpawnFailed,
}

/// Spawns workers while the live count is below a threshold.
pub struct Autoscaler<P> {
    scheduler: Arc<Scheduler>,
    provisioner: P,
    /// Worker image handed to the provisioner.
    image: String,
    ledger: SpawnLedger,
}

impl<P: ContainerProvisioner> Autoscaler<P> {
    /// Create an autoscaler with a fresh spawn ledger (120s spawn timeout).
    pub fn new(scheduler: Arc<Scheduler>, provisioner: P, image: impl Into<String>) -> Self {
        Self {
            scheduler,
            provisioner,
            image: image.into(),
            ledger: SpawnLedger::default(),
        }
    }

    /// Use a shared ledger (the registration path settles its entries).
    pub fn with_ledger(mut self, ledger: SpawnLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Handle to this autoscaler's spawn ledger.
    pub fn ledger(&self) -> SpawnLedger {
        self.ledger.clone()
    }

    /// Evaluate demand once, spawning at most one worker.
    pub async fn tick(&self, threshold: usize) -> ScaleDecision {
        let live = self.scheduler.live_count();
        let pending = self.ledger.outstanding();

        if live + pending >= threshold {
            debug!(live, pending, threshold, "worker count satisfied");
            return ScaleDecision::NoChange;
        }

        info!(
            live,
            pending,
            threshold,
            image = %self.image,
            "demand high, spawning worker"
        );

        match self.provisioner.spawn_worker(&self.image).await {
            Ok(()) => {
                self.ledger.record();
                ScaleDecision::SpawnRequested
            }
            Err(e) => {
                warn!(image = %self.image, error = %e, "failed to spawn worker");
                ScaleDecision::SpawnFailed
            }
        }
    }

    /// Run the autoscaler loop until `shutdown` fires.
    pub async fn run(
        &self,
        interval: Duration,
        threshold: usize,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            interval_secs = interval.as_secs(),
            threshold,
            image = %self.image,
            spawn_timeout_secs = self.ledger.timeout().as_secs(),
            "autoscaler started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.tick(threshold).await;
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use dio_registry::WorkerRecord;

    use crate::provisioner::{ProvisionError, ProvisionResult};

    /// Provisioner that counts calls and optionally fails them.
    #[derive(Clone, Default)]
    struct FakeProvisioner {
        calls: Arc<AtomicUsize>,
        images: Arc<std::sync::Mutex<Vec<String>>>,
        fail: Arc<AtomicBool>,
    }

    impl FakeProvisioner {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ContainerProvisioner for FakeProvisioner {
        async fn spawn_worker(&self, image: &str) -> ProvisionResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.images.lock().unwrap().push(image.to_string());
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProvisionError::Rejected {
                    runtime: "fake".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "no such image".to_string(),
                });
            }
            Ok(())
        }
    }

    fn scheduler_with(n: usize) -> Arc<Scheduler> {
        let scheduler = Arc::new(Scheduler::new());
        scheduler.refresh(
            (0..n)
                .map(|i| WorkerRecord::new(format!("w{i}"), format!("10.0.0.{i}:50052")))
                .collect(),
        );
        scheduler
    }

    #[tokio::test]
    async fn spawns_once_when_below_threshold() {
        let fake = FakeProvisioner::default();
        let scaler = Autoscaler::new(scheduler_with(1), fake.clone(), "dio-python-worker:latest");

        assert_eq!(scaler.tick(3).await, ScaleDecision::SpawnRequested);
        assert_eq!(fake.calls(), 1);
        assert_eq!(
            *fake.images.lock().unwrap(),
            vec!["dio-python-worker:latest".to_string()]
        );
    }

    #[tokio::test]
    async fn no_spawn_at_threshold() {
        let fake = FakeProvisioner::default();
        let scaler = Autoscaler::new(scheduler_with(3), fake.clone(), "img");

        assert_eq!(scaler.tick(3).await, ScaleDecision::NoChange);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn large_deficit_still_spawns_one_per_tick() {
        let fake = FakeProvisioner::default();
        let scaler = Autoscaler::new(scheduler_with(0), fake.clone(), "img");

        scaler.tick(5).await;
        assert_eq!(fake.calls(), 1);
        scaler.tick(5).await;
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn pending_spawn_suppresses_duplicate() {
        let fake = FakeProvisioner::default();
        let scheduler = scheduler_with(1);
        let scaler = Autoscaler::new(scheduler.clone(), fake.clone(), "img");

        assert_eq!(scaler.tick(2).await, ScaleDecision::SpawnRequested);
        // The new worker has not registered yet.
        assert_eq!(scaler.tick(2).await, ScaleDecision::NoChange);
        assert_eq!(fake.calls(), 1);

        // It registers: the ledger is settled and the scheduler sees it.
        assert!(scaler.ledger().settle_one());
        scheduler.refresh(vec![
            WorkerRecord::new("w0", "a"),
            WorkerRecord::new("w-new", "b"),
        ]);
        assert_eq!(scaler.tick(2).await, ScaleDecision::NoChange);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn timed_out_spawn_is_retried() {
        let fake = FakeProvisioner::default();
        let scaler = Autoscaler::new(scheduler_with(0), fake.clone(), "img")
            .with_ledger(SpawnLedger::new(Duration::ZERO));
        assert_eq!(scaler.ledger().timeout(), Duration::ZERO);

        scaler.tick(1).await;
        scaler.tick(1).await;
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn failure_is_reported_and_retried_next_tick() {
        let fake = FakeProvisioner::default();
        fake.fail.store(true, Ordering::SeqCst);
        let scaler = Autoscaler::new(scheduler_with(0), fake.clone(), "img");

        assert_eq!(scaler.tick(1).await, ScaleDecision::SpawnFailed);
        assert_eq!(scaler.ledger().outstanding(), 0);

        fake.fail.store(false, Ordering::SeqCst);
        assert_eq!(scaler.tick(1).await, ScaleDecision::SpawnRequested);
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn zero_threshold_never_spawns() {
        let fake = FakeProvisioner::default();
        let scaler = Autoscaler::new(scheduler_with(0), fake.clone(), "img");

        assert_eq!(scaler.tick(0).await, ScaleDecision::NoChange);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn run_keeps_going_after_failures_and_stops_on_shutdown() {
        let fake = FakeProvisioner::default();
        fake.fail.store(true, Ordering::SeqCst);
        let scaler = Arc::new(Autoscaler::new(scheduler_with(0), fake.clone(), "img"));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let loop_scaler = scaler.clone();
        let handle = tokio::spawn(async move {
            loop_scaler
                .run(Duration::from_millis(5), 1, shutdown_rx)
                .await;
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(fake.calls() >= 2, "expected retries, got {}", fake.calls());
    }
}
