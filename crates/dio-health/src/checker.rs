//! Probe classification and failure tracking.

use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};

use dio_registry::WorkerRecord;
use dio_worker::{InferenceRequest, InferenceResponse, WorkerClient, WorkerResult};

/// Liveness of a worker as determined by its most recent probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Not probed yet.
    Unknown,
    /// The probe completed successfully.
    Healthy,
    /// No connection could be made.
    Unreachable,
    /// Connected, but the probe failed or did not finish in time.
    FailedProbe,
}

impl HealthStatus {
    /// True for `Unreachable` and `FailedProbe`.
    pub fn is_failure(self) -> bool {
        matches!(self, HealthStatus::Unreachable | HealthStatus::FailedProbe)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Unknown => "UNKNOWN",
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Unreachable => "UNREACHABLE",
            HealthStatus::FailedProbe => "FAILED_PROBE",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map the outcome of a `Predict` probe to a health status.
pub fn classify(result: &WorkerResult<InferenceResponse>) -> HealthStatus {
    match result {
        Ok(_) => HealthStatus::Healthy,
        Err(e) if e.is_unreachable() => HealthStatus::Unreachable,
        Err(_) => HealthStatus::FailedProbe,
    }
}

/// Probe one worker and log the outcome.
pub async fn probe<C: WorkerClient>(
    client: &C,
    worker: &WorkerRecord,
    timeout: Duration,
) -> HealthStatus {
    let result = client
        .predict(&worker.address, &InferenceRequest::probe(), timeout)
        .await;
    let status = classify(&result);

    match &result {
        Ok(_) => debug!(worker_id = %worker.worker_id, %status, "worker probed"),
        Err(e) => warn!(
            worker_id = %worker.worker_id,
            address = %worker.address,
            %status,
            error = %e,
            "worker probe failed"
        ),
    }
    status
}

/// Counts consecutive failed probes for one worker.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    consecutive_failures: u32,
    /// Failures before eviction. Zero disables eviction.
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
        }
    }

    /// Record a probe outcome. Returns true once the worker should be evicted.
    pub fn record(&mut self, status: HealthStatus) -> bool {
        match status {
            HealthStatus::Healthy => {
                if self.consecutive_failures > 0 {
                    debug!(
                        failures = self.consecutive_failures,
                        "worker recovered, failure count reset"
                    );
                }
                self.consecutive_failures = 0;
            }
            HealthStatus::Unreachable | HealthStatus::FailedProbe => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
            HealthStatus::Unknown => {}
        }
        self.should_evict()
    }

    pub fn should_evict(&self) -> bool {
        self.threshold > 0 && self.consecutive_failures >= self.threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dio_worker::WorkerError;

    fn unreachable() -> WorkerResult<InferenceResponse> {
        Err(WorkerError::Unreachable {
            address: "10.0.0.1:1".to_string(),
            reason: "connection refused".to_string(),
        })
    }

    #[test]
    fn classify_success_is_healthy() {
        assert_eq!(classify(&Ok(InferenceResponse::default())), HealthStatus::Healthy);
    }

    #[test]
    fn classify_connection_failure_is_unreachable() {
        assert_eq!(classify(&unreachable()), HealthStatus::Unreachable);
    }

    #[test]
    fn classify_application_and_timeout_as_failed_probe() {
        let app = Err(WorkerError::Application {
            address: "a".to_string(),
            status: 500,
            message: "boom".to_string(),
        });
        let slow = Err(WorkerError::Timeout {
            address: "a".to_string(),
            timeout: Duration::from_secs(2),
        });
        let garbled = Err(WorkerError::Protocol {
            address: "a".to_string(),
            reason: "bad json".to_string(),
        });

        assert_eq!(classify(&app), HealthStatus::FailedProbe);
        assert_eq!(classify(&slow), HealthStatus::FailedProbe);
        assert_eq!(classify(&garbled), HealthStatus::FailedProbe);
    }

    #[test]
    fn status_display_names() {
        assert_eq!(HealthStatus::Healthy.to_string(), "HEALTHY");
        assert_eq!(HealthStatus::FailedProbe.to_string(), "FAILED_PROBE");
        assert!(HealthStatus::Unreachable.is_failure());
        assert!(!HealthStatus::Unknown.is_failure());
    }

    #[test]
    fn tracker_evicts_at_threshold() {
        let mut tracker = FailureTracker::new(3);
        assert!(!tracker.record(HealthStatus::Unreachable));
        assert!(!tracker.record(HealthStatus::FailedProbe));
        assert!(tracker.record(HealthStatus::Unreachable));
        assert_eq!(tracker.consecutive_failures(), 3);
    }

    #[test]
    fn tracker_resets_on_success() {
        let mut tracker = FailureTracker::new(3);
        tracker.record(HealthStatus::Unreachable);
        tracker.record(HealthStatus::Unreachable);
        tracker.record(HealthStatus::Healthy);
        assert_eq!(tracker.consecutive_failures(), 0);

        assert!(!tracker.record(HealthStatus::Unreachable));
        assert!(!tracker.record(HealthStatus::Unreachable));
    }

    #[test]
    fn tracker_ignores_unknown() {
        let mut tracker = FailureTracker::new(1);
        assert!(!tracker.record(HealthStatus::Unknown));
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[test]
    fn zero_threshold_never_evicts() {
        let mut tracker = FailureTracker::new(0);
        for _ in 0..10 {
            assert!(!tracker.record(HealthStatus::Unreachable));
        }
        assert_eq!(tracker.consecutive_failures(), 10);
    }

    #[tokio::test]
    async fn probe_to_closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let worker = WorkerRecord::new("w1", address);
        let status = probe(
            &dio_worker::HttpWorkerClient::new(),
            &worker,
            Duration::from_millis(200),
        )
        .await;
        assert_eq!(status, HealthStatus::Unreachable);
    }
}
