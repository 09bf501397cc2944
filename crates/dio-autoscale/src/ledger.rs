//! Spawn ledger — provisioning requests that have not produced a worker yet.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Shared, in-memory list of outstanding spawn requests.
///
/// Cloned into the registration path so that a newly registered worker
/// settles the oldest outstanding spawn.
#[derive(Debug, Clone)]
pub struct SpawnLedger {
    pending: Arc<Mutex<VecDeque<Instant>>>,
    timeout: Duration,
}

impl SpawnLedger {
    /// Entries older than `timeout` are treated as failed spawns.
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(VecDeque::new())),
            timeout,
        }
    }

    /// Note that a spawn was requested just now.
    pub fn record(&self) {
        self.record_at(Instant::now());
    }

    /// Settle the oldest outstanding spawn. Returns false if none was pending.
    pub fn settle_one(&self) -> bool {
        let settled = self.lock().pop_front().is_some();
        if settled {
            debug!("pending spawn settled by registration");
        }
        settled
    }

    /// Number of spawns still in flight.
    pub fn outstanding(&self) -> usize {
        self.outstanding_at(Instant::now())
    }

    /// Age at which an unsettled spawn is written off.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn record_at(&self, at: Instant) {
        self.lock().push_back(at);
    }

    fn outstanding_at(&self, now: Instant) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        // Entries are pushed in time order, so expired ones sit at the front.
        while pending
            .front()
            .is_some_and(|requested| now.saturating_duration_since(*requested) >= self.timeout)
        {
            pending.pop_front();
        }
        let expired = before - pending.len();
        if expired > 0 {
            debug!(expired, timeout_secs = self.timeout.as_secs(), "pending spawns timed out");
        }
        pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SpawnLedger {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_settles_in_order() {
        let ledger = SpawnLedger::new(Duration::from_secs(60));
        ledger.record();
        ledger.record();
        assert_eq!(ledger.outstanding(), 2);

        assert!(ledger.settle_one());
        assert_eq!(ledger.outstanding(), 1);
        assert!(ledger.settle_one());
        assert!(!ledger.settle_one());
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn entries_expire_after_timeout() {
        let ledger = SpawnLedger::new(Duration::from_secs(60));
        let start = Instant::now();
        ledger.record_at(start);
        ledger.record_at(start + Duration::from_secs(30));

        assert_eq!(ledger.outstanding_at(start + Duration::from_secs(59)), 2);
        assert_eq!(ledger.outstanding_at(start + Duration::from_secs(60)), 1);
        assert_eq!(ledger.outstanding_at(start + Duration::from_secs(90)), 0);
    }

    #[test]
    fn clones_share_state() {
        let ledger = SpawnLedger::default();
        assert_eq!(ledger.timeout(), Duration::from_secs(120));
        let registration_side = ledger.clone();

        ledger.record();
        assert_eq!(registration_side.outstanding(), 1);
        assert!(registration_side.settle_one());
        assert_eq!(ledger.outstanding(), 0);
    }
}
