//! # Immutable per-scan snapshot.
//!
//! A [`ScanReport`] is built fresh on every watchdog pass, stored as the
//! latest result for synchronous queries, and fanned out to listeners.
//! It is never mutated after construction; consumers share it as
//! `Arc<ScanReport>`.
//!
//! ## Classification buckets
//! Each tracked execution appears in **at most one** of:
//! - `pending`: submitted, not started, not cancelled
//! - `running`: started, not terminated, not cancelled
//! - `unfinished_cancel`: cancelled after starting, not yet terminated
//!
//! The derived maxima give the self-protection policy a cheap signal for
//! pool starvation without re-walking the registry.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::Execution;

/// Snapshot of one watchdog scan.
#[derive(Clone)]
pub struct ScanReport {
    /// Wall-clock timestamp of the scan.
    pub at: SystemTime,
    /// Executions submitted but not yet claimed by a worker.
    pub pending: Vec<Arc<Execution>>,
    /// Executions a worker is currently running.
    pub running: Vec<Arc<Execution>>,
    /// Executions cancelled after starting that have not yet terminated.
    pub unfinished_cancel: Vec<Arc<Execution>>,
    /// Longest time any pending execution has been waiting.
    pub max_pending: Duration,
    /// Longest time any running execution has been running.
    pub max_running: Duration,
}

impl ScanReport {
    /// An empty report dated now; the watchdog's state before its first scan.
    pub fn empty() -> Self {
        Self {
            at: SystemTime::now(),
            pending: Vec::new(),
            running: Vec::new(),
            unfinished_cancel: Vec::new(),
            max_pending: Duration::ZERO,
            max_running: Duration::ZERO,
        }
    }

    /// Total number of executions across all buckets.
    pub fn tracked(&self) -> usize {
        self.pending.len() + self.running.len() + self.unfinished_cancel.len()
    }

    /// True when nothing is in flight.
    pub fn is_idle(&self) -> bool {
        self.tracked() == 0
    }
}

impl std::fmt::Debug for ScanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanReport")
            .field("pending", &self.pending.len())
            .field("running", &self.running.len())
            .field("unfinished_cancel", &self.unfinished_cancel.len())
            .field("max_pending", &self.max_pending)
            .field("max_running", &self.max_running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_is_idle() {
        let report = ScanReport::empty();
        assert!(report.is_idle());
        assert_eq!(report.tracked(), 0);
        assert_eq!(report.max_pending, Duration::ZERO);
        assert_eq!(report.max_running, Duration::ZERO);
    }
}
