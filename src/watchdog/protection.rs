//! # Self-protection policy ("hara-kiri")
//!
//! Consumes watchdog scan reports and triggers recovery when the worker
//! pool looks wedged. Not a scheduler: the decision runs on whatever pass
//! produced the report, and the two recovery operations themselves live on
//! the [`Watchdog`].
//!
//! ## Triggers
//! - `pending_threshold`: this many executions stuck pending → the pool is
//!   presumed exhausted, **cancel everything**.
//! - `starvation_threshold`: the oldest pending execution has waited this
//!   long → **cancel the longest-running execution** to free one worker.
//!
//! Crossing both in one report performs only the stronger action.
//! `None` disables a trigger; both `None` makes the policy inert.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::listeners::WatchListener;
use crate::watchdog::{ScanReport, Watchdog};

/// Recovery action chosen for one scan report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtectionAction {
    /// Cancel only the running execution with the longest elapsed runtime.
    ///
    /// Use when:
    /// - Pending work is aging but the pool still makes progress
    /// - One stuck delivery is likely hogging a worker
    CancelLongestRunning,

    /// Cancel every tracked execution.
    ///
    /// Use when:
    /// - The pending backlog says no worker is coming back
    /// - Recovering the pool beats finishing in-flight work
    CancelAll,
}

/// Threshold-driven consumer of scan reports.
///
/// Holds the watchdog weakly, like any other listener-side collaborator:
/// the policy never keeps the registry alive on its own.
pub struct ProtectionPolicy {
    pending_threshold: Option<usize>,
    starvation_threshold: Option<Duration>,
    watchdog: Weak<Watchdog>,
}

impl ProtectionPolicy {
    /// Creates a policy wired to `watchdog`, thresholds taken from `cfg`.
    pub fn new(cfg: &Config, watchdog: &Arc<Watchdog>) -> Self {
        Self {
            pending_threshold: cfg.pending_threshold,
            starvation_threshold: cfg.starvation_threshold,
            watchdog: Arc::downgrade(watchdog),
        }
    }

    /// Pure decision function: what, if anything, should happen for `report`.
    ///
    /// Exposed so external policies can reuse the thresholds without
    /// registering this listener.
    pub fn assess(&self, report: &ScanReport) -> Option<ProtectionAction> {
        if let Some(limit) = self.pending_threshold {
            if report.pending.len() >= limit {
                return Some(ProtectionAction::CancelAll);
            }
        }
        if let Some(age) = self.starvation_threshold {
            if !report.pending.is_empty() && report.max_pending >= age {
                return Some(ProtectionAction::CancelLongestRunning);
            }
        }
        None
    }

    /// True when both triggers are disabled.
    pub fn is_inert(&self) -> bool {
        self.pending_threshold.is_none() && self.starvation_threshold.is_none()
    }
}

#[async_trait]
impl WatchListener for ProtectionPolicy {
    async fn on_scan(&self, report: &ScanReport) {
        let Some(action) = self.assess(report) else {
            return;
        };
        let Some(watchdog) = self.watchdog.upgrade() else {
            return;
        };
        match action {
            ProtectionAction::CancelAll => {
                eprintln!(
                    "[msgvisor] protection: pool wedged (pending={}), cancelling everything",
                    report.pending.len()
                );
                watchdog.cancel_all();
            }
            ProtectionAction::CancelLongestRunning => {
                eprintln!(
                    "[msgvisor] protection: starvation (max-pending={:?}), cancelling longest running",
                    report.max_pending
                );
                watchdog.cancel_max_runtime_execution();
            }
        }
    }

    fn name(&self) -> &'static str {
        "ProtectionPolicy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::{noop_execution, test_watchdog};

    fn policy(
        pending: Option<usize>,
        starvation: Option<Duration>,
    ) -> (ProtectionPolicy, Arc<Watchdog>) {
        let mut cfg = Config::default();
        cfg.pending_threshold = pending;
        cfg.starvation_threshold = starvation;
        let watchdog = test_watchdog();
        (ProtectionPolicy::new(&cfg, &watchdog), watchdog)
    }

    fn report_with(pending: usize, max_pending: Duration) -> ScanReport {
        let mut report = ScanReport::empty();
        for i in 0..pending {
            report.pending.push(noop_execution(&format!("p{i}")));
        }
        report.max_pending = max_pending;
        report
    }

    #[test]
    fn test_inert_when_thresholds_unset() {
        let (policy, _watchdog) = policy(None, None);
        assert!(policy.is_inert());
        let report = report_with(100, Duration::from_secs(600));
        assert_eq!(policy.assess(&report), None);
    }

    #[test]
    fn test_pending_count_triggers_cancel_all() {
        let (policy, _watchdog) = policy(Some(3), None);
        assert_eq!(policy.assess(&report_with(2, Duration::ZERO)), None);
        assert_eq!(
            policy.assess(&report_with(3, Duration::ZERO)),
            Some(ProtectionAction::CancelAll)
        );
    }

    #[test]
    fn test_starvation_triggers_cancel_longest_running() {
        let (policy, _watchdog) = policy(None, Some(Duration::from_secs(10)));
        assert_eq!(policy.assess(&report_with(1, Duration::from_secs(5))), None);
        assert_eq!(
            policy.assess(&report_with(1, Duration::from_secs(10))),
            Some(ProtectionAction::CancelLongestRunning)
        );
    }

    #[test]
    fn test_starvation_needs_pending_work() {
        let (policy, _watchdog) = policy(None, Some(Duration::from_secs(10)));
        let report = report_with(0, Duration::from_secs(60));
        assert_eq!(
            policy.assess(&report),
            None,
            "an empty pending list never counts as starvation"
        );
    }

    #[test]
    fn test_cancel_all_outranks_starvation() {
        let (policy, _watchdog) = policy(Some(2), Some(Duration::from_secs(1)));
        let report = report_with(5, Duration::from_secs(60));
        assert_eq!(policy.assess(&report), Some(ProtectionAction::CancelAll));
    }
}
