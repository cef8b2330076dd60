//! # Global transport configuration.
//!
//! Provides [`Config`] — centralized settings for the transport runtime.
//!
//! Config is consumed in two places:
//! 1. **Transport assembly**: `Transport::new(config, receiver, interceptors)`
//! 2. **Watchdog construction**: inactivity timeout and protection thresholds
//!
//! ## Sentinel values
//! - `workers = 0` → unbounded (no worker-pool semaphore created)
//! - protection thresholds are `None` → the corresponding trigger is disabled

use std::time::Duration;

/// Global configuration for the transport runtime.
///
/// Defines:
/// - **Worker pool**: how many handlers may run concurrently
/// - **Long-polling**: how long an idle poll blocks before returning empty
/// - **Supervision**: session inactivity limit for the watchdog
/// - **Self-protection**: pending-count and starvation thresholds
///
/// ## Field semantics
/// - `workers`: handler concurrency limit (`0` = unbounded)
/// - `poll_timeout`: maximum block time of [`Channel::poll`](crate::Channel::poll)
/// - `inactivity_timeout`: idle time after which a session's executions are cancelled
/// - `pending_threshold`: pending count that triggers cancel-everything (`None` = off)
/// - `starvation_threshold`: pending age that triggers cancel-longest-running (`None` = off)
/// - `listener_queue_capacity`: per-listener notification queue bound (min 1; clamped)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of handlers running concurrently.
    ///
    /// - `0` = unbounded (no semaphore)
    /// - `n > 0` = at most `n` handlers run simultaneously; further
    ///   submissions queue as pending until a worker frees up
    pub workers: usize,

    /// Maximum time a long-poll request blocks waiting for outbound messages.
    ///
    /// A short fixed timeout amortizes one idle response per interval
    /// rather than per message.
    pub poll_timeout: Duration,

    /// Idle time after which the watchdog cancels a session's executions.
    ///
    /// Measured against the session's last-activity instant, checked on
    /// every scan.
    pub inactivity_timeout: Duration,

    /// Pending-execution count that makes the protection policy cancel
    /// everything. `None` disables the trigger.
    pub pending_threshold: Option<usize>,

    /// Pending-execution age that makes the protection policy cancel the
    /// longest-running execution. `None` disables the trigger.
    pub starvation_threshold: Option<Duration>,

    /// Capacity of each listener's notification queue.
    ///
    /// Listeners that lag behind drop notifications (warn). Minimum value
    /// is 1, enforced by the listener set.
    pub listener_queue_capacity: usize,
}

impl Config {
    /// Returns the worker-pool limit as an `Option`.
    ///
    /// - `None` → unbounded (no semaphore)
    /// - `Some(n)` → at most `n` concurrent handlers
    #[inline]
    pub fn worker_limit(&self) -> Option<usize> {
        if self.workers == 0 {
            None
        } else {
            Some(self.workers)
        }
    }

    /// Returns the listener queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn listener_queue_capacity_clamped(&self) -> usize {
        self.listener_queue_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `workers = 4` (small bounded pool)
    /// - `poll_timeout = 30s` (typical long-poll interval)
    /// - `inactivity_timeout = 300s` (five idle minutes before cleanup)
    /// - `pending_threshold = None` (cancel-everything disabled)
    /// - `starvation_threshold = None` (cancel-longest disabled)
    /// - `listener_queue_capacity = 1024`
    fn default() -> Self {
        Self {
            workers: 4,
            poll_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(300),
            pending_threshold: None,
            starvation_threshold: None,
            listener_queue_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_limit_zero_is_unbounded() {
        let mut cfg = Config::default();
        cfg.workers = 0;
        assert!(cfg.worker_limit().is_none());
    }

    #[test]
    fn test_worker_limit_nonzero() {
        let mut cfg = Config::default();
        cfg.workers = 8;
        assert_eq!(cfg.worker_limit(), Some(8));
    }

    #[test]
    fn test_listener_queue_capacity_clamped() {
        let mut cfg = Config::default();
        cfg.listener_queue_capacity = 0;
        assert_eq!(cfg.listener_queue_capacity_clamped(), 1);
    }
}
