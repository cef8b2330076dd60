//! # Execution: tracked lifecycle record for one submitted message.
//!
//! An [`Execution`] links a message to its [`Handler`] and to the
//! cancellation handle of the scheduled pool task. The watchdog keeps one
//! per in-flight message and derives the logical state from three atomic
//! facts: the set-once cancellation stamp here and the started/terminated
//! flags on the handler.
//!
//! ## State machine
//! ```text
//! Pending ──(worker claims start slot)──► Running ──(body returns/fails)──► Terminated
//!    │                                       │
//!    │ cancel() before claim                 │ cancel() after claim
//!    ▼                                       ▼
//! Terminated (cleanly cancelled,          UnfinishedCancel (reported each scan
//! no handler logic runs)                  until the body unwinds to Terminated)
//! ```
//!
//! ## Rules
//! - The cancellation stamp is **set-once**: only the first `cancel()`
//!   records it and fires the token; later calls are no-ops
//! - An execution is in exactly one of {pending, running,
//!   unfinished-cancel, terminated} at any observation instant
//! - `runtime()` is defined only while running

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::core::handler::Handler;
use crate::core::Message;

/// Set-once cancellation record: monotonic instant for durations,
/// wall clock for listener payloads.
#[derive(Debug, Clone, Copy)]
struct CancelStamp {
    at: Instant,
    wall: SystemTime,
}

/// One in-flight message: lifecycle timestamps, cancellation flag, and the
/// link to its handler.
///
/// Created together with its handler when a message arrives on a channel;
/// mutated by the pool worker (start/terminate, via the handler) and by
/// the watchdog or explicit callers (cancel); dropped from tracking once
/// terminated or cleanly cancelled before start.
pub struct Execution {
    message: Message,
    created_at: Instant,
    canceled: OnceLock<CancelStamp>,
    handler: Arc<Handler>,
    /// Cancellable handle to the scheduled pool task.
    cancel_token: CancellationToken,
}

impl Execution {
    /// Creates a new execution for `message`, owning `handler`.
    pub(crate) fn new(
        message: Message,
        handler: Arc<Handler>,
        cancel_token: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            message,
            created_at: Instant::now(),
            canceled: OnceLock::new(),
            handler,
            cancel_token,
        })
    }

    /// Returns the opaque message payload.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the handler owned by this execution.
    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// Returns the cancellation handle of the scheduled task.
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Requests cancellation of this execution.
    ///
    /// Idempotent: only the first caller records the cancellation stamp
    /// and fires the task's cancellation token; that caller observes
    /// `true` and is the one expected to emit any cancel notification.
    /// All later calls observe `false` and have no effect.
    ///
    /// Cancellation is cooperative. A handler that already claimed its
    /// start slot keeps running until its body observes the token; until
    /// then the execution is reported as unfinished-cancel. An execution
    /// cancelled before the claim terminates without running any handler
    /// logic — and, deliberately, without any feedback on the reply
    /// channel; only deliveries cancelled mid-flight surface an error
    /// through the reporting path.
    pub fn cancel(&self) -> bool {
        let stamp = CancelStamp {
            at: Instant::now(),
            wall: SystemTime::now(),
        };
        if self.canceled.set(stamp).is_ok() {
            self.cancel_token.cancel();
            true
        } else {
            false
        }
    }

    /// True once `cancel()` has taken effect.
    pub fn is_canceled(&self) -> bool {
        self.canceled.get().is_some()
    }

    /// Wall-clock time of the effective `cancel()` call, if any.
    pub fn canceled_at(&self) -> Option<SystemTime> {
        self.canceled.get().map(|s| s.wall)
    }

    /// True once the handler claimed its start slot.
    pub fn is_handler_started(&self) -> bool {
        self.handler.is_started()
    }

    /// True once the handler body has fully unwound.
    pub fn is_handler_terminated(&self) -> bool {
        self.handler.is_terminated()
    }

    /// True while the handler runs (`started && !terminated`).
    pub fn is_handler_running(&self) -> bool {
        self.handler.is_started() && !self.handler.is_terminated()
    }

    /// Elapsed run time of the handler; defined only while running.
    pub fn runtime(&self) -> Option<Duration> {
        if self.is_handler_running() {
            self.handler.started_at().map(|t| t.elapsed())
        } else {
            None
        }
    }

    /// Start instant of the handler, if it started.
    pub(crate) fn started_at(&self) -> Option<Instant> {
        self.handler.started_at()
    }

    /// Elapsed time since this execution was submitted.
    pub fn pending_for(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("message", &self.message)
            .field("canceled", &self.is_canceled())
            .field("started", &self.is_handler_started())
            .field("terminated", &self.is_handler_terminated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::noop_execution;

    #[test]
    fn test_new_execution_is_pending() {
        let exec = noop_execution("m1");
        assert!(!exec.is_canceled());
        assert!(!exec.is_handler_started());
        assert!(!exec.is_handler_terminated());
        assert!(!exec.is_handler_running());
        assert!(exec.runtime().is_none());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let exec = noop_execution("m1");
        assert!(exec.cancel(), "first cancel must take effect");
        let first = exec.canceled_at().expect("stamp recorded");
        for _ in 0..5 {
            assert!(!exec.cancel(), "repeat cancels must be no-ops");
        }
        assert_eq!(
            exec.canceled_at().expect("stamp still recorded"),
            first,
            "cancellation stamp must never change once set"
        );
    }

    #[test]
    fn test_cancel_fires_token_once() {
        let exec = noop_execution("m1");
        assert!(!exec.cancel_token().is_cancelled());
        exec.cancel();
        assert!(exec.cancel_token().is_cancelled());
    }

    #[test]
    fn test_concurrent_cancel_has_one_winner() {
        let exec = noop_execution("m1");
        let mut winners = 0;
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| exec.cancel())).collect();
            for h in handles {
                if h.join().expect("cancel thread") {
                    winners += 1;
                }
            }
        });
        assert_eq!(winners, 1, "exactly one caller records the cancellation");
    }

    #[test]
    fn test_runtime_defined_only_while_running() {
        let exec = noop_execution("m1");
        assert!(exec.runtime().is_none(), "pending has no runtime");
        assert!(exec.handler().claim_start());
        assert!(exec.runtime().is_some(), "running has a runtime");
        exec.handler().finish();
        assert!(exec.runtime().is_none(), "terminated has no runtime");
    }
}
