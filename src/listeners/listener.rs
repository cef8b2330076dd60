//! # Core listener trait
//!
//! `WatchListener` is the extension point for observing the watchdog:
//! status beans, loggers, and the self-protection policy all plug in
//! here. Each listener is driven by a dedicated worker loop fed by a
//! bounded queue owned by the [`ListenerSet`](crate::listeners::ListenerSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching) — they do **not** block
//!   the watchdog scan nor other listeners.
//! - All callbacks default to no-ops; implement only what you observe.
//! - Each listener **declares** its preferred queue capacity via
//!   [`WatchListener::queue_capacity`]. If a queue overflows, notifications
//!   for that listener are **dropped** (warn).

use std::time::SystemTime;

use async_trait::async_trait;

use crate::core::{Execution, Message};
use crate::watchdog::ScanReport;

/// Contract for watchdog observers.
///
/// Called from a listener-dedicated worker task. Implementations should
/// avoid blocking the async runtime (prefer async I/O and cooperative
/// waits).
#[async_trait]
pub trait WatchListener: Send + Sync + 'static {
    /// One scan completed; `report` is the immutable snapshot it produced.
    async fn on_scan(&self, report: &ScanReport) {
        let _ = report;
    }

    /// One execution's cancellation took effect at `at`.
    async fn on_execution_cancel(&self, message: &Message, at: SystemTime) {
        let _ = (message, at);
    }

    /// One terminated execution was pruned from the registry.
    async fn on_execution_remove(&self, execution: &Execution) {
        let _ = execution;
    }

    /// A cancel-everything recovery action ran; `report` is the most
    /// recent snapshot at that moment.
    async fn on_hara_kiri(&self, report: &ScanReport) {
        let _ = report;
    }

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this listener's queue.
    ///
    /// On overflow, notifications for this listener are **dropped** (warn).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
