//! # LogWriter — simple notification printer
//!
//! A minimal listener that prints incoming watchdog notifications to
//! stdout. Use it for test or demo.
//!
//! ## Example output
//! ```text
//! [watch] pending=2 running=1 unfinished-cancel=0 max-pending=1.25s max-running=3.4s
//! [cancel] message="m17" at=SystemTime { .. }
//! [remove] message="m12"
//! [hara-kiri] tracked=5
//! ```

use std::time::SystemTime;

use async_trait::async_trait;

use crate::core::{Execution, Message};
use crate::listeners::WatchListener;
use crate::watchdog::ScanReport;

/// Notification writer listener.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WatchListener for LogWriter {
    async fn on_scan(&self, report: &ScanReport) {
        println!(
            "[watch] pending={} running={} unfinished-cancel={} max-pending={:?} max-running={:?}",
            report.pending.len(),
            report.running.len(),
            report.unfinished_cancel.len(),
            report.max_pending,
            report.max_running,
        );
    }

    async fn on_execution_cancel(&self, message: &Message, at: SystemTime) {
        println!("[cancel] message={message:?} at={at:?}");
    }

    async fn on_execution_remove(&self, execution: &Execution) {
        println!("[remove] message={:?}", execution.message());
    }

    async fn on_hara_kiri(&self, report: &ScanReport) {
        println!("[hara-kiri] tracked={}", report.tracked());
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
