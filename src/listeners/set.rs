//! # ListenerSet: non-blocking fan-out over registered listeners
//!
//! [`ListenerSet`] distributes each watchdog notification to all
//! registered listeners **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit` returns immediately (called from inside a scan).
//! - Per-listener FIFO (queue order).
//! - Panics inside listeners are caught and logged (isolation).
//! - Registration and removal are safe concurrently with an in-progress
//!   scan: the entry list lives behind a lock and workers own their queues.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different listeners.
//! - No retries on per-listener queue overflow (notifications are dropped
//!   for that listener).
//!
//! ## Diagram
//! ```text
//!    emit(Notification)
//!        │                     (clone per listener; Arc payloads)
//!        ├────────────► [queue L1] ─► worker L1 ─► callback
//!        ├────────────► [queue L2] ─► worker L2 ─► callback
//!        └────────────► [queue LN] ─► worker LN ─► callback
//! ```

use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::core::{Execution, Message};
use crate::listeners::WatchListener;
use crate::watchdog::ScanReport;

/// One watchdog notification, dispatched to the matching trait method.
#[derive(Clone)]
pub(crate) enum Notification {
    Scan(Arc<ScanReport>),
    Cancel { message: Message, at: SystemTime },
    Remove(Arc<Execution>),
    HaraKiri(Arc<ScanReport>),
}

/// Per-listener channel with the listener identity kept for removal.
struct ListenerChannel {
    listener: Arc<dyn WatchListener>,
    name: &'static str,
    sender: mpsc::Sender<Notification>,
}

/// Composite fan-out with per-listener bounded queues and worker tasks.
pub struct ListenerSet {
    default_capacity: usize,
    channels: RwLock<Vec<ListenerChannel>>,
}

impl ListenerSet {
    /// Creates an empty set. `default_capacity` is the upper bound for
    /// every listener queue; a listener may declare a smaller capacity via
    /// [`WatchListener::queue_capacity`].
    pub fn new(default_capacity: usize) -> Self {
        Self {
            default_capacity: default_capacity.max(1),
            channels: RwLock::new(Vec::new()),
        }
    }

    /// Registers a listener and spawns its worker.
    ///
    /// Safe to call while a scan is emitting; the listener observes only
    /// notifications emitted after registration.
    pub fn add(&self, listener: Arc<dyn WatchListener>) {
        let cap = listener.queue_capacity().max(1).min(self.default_capacity);
        let name = listener.name();
        let (tx, mut rx) = mpsc::channel::<Notification>(cap);
        let worker = Arc::clone(&listener);

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let fut = dispatch(&worker, notification);
                if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    eprintln!(
                        "[msgvisor] listener '{}' panicked: {:?}",
                        worker.name(),
                        panic
                    );
                }
            }
        });

        self.write().push(ListenerChannel {
            listener,
            name,
            sender: tx,
        });
    }

    /// Removes a listener by identity.
    ///
    /// Dropping its sender lets the worker drain remaining notifications
    /// and exit. Returns `false` when the listener was not registered.
    pub fn remove(&self, listener: &Arc<dyn WatchListener>) -> bool {
        let mut channels = self.write();
        let before = channels.len();
        channels.retain(|c| !Arc::ptr_eq(&c.listener, listener));
        channels.len() != before
    }

    /// Fan-out one notification to all listeners (non-blocking).
    ///
    /// If a listener's queue is **full** or **closed**, the notification is
    /// dropped for it and a warning is logged with the listener's name.
    pub(crate) fn emit(&self, notification: Notification) {
        let channels = self.read();
        for channel in channels.iter() {
            match channel.sender.try_send(notification.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    eprintln!(
                        "[msgvisor] listener '{}' dropped notification: queue full",
                        channel.name
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    eprintln!(
                        "[msgvisor] listener '{}' dropped notification: worker closed",
                        channel.name
                    );
                }
            }
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ListenerChannel>> {
        self.channels.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ListenerChannel>> {
        self.channels.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Routes one notification to the matching listener callback.
async fn dispatch(listener: &Arc<dyn WatchListener>, notification: Notification) {
    match notification {
        Notification::Scan(report) => listener.on_scan(&report).await,
        Notification::Cancel { message, at } => {
            listener.on_execution_cancel(&message, at).await
        }
        Notification::Remove(execution) => listener.on_execution_remove(&execution).await,
        Notification::HaraKiri(report) => listener.on_hara_kiri(&report).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::TraceLog;
    use async_trait::async_trait;
    use std::time::Duration;

    struct TracingListener {
        tag: &'static str,
        trace: TraceLog,
    }

    #[async_trait]
    impl WatchListener for TracingListener {
        async fn on_scan(&self, report: &ScanReport) {
            self.trace
                .push(format!("{}:scan:{}", self.tag, report.tracked()));
        }

        async fn on_hara_kiri(&self, _report: &ScanReport) {
            self.trace.push(format!("{}:hara-kiri", self.tag));
        }

        fn name(&self) -> &'static str {
            "TracingListener"
        }
    }

    async fn settle() {
        // Workers drain their queues across a few yields.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_reaches_all_listeners() {
        let trace = TraceLog::default();
        let set = ListenerSet::new(16);
        set.add(Arc::new(TracingListener {
            tag: "a",
            trace: trace.clone(),
        }));
        set.add(Arc::new(TracingListener {
            tag: "b",
            trace: trace.clone(),
        }));

        set.emit(Notification::Scan(Arc::new(ScanReport::empty())));
        settle().await;

        let mut got = trace.entries();
        got.sort();
        assert_eq!(got, vec!["a:scan:0", "b:scan:0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_listener_gets_nothing_more() {
        let trace = TraceLog::default();
        let set = ListenerSet::new(16);
        let listener: Arc<dyn WatchListener> = Arc::new(TracingListener {
            tag: "a",
            trace: trace.clone(),
        });
        set.add(Arc::clone(&listener));

        set.emit(Notification::Scan(Arc::new(ScanReport::empty())));
        settle().await;
        assert!(set.remove(&listener), "listener was registered");
        set.emit(Notification::Scan(Arc::new(ScanReport::empty())));
        settle().await;

        assert_eq!(trace.entries(), vec!["a:scan:0"]);
        assert!(set.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_unknown_listener_is_noop() {
        let set = ListenerSet::new(16);
        let listener: Arc<dyn WatchListener> = Arc::new(TracingListener {
            tag: "a",
            trace: TraceLog::default(),
        });
        assert!(!set.remove(&listener));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_listener_fifo_order() {
        let trace = TraceLog::default();
        let set = ListenerSet::new(16);
        set.add(Arc::new(TracingListener {
            tag: "a",
            trace: trace.clone(),
        }));

        let mut report = ScanReport::empty();
        set.emit(Notification::Scan(Arc::new(report.clone())));
        report.max_pending = Duration::from_secs(1);
        set.emit(Notification::HaraKiri(Arc::new(report)));
        settle().await;

        assert_eq!(trace.entries(), vec!["a:scan:0", "a:hara-kiri"]);
    }
}
