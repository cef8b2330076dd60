//! # Watchdog: session registry, periodic scan, recovery operations.
//!
//! The [`Watchdog`] tracks every in-flight execution per session, prunes
//! and reclassifies them on each scan, and publishes an immutable
//! [`ScanReport`] to listeners. It also exposes the two recovery
//! operations the self-protection policy relies on: cancel everything and
//! cancel the longest-running execution.
//!
//! ## Scan pass
//! ```text
//! scan()                                      (external timer, per interval)
//!   for each session, under THAT session's lock only:
//!     1. prune: terminated            → remove, notify on_execution_remove
//!               cancelled-never-start → remove silently
//!     2. list empty                   → drop the session from the registry
//!     3. session idle > timeout       → cancel remaining executions;
//!                                       if any cancel took effect, skip
//!                                       classification until the next pass
//!     4. classify pending / running / unfinished-cancel, track maxima
//!   build one immutable ScanReport ─► store as latest ─► emit on_scan
//! ```
//!
//! ## Rules
//! - Registration and scanning take a **per-session** lock, never a global
//!   one: scanning one session never blocks new work on another
//! - A failure in one session's pass is isolated and reported; the
//!   remaining sessions are still scanned
//! - The latest report is swapped atomically; readers never observe a
//!   partially built snapshot
//! - `cancel_all`, repeated `cancel()`, and scanning an already-empty
//!   session are all idempotent

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime};

use crate::config::Config;
use crate::core::handler::panic_detail;
use crate::core::{Execution, Session};
use crate::error::TransportError;
use crate::listeners::{ListenerSet, Notification, WatchListener};
use crate::watchdog::ScanReport;

/// One tracked session: identity plus its execution list behind its own lock.
struct SessionEntry {
    session: Arc<Session>,
    executions: Mutex<Vec<Arc<Execution>>>,
}

/// Per-session result of one scan pass.
#[derive(Default)]
struct SessionScan {
    pending: Vec<Arc<Execution>>,
    running: Vec<Arc<Execution>>,
    unfinished_cancel: Vec<Arc<Execution>>,
    max_pending: Duration,
    max_running: Duration,
    emptied: bool,
}

/// Registry of sessions → executions with periodic supervision.
pub struct Watchdog {
    inactivity_timeout: Duration,
    sessions: RwLock<HashMap<Arc<str>, Arc<SessionEntry>>>,
    listeners: ListenerSet,
    last: RwLock<Arc<ScanReport>>,
}

impl Watchdog {
    /// Creates a watchdog from the transport configuration.
    pub fn new(cfg: &Config) -> Arc<Self> {
        Arc::new(Self {
            inactivity_timeout: cfg.inactivity_timeout,
            sessions: RwLock::new(HashMap::new()),
            listeners: ListenerSet::new(cfg.listener_queue_capacity_clamped()),
            last: RwLock::new(Arc::new(ScanReport::empty())),
        })
    }

    /// Registers one execution under its owning session.
    ///
    /// Creates the session's list on first use. Only that session's lock
    /// is taken; a scan visiting another session is never blocked.
    pub fn add_execution(&self, session: &Arc<Session>, execution: Arc<Execution>) {
        let entry = {
            let sessions = read(&self.sessions);
            sessions.get(session.id()).cloned()
        };
        let entry = match entry {
            Some(entry) => entry,
            None => {
                let mut sessions = write(&self.sessions);
                Arc::clone(sessions.entry(Arc::from(session.id())).or_insert_with(|| {
                    Arc::new(SessionEntry {
                        session: Arc::clone(session),
                        executions: Mutex::new(Vec::new()),
                    })
                }))
            }
        };
        lock(&entry.executions).push(execution);
    }

    /// Registers a listener; safe concurrently with a running scan.
    pub fn add_listener(&self, listener: Arc<dyn WatchListener>) {
        self.listeners.add(listener);
    }

    /// Removes a listener by identity; safe concurrently with a running scan.
    pub fn remove_listener(&self, listener: &Arc<dyn WatchListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Returns the most recent scan report.
    pub fn last_report(&self) -> Arc<ScanReport> {
        Arc::clone(&read(&self.last))
    }

    /// Total number of executions currently tracked across all sessions.
    pub fn tracked_executions(&self) -> usize {
        let entries = self.entries();
        entries
            .iter()
            .map(|e| lock(&e.executions).len())
            .sum()
    }

    /// One supervision pass over every tracked session.
    ///
    /// Invoked periodically by an external timer. Failures while
    /// processing one session are reported and do not abort the pass.
    /// Returns the freshly published report.
    pub fn scan(&self) -> Arc<ScanReport> {
        let entries = self.entries();
        let mut pending = Vec::new();
        let mut running = Vec::new();
        let mut unfinished_cancel = Vec::new();
        let mut max_pending = Duration::ZERO;
        let mut max_running = Duration::ZERO;
        let mut emptied: Vec<Arc<SessionEntry>> = Vec::new();

        for entry in entries {
            let outcome =
                std::panic::catch_unwind(AssertUnwindSafe(|| self.scan_session(&entry)));
            match outcome {
                Ok(scan) => {
                    if scan.emptied {
                        emptied.push(entry);
                        continue;
                    }
                    pending.extend(scan.pending);
                    running.extend(scan.running);
                    unfinished_cancel.extend(scan.unfinished_cancel);
                    max_pending = max_pending.max(scan.max_pending);
                    max_running = max_running.max(scan.max_running);
                }
                Err(panic) => {
                    let err = TransportError::SessionScan {
                        session: entry.session.id().to_string(),
                        detail: panic_detail(panic.as_ref()),
                    };
                    eprintln!("[msgvisor] watchdog: {}", err.as_message());
                }
            }
        }

        self.drop_emptied(emptied);

        let report = Arc::new(ScanReport {
            at: SystemTime::now(),
            pending,
            running,
            unfinished_cancel,
            max_pending,
            max_running,
        });
        *write(&self.last) = Arc::clone(&report);
        self.listeners.emit(Notification::Scan(Arc::clone(&report)));
        report
    }

    /// Cancels every non-cancelled execution across all sessions, then
    /// emits a single aggregate hara-kiri notification carrying the most
    /// recent report.
    ///
    /// Idempotent per execution: repeated invocations cancel nothing new.
    pub fn cancel_all(&self) {
        for entry in self.entries() {
            let list = lock(&entry.executions).clone();
            for execution in list {
                self.cancel_execution(&execution);
            }
        }
        self.listeners
            .emit(Notification::HaraKiri(self.last_report()));
    }

    /// Cancels the currently running execution with the earliest start
    /// instant across all sessions, if any.
    pub fn cancel_max_runtime_execution(&self) -> Option<Arc<Execution>> {
        let mut oldest: Option<(Instant, Arc<Execution>)> = None;
        for entry in self.entries() {
            let list = lock(&entry.executions);
            for execution in list.iter() {
                if !execution.is_handler_running() || execution.is_canceled() {
                    continue;
                }
                if let Some(started) = execution.started_at() {
                    let earlier = oldest
                        .as_ref()
                        .map(|(at, _)| started < *at)
                        .unwrap_or(true);
                    if earlier {
                        oldest = Some((started, Arc::clone(execution)));
                    }
                }
            }
        }

        let (_, execution) = oldest?;
        self.cancel_execution(&execution);
        Some(execution)
    }

    /// One session's pass, taken under that session's lock only.
    fn scan_session(&self, entry: &Arc<SessionEntry>) -> SessionScan {
        let mut scan = SessionScan::default();
        let mut list = lock(&entry.executions);

        list.retain(|execution| {
            // Cancelled before the start slot was claimed: cleanly gone,
            // pruned without a removal notification.
            if execution.is_canceled() && !execution.is_handler_started() {
                return false;
            }
            if execution.is_handler_terminated() {
                self.listeners
                    .emit(Notification::Remove(Arc::clone(execution)));
                return false;
            }
            true
        });

        if list.is_empty() {
            scan.emptied = true;
            return scan;
        }

        if entry.session.idle_for() > self.inactivity_timeout {
            let mut any_canceled = false;
            for execution in list.iter() {
                if self.cancel_execution(execution) {
                    any_canceled = true;
                }
            }
            if any_canceled {
                // Cancellation was just issued; classify on the next pass.
                return scan;
            }
        }

        for execution in list.iter() {
            if execution.is_handler_terminated() {
                // Finished between prune and classification; pruned next pass.
                continue;
            }
            if execution.is_canceled() {
                if execution.is_handler_started() {
                    scan.unfinished_cancel.push(Arc::clone(execution));
                }
            } else if execution.is_handler_started() {
                if let Some(runtime) = execution.runtime() {
                    scan.max_running = scan.max_running.max(runtime);
                }
                scan.running.push(Arc::clone(execution));
            } else {
                scan.max_pending = scan.max_pending.max(execution.pending_for());
                scan.pending.push(Arc::clone(execution));
            }
        }
        scan
    }

    /// Cancels one execution and, when the cancel takes effect, emits the
    /// per-execution cancel notification.
    fn cancel_execution(&self, execution: &Arc<Execution>) -> bool {
        if execution.cancel() {
            self.listeners.emit(Notification::Cancel {
                message: execution.message().clone(),
                at: execution
                    .canceled_at()
                    .unwrap_or_else(SystemTime::now),
            });
            true
        } else {
            false
        }
    }

    /// Drops sessions whose lists went empty, re-checking emptiness under
    /// each session's lock so a racing registration is never lost.
    fn drop_emptied(&self, emptied: Vec<Arc<SessionEntry>>) {
        if emptied.is_empty() {
            return;
        }
        let mut sessions = write(&self.sessions);
        for entry in emptied {
            if lock(&entry.executions).is_empty() {
                sessions.remove(entry.session.id());
            }
        }
    }

    /// Snapshot of all tracked sessions.
    fn entries(&self) -> Vec<Arc<SessionEntry>> {
        read(&self.sessions).values().cloned().collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn read<T>(rwlock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    rwlock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(rwlock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    rwlock.write().unwrap_or_else(|e| e.into_inner())
}
