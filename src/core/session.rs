//! # Session identity and activity tracking.
//!
//! A [`Session`] is the opaque identity of one polling client across
//! repeated HTTP contacts. The transport only needs two things from it:
//! a stable id and a last-activity instant the watchdog can compare
//! against the configured inactivity timeout.
//!
//! ## Rules
//! - `touch()` is called on every client contact (submit and poll)
//! - `idle_for()` is read lock-free by the watchdog on every scan
//! - Activity is stored as whole milliseconds since session creation in an
//!   `AtomicU64`, so concurrent touches never block each other

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Opaque client identity with a last-activity timestamp.
///
/// Shared as `Arc<Session>` between the transport, its channel, and the
/// watchdog registry. One session owns zero or more executions.
#[derive(Debug)]
pub struct Session {
    id: Arc<str>,
    created_at: Instant,
    /// Milliseconds since `created_at` of the most recent client contact.
    last_activity_ms: AtomicU64,
}

impl Session {
    /// Creates a session that is considered active right now.
    pub fn new(id: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            created_at: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        })
    }

    /// Returns the stable session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Records a client contact at the current instant.
    pub fn touch(&self) {
        let ms = self.created_at.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;
        self.last_activity_ms.fetch_max(ms, AtomicOrdering::Relaxed);
    }

    /// Returns how long the session has been without client contact.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(AtomicOrdering::Relaxed));
        self.created_at.elapsed().saturating_sub(last)
    }
}
