//! Supervision: registry, scan reports, self-protection.
//!
//! This module contains the watchdog side of the transport. The public
//! API from here is [`Watchdog`], [`ScanReport`], and the
//! [`ProtectionPolicy`] that turns reports into recovery actions.
//!
//! Internal modules:
//! - [`registry`]: session→executions registry, scan pass, recovery ops;
//! - [`report`]: immutable per-scan snapshot;
//! - [`protection`]: threshold-driven hara-kiri policy.

mod protection;
mod registry;
mod report;

pub use protection::{ProtectionAction, ProtectionPolicy};
pub use registry::Watchdog;
pub use report::ScanReport;
