//! Error types used by the msgvisor transport and message handlers.
//!
//! This module defines two main error enums:
//!
//! - [`TransportError`] — errors raised by the transport/registry layer itself.
//! - [`HandlerError`] — errors raised while delivering a single message.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Cooperative cancellation is not an application error: it is carried by the
//! execution's cancellation flag and surfaces as [`HandlerError::Canceled`] only
//! so callers can tell it apart from real delivery failures.

use thiserror::Error;

/// # Errors produced by the transport layer.
///
/// These represent failures in the transport machinery itself, not in
/// user-supplied receiver or interceptor code.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// Processing one session's execution list failed during a watchdog scan.
    ///
    /// The scan isolates the failure and continues with the remaining sessions.
    #[error("watchdog scan failed for session '{session}': {detail}")]
    SessionScan {
        /// Identifier of the session whose list could not be processed.
        session: String,
        /// Captured panic or failure description.
        detail: String,
    },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::SessionScan { .. } => "transport_session_scan",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TransportError::SessionScan { session, detail } => {
                format!("scan failure in session '{session}': {detail}")
            }
        }
    }
}

/// # Errors produced while delivering one message.
///
/// Raised by receiver or interceptor code executed by a handler.
/// All variants propagate to the outermost handler level where they are reported;
/// they never crash the worker and never prevent the handler from terminating.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Delivery was cut short because the execution was cancelled.
    ///
    /// Not a failure: the cancellation flag on the execution is authoritative,
    /// this variant only lets the delivery path unwind cooperatively.
    #[error("execution cancelled")]
    Canceled,

    /// The receiver failed to process the message.
    #[error("delivery failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// An interceptor's `before` hook failed; delivery never reached the receiver.
    #[error("interceptor '{name}' failed: {error}")]
    Interceptor {
        /// Name of the failing interceptor.
        name: String,
        /// The underlying error message.
        error: String,
    },
}

impl HandlerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use msgvisor::HandlerError;
    ///
    /// let err = HandlerError::Failed { error: "boom".into() };
    /// assert_eq!(err.as_label(), "handler_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Canceled => "handler_canceled",
            HandlerError::Failed { .. } => "handler_failed",
            HandlerError::Interceptor { .. } => "handler_interceptor",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Canceled => "cancelled".to_string(),
            HandlerError::Failed { error } => format!("error: {error}"),
            HandlerError::Interceptor { name, error } => {
                format!("interceptor '{name}': {error}")
            }
        }
    }

    /// Indicates whether this error represents cooperative cancellation
    /// rather than an application failure.
    ///
    /// # Example
    /// ```
    /// use msgvisor::HandlerError;
    ///
    /// assert!(HandlerError::Canceled.is_cancellation());
    /// assert!(!HandlerError::Failed { error: "boom".into() }.is_cancellation());
    /// ```
    pub fn is_cancellation(&self) -> bool {
        matches!(self, HandlerError::Canceled)
    }
}
