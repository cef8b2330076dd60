//! Transport core: sessions, channels, executions, handlers.
//!
//! This module contains the per-message machinery of the transport. The
//! public API from here is [`Session`], [`Channel`], [`Execution`],
//! [`Handler`], and the two collaborator seams [`Receiver`] and
//! [`Interceptor`].
//!
//! Internal modules:
//! - [`channel`]: per-session outbound queue and inbound submission;
//! - [`execution`]: lifecycle record and cancellation semantics;
//! - [`handler`]: interceptor chain around receiver delivery;
//! - [`runner`]: one pool attempt with permit acquisition and start discipline;
//! - [`session`]: client identity and activity tracking.

pub(crate) mod channel;
pub(crate) mod execution;
pub(crate) mod handler;
pub(crate) mod interceptor;
pub(crate) mod receiver;
pub(crate) mod runner;
pub(crate) mod session;

pub use channel::Channel;
pub use execution::Execution;
pub use handler::Handler;
pub use interceptor::{Interceptor, InterceptorContext};
pub use receiver::Receiver;
pub use session::Session;

use std::sync::Arc;

/// Opaque message payload moved through the transport.
///
/// The transport never inspects payload content; serialization happens in
/// the servlet layer above it.
pub type Message = Arc<str>;
