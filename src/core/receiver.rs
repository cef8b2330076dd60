//! # Message receiver seam.
//!
//! `Receiver` is the application-side callback that consumes inbound
//! messages. It is invoked by a handler once all interceptor `before`
//! hooks have run, together with the reply channel of the owning session.
//!
//! Implementations may call [`Channel::send`](crate::Channel::send) zero
//! or more times to queue replies for the polling client, and should
//! select on the provided cancellation token in long-running sections so
//! cancellation can take effect.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::channel::Channel;
use crate::core::Message;
use crate::error::HandlerError;

/// Application callback for inbound messages.
///
/// Runs on a pool worker; the delivery blocks that worker for as long as
/// the implementation takes, which is unbounded from the transport's
/// perspective.
#[async_trait]
pub trait Receiver: Send + Sync + 'static {
    /// Handles one inbound message.
    ///
    /// # Parameters
    /// - `message`: the opaque payload submitted by the client
    /// - `reply`: the owning session's channel for outbound replies
    /// - `cancel`: cooperative cancellation signal; implementations should
    ///   return [`HandlerError::Canceled`] promptly once it fires
    async fn on_message(
        &self,
        message: Message,
        reply: &Channel,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError>;

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
