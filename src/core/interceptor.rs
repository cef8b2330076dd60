//! # Delivery interceptors.
//!
//! `Interceptor` is the extension point for bracketing message delivery
//! with paired hooks — the classic use case is propagating submit-side
//! state (locale, auth principal, diagnostic context) onto the worker that
//! actually runs the receiver.
//!
//! ## Contract
//! - [`Interceptor::context`] runs on the **submitting** side, once per
//!   message, and captures whatever the hooks need later.
//! - [`Interceptor::before`] runs on the worker, outermost interceptor
//!   first, receiving the captured context.
//! - [`Interceptor::after`] runs on the worker in **reverse** order and is
//!   guaranteed to run for every interceptor whose `before` ran, even if
//!   an inner layer failed.
//!
//! Interceptors are registered as an explicit, statically-typed list at
//! transport assembly; there is no dynamic lookup.
//!
//! ## Example (skeleton)
//! ```rust
//! // struct LocaleScope;
//! // impl msgvisor::Interceptor for LocaleScope {
//! //     fn context(&self) -> msgvisor::InterceptorContext {
//! //         Box::new(current_locale())
//! //     }
//! //     fn before(&self, ctx: &msgvisor::InterceptorContext) {
//! //         install_locale(ctx.downcast_ref().unwrap());
//! //     }
//! //     fn after(&self) { clear_locale(); }
//! // }
//! ```

use std::any::Any;

use crate::error::HandlerError;

/// Opaque per-interceptor context value, captured at submission time.
pub type InterceptorContext = Box<dyn Any + Send + Sync>;

/// Contract for delivery interceptors.
///
/// Hooks are synchronous: they bracket delivery with cheap state setup and
/// teardown, never long-running work.
pub trait Interceptor: Send + Sync + 'static {
    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Captures this interceptor's context on the submitting side.
    ///
    /// Called once per message, before the handler is scheduled.
    fn context(&self) -> InterceptorContext;

    /// Enters the interceptor scope on the worker.
    ///
    /// Receives the value produced by [`Interceptor::context`] for this
    /// message. An `Err` aborts delivery; `after` hooks for already-entered
    /// interceptors still run.
    fn before(&self, ctx: &InterceptorContext) -> Result<(), HandlerError>;

    /// Leaves the interceptor scope on the worker.
    ///
    /// Runs exactly once for every successful `before`, in reverse order,
    /// unconditionally.
    fn after(&self);
}
