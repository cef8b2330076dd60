//! # Handler: the runnable body of an execution.
//!
//! A [`Handler`] delivers one message to the receiver, wrapped in the
//! configured interceptor chain. It is created together with its
//! [`Execution`](crate::Execution) and owns the message, the interceptor
//! list with the context values captured at submission time, and the
//! started/terminated flags the watchdog classifies against.
//!
//! ## Body shape
//! ```text
//! claim_start (CAS, exactly one claimant)
//!   interceptor[0].before(ctx[0])
//!     interceptor[1].before(ctx[1])
//!       ...
//!         receiver.on_message(message, reply)     (skipped if already cancelled)
//!       ...
//!     interceptor[1].after()
//!   interceptor[0].after()
//! finish (terminated = true, always the last action)
//! ```
//!
//! ## Rules
//! - The body runs only if no cancellation was recorded **and** the start
//!   slot CAS succeeds — exactly one claimant under concurrent cancel/start
//! - `after` hooks unwind in reverse for every entered interceptor,
//!   unconditionally; a panicking hook is contained so unwinding continues
//! - A started handler **always** reaches terminated: normal return,
//!   failure, panic, and cancellation all funnel through [`Handler::finish`]

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::core::channel::Channel;
use crate::core::interceptor::{Interceptor, InterceptorContext};
use crate::core::receiver::Receiver;
use crate::core::Message;
use crate::error::HandlerError;

/// Runnable counterpart of an execution: message, interceptor chain,
/// captured contexts, start/terminated state.
pub struct Handler {
    message: Message,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    /// One captured context per interceptor, same order.
    contexts: Vec<InterceptorContext>,
    receiver: Arc<dyn Receiver>,
    reply: Arc<Channel>,
    /// The start slot: set-once instant, claimed via CAS by the worker.
    started_at: OnceLock<Instant>,
    terminated: AtomicBool,
}

impl Handler {
    pub(crate) fn new(
        message: Message,
        interceptors: Arc<[Arc<dyn Interceptor>]>,
        contexts: Vec<InterceptorContext>,
        receiver: Arc<dyn Receiver>,
        reply: Arc<Channel>,
    ) -> Arc<Self> {
        Arc::new(Self {
            message,
            interceptors,
            contexts,
            receiver,
            reply,
            started_at: OnceLock::new(),
            terminated: AtomicBool::new(false),
        })
    }

    /// Claims the start slot.
    ///
    /// Exactly one caller wins, even under concurrent cancel/start races;
    /// the winner records the start instant as a side effect.
    pub(crate) fn claim_start(&self) -> bool {
        self.started_at.set(Instant::now()).is_ok()
    }

    /// True once the start slot was claimed.
    pub fn is_started(&self) -> bool {
        self.started_at.get().is_some()
    }

    /// Start instant, if the start slot was claimed.
    pub(crate) fn started_at(&self) -> Option<Instant> {
        self.started_at.get().copied()
    }

    /// True once the body has fully unwound.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(AtomicOrdering::Acquire)
    }

    /// Marks the handler terminated. Must be the very last action on every
    /// path through the body, including the never-started cancel path.
    pub(crate) fn finish(&self) {
        self.terminated.store(true, AtomicOrdering::Release);
    }

    /// Runs the body and guarantees termination.
    ///
    /// Panics anywhere inside the body are contained here so that
    /// [`Handler::finish`] still runs; the panic is mapped to
    /// [`HandlerError::Failed`] and handed back for reporting.
    pub(crate) async fn run(&self, cancel: &CancellationToken) -> Result<(), HandlerError> {
        let outcome = std::panic::AssertUnwindSafe(self.deliver(cancel))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(r) => r,
            Err(panic) => Err(HandlerError::Failed {
                error: panic_detail(panic.as_ref()),
            }),
        };
        self.finish();
        result
    }

    /// Interceptor chain around receiver delivery.
    ///
    /// `before` hooks run outermost-in; the first failure (error or panic)
    /// aborts descent. Delivery is skipped when cancellation is already
    /// observable at the innermost point — the "cancelled before doing real
    /// work" case, as opposed to cancellation surfacing mid-delivery.
    /// `after` hooks then unwind in reverse for every entered interceptor.
    async fn deliver(&self, cancel: &CancellationToken) -> Result<(), HandlerError> {
        let mut entered = 0;
        let mut result = Ok(());

        for (interceptor, ctx) in self.interceptors.iter().zip(&self.contexts) {
            let hook = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                interceptor.before(ctx)
            }));
            match hook {
                Ok(Ok(())) => entered += 1,
                Ok(Err(e)) => {
                    result = Err(e);
                    break;
                }
                Err(panic) => {
                    result = Err(HandlerError::Interceptor {
                        name: interceptor.name().to_string(),
                        error: panic_detail(panic.as_ref()),
                    });
                    break;
                }
            }
        }

        if result.is_ok() {
            result = if cancel.is_cancelled() {
                Err(HandlerError::Canceled)
            } else {
                let delivery =
                    self.receiver
                        .on_message(self.message.clone(), &self.reply, cancel);
                match std::panic::AssertUnwindSafe(delivery).catch_unwind().await {
                    Ok(r) => r,
                    Err(panic) => Err(HandlerError::Failed {
                        error: panic_detail(panic.as_ref()),
                    }),
                }
            };
        }

        for interceptor in self.interceptors[..entered].iter().rev() {
            let hook =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| interceptor.after()));
            if hook.is_err() {
                eprintln!(
                    "[msgvisor] interceptor '{}' panicked in after hook",
                    interceptor.name()
                );
            }
        }

        result
    }
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
