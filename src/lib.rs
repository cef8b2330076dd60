//! # msgvisor
//!
//! **Msgvisor** is the server-side core of an HTTP long-polling message
//! transport: it accepts asynchronous messages from polling clients,
//! executes them on a bounded worker pool, delivers replies through
//! per-session outbound queues, and continuously supervises in-flight
//! work through a watchdog that detects stuck sessions, enforces
//! inactivity timeouts, and can forcibly cancel everything to recover
//! from pool exhaustion.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   HTTP POST (message)          HTTP GET (long poll)
//!        │                             │
//!        ▼                             ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Transport (bootstrap assembly, lazy Channel per Session)         │
//! └──────┬───────────────────────────────────────────┬────────────────┘
//!        ▼                                           ▼
//! ┌──────────────┐   one per session          ┌──────────────┐
//! │   Channel    │  ─ outbound FIFO queue ──► │ poll(timeout)│
//! │ on_message() │                            └──────────────┘
//! └──────┬───────┘
//!        │ creates Execution + Handler, registers with Watchdog
//!        ▼
//! ┌──────────────┐      permit       ┌─────────────────────────────┐
//! │ worker pool  │ ◄── semaphore ──  │ Handler (interceptor chain  │
//! │ tokio::spawn │                   │   around Receiver delivery) │
//! └──────────────┘                   └─────────────────────────────┘
//!        ▲
//!        │ scan() per interval (external timer)
//! ┌──────┴────────────────────────────────────────────────────────────┐
//! │  Watchdog (Session → Executions registry, per-session locks)      │
//! │  - prune terminated, drop empty sessions                          │
//! │  - cancel inactive sessions                                       │
//! │  - classify pending / running / unfinished-cancel                 │
//! │  - publish immutable ScanReport                                   │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        ▼
//! ┌──────────────┐  per-listener queue + worker   ┌──────────────────┐
//! │ ListenerSet  │ ─────────────────────────────► │ WatchListener(s) │
//! └──────────────┘                                │  LogWriter,      │
//!                                                 │  ProtectionPolicy│
//!                                                 └──────────────────┘
//! ```
//!
//! ### Execution lifecycle
//! ```text
//! Channel::on_message(msg)
//!   ├─► Execution + Handler created, watchdog registration
//!   ├─► pool task: acquire permit        (pending; cancellable wait)
//!   ├─► start discipline                 (no cancel recorded + CAS claim)
//!   ├─► before hooks ─► receiver ─► after hooks (unwound in reverse)
//!   └─► terminated                       (unconditional, last action)
//!
//! cancel() — set-once, cooperative:
//!   while pending → Pending→Terminated, no handler logic, no reply feedback
//!   while running → reported as unfinished-cancel until the body unwinds
//! ```
//!
//! ## Features
//! | Area            | Description                                               | Key types / traits                    |
//! |-----------------|-----------------------------------------------------------|---------------------------------------|
//! | **Transport**   | Per-session channels, long-polling, worker pool.          | [`Transport`], [`Channel`]             |
//! | **Supervision** | Periodic scan, classification, inactivity cleanup.        | [`Watchdog`], [`ScanReport`]           |
//! | **Recovery**    | Cancel-everything / cancel-longest-running ("hara-kiri"). | [`ProtectionPolicy`], [`Watchdog`]     |
//! | **Listeners**   | Non-blocking fan-out of scan results and cancellations.   | [`WatchListener`], [`ListenerSet`]     |
//! | **Seams**       | Application callback and delivery interceptors.           | [`Receiver`], [`Interceptor`]          |
//! | **Errors**      | Typed errors for transport and delivery.                  | [`TransportError`], [`HandlerError`]   |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use msgvisor::{Channel, Config, HandlerError, Message, Receiver, Session, Transport};
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Receiver for Echo {
//!     async fn on_message(
//!         &self,
//!         message: Message,
//!         reply: &Channel,
//!         _cancel: &CancellationToken,
//!     ) -> Result<(), HandlerError> {
//!         reply.send(message);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut cfg = Config::default();
//!     cfg.workers = 2;
//!     cfg.poll_timeout = Duration::from_millis(50);
//!
//!     let transport = Transport::builder(cfg, Arc::new(Echo)).build();
//!     let session = Session::new("client-1");
//!
//!     transport.submit(&session, Message::from("ping"));
//!     let replies = transport.poll(&session).await;
//!     assert_eq!(replies.first().map(|m| m.as_ref()), Some("ping"));
//!
//!     // Driven by an external timer in production:
//!     let report = transport.watchdog().scan();
//!     assert!(report.is_idle());
//! }
//! ```

mod config;
mod core;
mod error;
mod listeners;
mod transport;
mod watchdog;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{
    Channel, Execution, Handler, Interceptor, InterceptorContext, Message, Receiver, Session,
};
pub use error::{HandlerError, TransportError};
pub use listeners::{ListenerSet, WatchListener};
pub use transport::{Transport, TransportBuilder};
pub use watchdog::{ProtectionAction, ProtectionPolicy, ScanReport, Watchdog};

// Optional: expose a simple built-in stdout listener (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use listeners::LogWriter;
