//! # Transport: bootstrap assembly and per-session channel registry.
//!
//! The [`Transport`] is the one place the process bootstrap wires the
//! pieces together: configuration, the receiver callback, the explicit
//! interceptor and listener lists, the worker-pool semaphore, and the
//! watchdog. Channels are created lazily, one per session, on first
//! contact.
//!
//! ## Assembly
//! ```text
//! TransportBuilder::new(cfg, receiver)
//!     .with_interceptors([...])        (static list, no dynamic lookup)
//!     .with_listeners([...])
//!     .build()
//!        ├─► Watchdog::new(cfg)  + listeners registered
//!        ├─► ProtectionPolicy    (auto-registered when cfg enables a trigger)
//!        └─► Semaphore(cfg.workers)    (None when unbounded)
//! ```
//!
//! ## Request flow
//! ```text
//! HTTP POST ──► submit(session, message) ──► Channel::on_message ──► pool
//! HTTP GET  ──► poll(session)            ──► Channel::poll(cfg.poll_timeout)
//! timer     ──► watchdog().scan()                        (external, out of scope)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Semaphore;

use crate::config::Config;
use crate::core::{Channel, Execution, Interceptor, Message, Receiver, Session};
use crate::listeners::WatchListener;
use crate::watchdog::{ProtectionPolicy, Watchdog};

/// Builder for assembling a transport with optional collaborators.
pub struct TransportBuilder {
    cfg: Config,
    receiver: Arc<dyn Receiver>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    listeners: Vec<Arc<dyn WatchListener>>,
}

impl TransportBuilder {
    /// Creates a new builder with the given configuration and receiver.
    pub fn new(cfg: Config, receiver: Arc<dyn Receiver>) -> Self {
        Self {
            cfg,
            receiver,
            interceptors: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Sets the delivery interceptor chain, outermost first.
    ///
    /// The list is fixed at build time; there is no runtime lookup.
    pub fn with_interceptors(mut self, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Sets the initial watchdog listeners.
    ///
    /// More can be added later through [`Watchdog::add_listener`].
    pub fn with_listeners(mut self, listeners: Vec<Arc<dyn WatchListener>>) -> Self {
        self.listeners = listeners;
        self
    }

    /// Builds and returns the transport.
    ///
    /// Must run inside a tokio runtime (listener workers are spawned
    /// here). When the configuration enables a protection trigger, the
    /// [`ProtectionPolicy`] is registered as a listener automatically.
    pub fn build(self) -> Arc<Transport> {
        let watchdog = Watchdog::new(&self.cfg);
        for listener in self.listeners {
            watchdog.add_listener(listener);
        }

        let protection = ProtectionPolicy::new(&self.cfg, &watchdog);
        if !protection.is_inert() {
            watchdog.add_listener(Arc::new(protection));
        }

        let semaphore = self.cfg.worker_limit().map(Semaphore::new).map(Arc::new);

        Arc::new(Transport {
            cfg: self.cfg,
            receiver: self.receiver,
            interceptors: self.interceptors.into(),
            watchdog,
            semaphore,
            channels: RwLock::new(HashMap::new()),
        })
    }
}

/// Front object of the message transport.
///
/// Owns the lazy session→channel map and everything the channels share:
/// receiver, interceptors, pool semaphore, watchdog.
pub struct Transport {
    cfg: Config,
    receiver: Arc<dyn Receiver>,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    watchdog: Arc<Watchdog>,
    semaphore: Option<Arc<Semaphore>>,
    channels: RwLock<HashMap<Arc<str>, Arc<Channel>>>,
}

impl Transport {
    /// Starts assembling a transport.
    pub fn builder(cfg: Config, receiver: Arc<dyn Receiver>) -> TransportBuilder {
        TransportBuilder::new(cfg, receiver)
    }

    /// Returns the session's channel, creating it on first contact.
    pub fn channel(&self, session: &Arc<Session>) -> Arc<Channel> {
        {
            let channels = self.read_channels();
            if let Some(channel) = channels.get(session.id()) {
                return Arc::clone(channel);
            }
        }
        let mut channels = self.write_channels();
        let channel = channels
            .entry(Arc::from(session.id()))
            .or_insert_with(|| {
                Channel::new(
                    Arc::clone(session),
                    Arc::clone(&self.receiver),
                    Arc::clone(&self.interceptors),
                    Arc::clone(&self.watchdog),
                    self.semaphore.clone(),
                )
            });
        Arc::clone(channel)
    }

    /// Accepts one inbound message for `session`.
    pub fn submit(&self, session: &Arc<Session>, message: Message) -> Arc<Execution> {
        self.channel(session).on_message(message)
    }

    /// Long-polls the session's outbound queue with the configured timeout.
    pub async fn poll(&self, session: &Arc<Session>) -> Vec<Message> {
        let channel = self.channel(session);
        channel.poll(self.cfg.poll_timeout).await
    }

    /// Returns the watchdog for scan scheduling and listener management.
    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    /// Returns the transport configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Forgets the session's channel (session invalidation hook).
    ///
    /// Queued outbound messages are dropped with it; in-flight executions
    /// stay tracked by the watchdog until they terminate or are cancelled
    /// by the inactivity pass.
    pub fn remove_channel(&self, session_id: &str) -> bool {
        self.write_channels().remove(session_id).is_some()
    }

    fn read_channels(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Arc<str>, Arc<Channel>>> {
        self.channels.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_channels(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Arc<str>, Arc<Channel>>> {
        self.channels.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::{noop_receiver, GateReceiver};
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::{sleep, timeout};

    async fn wait_until(what: &str, condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
    }

    #[tokio::test]
    async fn test_channel_is_created_lazily_and_cached() {
        let transport = Transport::builder(Config::default(), noop_receiver()).build();
        let session = Session::new("s1");
        let first = transport.channel(&session);
        let second = transport.channel(&session);
        assert!(Arc::ptr_eq(&first, &second), "one channel per session");
    }

    #[tokio::test]
    async fn test_submit_then_poll_round_trip() {
        // Echo receiver: replies with the payload it got.
        struct Echo;
        #[async_trait::async_trait]
        impl crate::core::Receiver for Echo {
            async fn on_message(
                &self,
                message: Message,
                reply: &Channel,
                _cancel: &tokio_util::sync::CancellationToken,
            ) -> Result<(), crate::error::HandlerError> {
                reply.send(Message::from(format!("echo:{message}").as_str()));
                Ok(())
            }
        }

        let mut cfg = Config::default();
        cfg.poll_timeout = Duration::from_secs(2);
        let transport = Transport::builder(cfg, Arc::new(Echo)).build();
        let session = Session::new("s1");

        let execution = transport.submit(&session, Message::from("hello"));
        wait_until("delivery", || execution.is_handler_terminated()).await;

        let got = transport.poll(&session).await;
        let got: Vec<&str> = got.iter().map(|m| m.as_ref()).collect();
        assert_eq!(got, vec!["echo:hello"]);
    }

    #[tokio::test]
    async fn test_submissions_are_tracked_by_the_watchdog() {
        let release = Arc::new(Notify::new());
        let receiver = Arc::new(GateReceiver::new(Arc::clone(&release), true));
        let transport = Transport::builder(Config::default(), receiver).build();
        let session = Session::new("s1");

        let execution = transport.submit(&session, Message::from("m0"));
        wait_until("handler start", || execution.is_handler_started()).await;

        let report = transport.watchdog().scan();
        assert_eq!(report.running.len(), 1);

        release.notify_one();
        wait_until("handler termination", || execution.is_handler_terminated()).await;
        let report = transport.watchdog().scan();
        assert!(report.is_idle());
    }

    #[tokio::test]
    async fn test_protection_policy_registers_when_configured() {
        let mut cfg = Config::default();
        cfg.pending_threshold = Some(1);
        cfg.workers = 1;
        let release = Arc::new(Notify::new());
        let receiver = Arc::new(GateReceiver::new(Arc::clone(&release), true));
        let transport = Transport::builder(cfg, receiver).build();
        let session = Session::new("s1");

        let blocker = transport.submit(&session, Message::from("m0"));
        wait_until("blocker start", || blocker.is_handler_started()).await;
        let queued = transport.submit(&session, Message::from("m1"));

        // One pending execution crosses the threshold: the policy cancels
        // everything on the pass that reported it.
        transport.watchdog().scan();
        wait_until("protective cancellation", || {
            blocker.is_canceled() && queued.is_canceled()
        })
        .await;
    }

    #[tokio::test]
    async fn test_remove_channel_forgets_queued_replies() {
        let transport = Transport::builder(Config::default(), noop_receiver()).build();
        let session = Session::new("s1");
        transport.channel(&session).send(Message::from("stale"));

        assert!(transport.remove_channel(session.id()));
        assert!(!transport.remove_channel(session.id()), "second removal is a no-op");

        let fresh = transport.channel(&session);
        let got = fresh.poll(Duration::from_millis(10)).await;
        assert!(got.is_empty(), "a fresh channel starts with an empty queue");
    }
}
