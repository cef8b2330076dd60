//! # Channel: per-session submission and delivery queue pair.
//!
//! One [`Channel`] exists per session, created lazily on first contact by
//! the [`Transport`](crate::Transport). It owns the outbound FIFO queue
//! drained by HTTP long-poll requests and turns inbound messages into
//! supervised executions on the worker pool.
//!
//! ## Long-polling
//! ```text
//! client GET ──► poll(timeout)
//!                  ├─ queue non-empty → drain all, return immediately
//!                  └─ queue empty     → block ≤ timeout for the first
//!                                       message, then return whatever
//!                                       arrived (possibly nothing)
//! ```
//! A short fixed timeout costs one idle response per interval instead of
//! per message.
//!
//! ## Rules
//! - `send` never blocks and never fails (the queue is unbounded)
//! - Outbound messages reach `poll` in FIFO submission order
//! - `on_message` registers the new execution with the watchdog **before**
//!   the handler is submitted to the pool, so no execution runs untracked

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::execution::Execution;
use crate::core::handler::Handler;
use crate::core::interceptor::Interceptor;
use crate::core::receiver::Receiver;
use crate::core::runner;
use crate::core::session::Session;
use crate::core::Message;
use crate::watchdog::Watchdog;

/// Per-session inbound submission + outbound delivery queue pair.
pub struct Channel {
    session: Arc<Session>,
    receiver: Arc<dyn Receiver>,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    watchdog: Arc<Watchdog>,
    semaphore: Option<Arc<Semaphore>>,
    outbound_tx: mpsc::UnboundedSender<Message>,
    /// Single consumer side of the outbound queue; long-poll requests for
    /// one session are serialized on this lock.
    outbound_rx: Mutex<mpsc::UnboundedReceiver<Message>>,
}

impl Channel {
    pub(crate) fn new(
        session: Arc<Session>,
        receiver: Arc<dyn Receiver>,
        interceptors: Arc<[Arc<dyn Interceptor>]>,
        watchdog: Arc<Watchdog>,
        semaphore: Option<Arc<Semaphore>>,
    ) -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            session,
            receiver,
            interceptors,
            watchdog,
            semaphore,
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
        })
    }

    /// Returns the owning session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Enqueues one outbound message for the polling client.
    ///
    /// Never blocks, never fails: the queue is unbounded and lives as long
    /// as the channel itself.
    pub fn send(&self, message: Message) {
        let _ = self.outbound_tx.send(message);
    }

    /// Drains the outbound queue, blocking up to `timeout` when it is empty.
    ///
    /// Returns immediately with everything queued if data is already
    /// present; otherwise waits for the first message and then drains
    /// whatever else arrived in the meantime. An empty result after
    /// `timeout` is the normal idle long-poll response.
    pub async fn poll(&self, timeout: Duration) -> Vec<Message> {
        self.session.touch();

        let mut rx = self.outbound_rx.lock().await;
        let mut drained = Vec::new();
        while let Ok(message) = rx.try_recv() {
            drained.push(message);
        }
        if drained.is_empty() {
            if let Ok(Some(first)) = time::timeout(timeout, rx.recv()).await {
                drained.push(first);
                while let Ok(message) = rx.try_recv() {
                    drained.push(message);
                }
            }
        }
        drained
    }

    /// Accepts one inbound message: builds an execution with its handler,
    /// registers it with the watchdog under the owning session, and
    /// submits the handler to the worker pool.
    ///
    /// Interceptor contexts are captured here, on the submitting side,
    /// before the handler is scheduled.
    pub fn on_message(self: &Arc<Self>, message: Message) -> Arc<Execution> {
        self.session.touch();

        let contexts = self.interceptors.iter().map(|i| i.context()).collect();
        let handler = Handler::new(
            message.clone(),
            Arc::clone(&self.interceptors),
            contexts,
            Arc::clone(&self.receiver),
            Arc::clone(self),
        );
        let execution = Execution::new(message, handler, CancellationToken::new());

        self.watchdog
            .add_execution(&self.session, Arc::clone(&execution));
        runner::spawn_execution(Arc::clone(&execution), self.semaphore.clone());
        execution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::test_channel;

    #[tokio::test(start_paused = true)]
    async fn test_poll_drains_queued_messages_immediately() {
        let channel = test_channel();
        channel.send(Message::from("a"));
        channel.send(Message::from("b"));
        channel.send(Message::from("c"));

        let got = channel.poll(Duration::from_secs(30)).await;
        let got: Vec<&str> = got.iter().map(|m| m.as_ref()).collect();
        assert_eq!(got, vec!["a", "b", "c"], "FIFO submission order");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_empty() {
        let channel = test_channel();
        let got = channel.poll(Duration::from_millis(50)).await;
        assert!(got.is_empty(), "idle poll returns empty after timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_wakes_on_send() {
        let channel = test_channel();
        let poller = Arc::clone(&channel);
        let handle =
            tokio::spawn(async move { poller.poll(Duration::from_secs(30)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        channel.send(Message::from("late"));

        let got = handle.await.expect("poll task");
        let got: Vec<&str> = got.iter().map(|m| m.as_ref()).collect();
        assert_eq!(got, vec!["late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_message_runs_to_termination() {
        let channel = test_channel();
        let execution = channel.on_message(Message::from("m1"));

        for _ in 0..100 {
            if execution.is_handler_terminated() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(execution.is_handler_started());
        assert!(execution.is_handler_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_message_registers_with_watchdog() {
        let channel = test_channel();
        channel.on_message(Message::from("m1"));
        assert_eq!(channel.watchdog.tracked_executions(), 1);
    }
}
