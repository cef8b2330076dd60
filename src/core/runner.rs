//! # Run a single execution on the worker pool.
//!
//! One pool task per execution: acquire a worker permit (cancellable
//! wait), apply the start discipline, run the handler body, and guarantee
//! the execution reaches terminated on every path.
//!
//! ## Flow
//! ```text
//! spawn_execution()
//!   ├─► acquire permit          (select! against the cancellation token:
//!   │                            cancel while queued → clean
//!   │                            Pending→Terminated, no handler logic)
//!   ├─► start discipline        (no cancellation recorded AND the start
//!   │                            slot CAS wins; otherwise terminate)
//!   ├─► handler.run()           (body + unconditional finish)
//!   └─► report failure          (errors go to the sink, never crash the
//!                                worker; cancellation is not a failure)
//! ```

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::core::execution::Execution;

/// Submits one execution to the worker pool.
pub(crate) fn spawn_execution(
    execution: Arc<Execution>,
    semaphore: Option<Arc<Semaphore>>,
) -> JoinHandle<()> {
    tokio::spawn(run_execution(execution, semaphore))
}

/// Runs one execution to termination.
///
/// The permit wait is the pending phase: the execution is submitted but no
/// worker has claimed it. Cancellation during that wait aborts the wait
/// and terminates the execution without invoking any handler logic — the
/// clean cancelled-before-start edge, which deliberately produces no
/// feedback on the reply channel. Only deliveries cancelled after the
/// start slot was claimed surface through the reporting path below.
pub(crate) async fn run_execution(
    execution: Arc<Execution>,
    semaphore: Option<Arc<Semaphore>>,
) {
    let token = execution.cancel_token().clone();

    let _permit = match semaphore {
        Some(sem) => {
            tokio::select! {
                res = sem.acquire_owned() => match res {
                    Ok(permit) => Some(permit),
                    Err(_closed) => {
                        execution.handler().finish();
                        return;
                    }
                },
                _ = token.cancelled() => {
                    execution.handler().finish();
                    return;
                }
            }
        }
        None => None,
    };

    if execution.is_canceled() || !execution.handler().claim_start() {
        execution.handler().finish();
        return;
    }

    match execution.handler().run(&token).await {
        Ok(()) => {}
        Err(e) if e.is_cancellation() => {
            eprintln!(
                "[msgvisor] delivery interrupted: message={:?}",
                execution.message()
            );
        }
        Err(e) => {
            eprintln!(
                "[msgvisor] delivery failed: message={:?} {}",
                execution.message(),
                e.as_message()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::noop_execution;

    #[tokio::test(start_paused = true)]
    async fn test_uncontended_execution_terminates() {
        let execution = noop_execution("m1");
        run_execution(Arc::clone(&execution), None).await;
        assert!(execution.is_handler_started());
        assert!(execution.is_handler_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_run_skips_handler() {
        let execution = noop_execution("m1");
        execution.cancel();
        run_execution(Arc::clone(&execution), None).await;
        assert!(
            !execution.is_handler_started(),
            "no handler logic after cancel-before-start"
        );
        assert!(execution.is_handler_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_queued_terminates_without_start() {
        let sem = Arc::new(Semaphore::new(1));
        let blocker = Arc::clone(&sem)
            .acquire_owned()
            .await
            .expect("permit for the blocking slot");

        let execution = noop_execution("m1");
        let handle = spawn_execution(Arc::clone(&execution), Some(Arc::clone(&sem)));
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(
            !execution.is_handler_started(),
            "still queued behind the held permit"
        );

        execution.cancel();
        handle.await.expect("runner task");
        assert!(!execution.is_handler_started());
        assert!(execution.is_handler_terminated());
        drop(blocker);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_execution_starts_once_permit_frees() {
        let sem = Arc::new(Semaphore::new(1));
        let blocker = Arc::clone(&sem)
            .acquire_owned()
            .await
            .expect("permit for the blocking slot");

        let execution = noop_execution("m1");
        let handle = spawn_execution(Arc::clone(&execution), Some(Arc::clone(&sem)));
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(!execution.is_handler_started());

        drop(blocker);
        handle.await.expect("runner task");
        assert!(execution.is_handler_started());
        assert!(execution.is_handler_terminated());
    }
}
