//! Self-rescheduling poll tasks.
//!
//! Each task runs its tick, waits for it to finish and then sleeps for the
//! configured interval before the next tick. A slow remote call therefore
//! delays only its own task and ticks never overlap.

use futures_util::FutureExt;
use log::{debug, error};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running poll task. Dropping it stops the task.
pub struct PollTask {
    label: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    /// Spawn a task that calls `tick` immediately and then again `interval`
    /// after each completion, until stopped.
    pub fn spawn<F, Fut>(label: &'static str, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            debug!("[Poll] {} started, interval {:?}", label, interval);
            loop {
                let run = AssertUnwindSafe(tick()).catch_unwind();
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    outcome = run => {
                        if outcome.is_err() {
                            error!("[Poll] {} tick panicked, continuing", label);
                        }
                    }
                }

                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!("[Poll] {} stopped", label);
        });

        Self {
            label,
            token,
            handle: Some(handle),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request the task to stop. An in-flight tick is dropped.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop the task and wait until it has exited.
    pub async fn join(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            error!("[Poll] {} task failed: {}", self.label, e);
        }
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
