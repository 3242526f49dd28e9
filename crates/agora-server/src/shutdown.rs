//! Shutdown sequencing.
//!
//! One root [`CancellationToken`] reaches the change feed worker and the HTTP
//! listener. The listener's graceful hook disconnects every open session, so
//! cancelling the token is enough to start the whole teardown. Long-running
//! tasks are registered by name with [`ShutdownCoordinator::track`] and
//! drained against a single deadline.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How each tracked task ended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Finished before the deadline.
    pub completed: Vec<&'static str>,
    /// Panicked or were cancelled elsewhere.
    pub failed: Vec<&'static str>,
    /// Still running at the deadline and aborted.
    pub aborted: Vec<&'static str>,
}

impl ShutdownReport {
    /// Every task finished on its own.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.aborted.is_empty()
    }
}

/// Owns the gateway's root cancellation token and its background tasks.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl ShutdownCoordinator {
    /// Deadline used by the binary for draining sessions and the feed.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the root token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Register a task to be drained by [`Self::graceful_shutdown`].
    pub fn track(&self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.lock().push((name, handle));
    }

    /// Number of tasks not yet drained.
    pub fn tracked(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Cancel the root token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait until `timeout` for every tracked task.
    ///
    /// Tasks still running at the deadline are aborted.
    pub async fn graceful_shutdown(&self, timeout: Duration) -> ShutdownReport {
        self.shutdown();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        info!(tasks = tasks.len(), timeout_secs = timeout.as_secs(), "draining gateway tasks");

        let deadline = tokio::time::Instant::now() + timeout;
        let mut report = ShutdownReport::default();
        for (name, mut handle) in tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.completed.push(name),
                Ok(Err(err)) => {
                    warn!(task = name, error = %err, "task failed during shutdown");
                    report.failed.push(name);
                }
                Err(_) => {
                    handle.abort();
                    warn!(task = name, "task missed shutdown deadline, aborting");
                    report.aborted.push(name);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::default();
        assert!(!coord.is_shutting_down());
        assert_eq!(coord.tracked(), 0);
    }

    #[test]
    fn shutdown_cancels_every_token() {
        let coord = ShutdownCoordinator::new();
        let t1 = coord.token();
        let t2 = coord.token();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
    }

    #[tokio::test]
    async fn drains_tasks_that_watch_the_token() {
        let coord = ShutdownCoordinator::new();
        for name in ["change-feed", "http"] {
            let token = coord.token();
            coord.track(name, tokio::spawn(async move { token.cancelled().await }));
        }

        let report = coord.graceful_shutdown(Duration::from_secs(5)).await;
        assert!(report.is_clean());
        assert_eq!(report.completed, ["change-feed", "http"]);
        assert_eq!(coord.tracked(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn aborts_task_that_ignores_the_token() {
        let coord = ShutdownCoordinator::new();
        let stuck = tokio::spawn(tokio::time::sleep(Duration::from_secs(300)));
        let abort = stuck.abort_handle();
        coord.track("stuck", stuck);
        let token = coord.token();
        coord.track("feed", tokio::spawn(async move { token.cancelled().await }));

        let report = coord.graceful_shutdown(Duration::from_millis(50)).await;
        assert_eq!(report.aborted, ["stuck"]);
        // The deadline is shared, so a task queued behind the stuck one still counts.
        assert_eq!(report.completed, ["feed"]);
        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }

    async fn explode() {
        panic!("boom");
    }

    #[tokio::test]
    async fn panicked_task_is_reported_failed() {
        let coord = ShutdownCoordinator::new();
        coord.track("renderer", tokio::spawn(explode()));
        let report = coord.graceful_shutdown(Duration::from_secs(5)).await;
        assert_eq!(report.failed, ["renderer"]);
        assert!(!report.is_clean());
    }
}
