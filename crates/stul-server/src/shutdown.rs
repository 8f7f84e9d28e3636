//! Relay shutdown: one token for the listener and every session, plus a
//! tracker of running sessions.
//!
//! Sessions watch the token next to their receive wait. Once it fires they
//! stop reading, deregister, re-broadcast host presence and close their
//! writer with a normal Close frame, the same teardown as a peer disconnect.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// Time sessions get to tear down when the caller gives no bound.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// What was still running when draining stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Sessions that had not finished.
    pub remaining_sessions: usize,
    /// Whether the listener and every session finished within the bound.
    pub completed: bool,
}

/// Owns the relay-wide stop signal and the set of live session tasks.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Coordinator with no session and an unfired token.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            sessions: TaskTracker::new(),
        }
    }

    /// Token a session or the listener stops on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Count `session` as live until it completes.
    pub fn track_session<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the stop signal has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the stop signal, then wait up to `timeout` for the listener and
    /// every tracked session. Sessions still running afterwards are left to
    /// the runtime.
    pub async fn drain(&self, listener: JoinHandle<()>, timeout: Option<Duration>) -> DrainOutcome {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.token.cancel();
        let _ = self.sessions.close();
        info!(
            sessions = self.sessions.len(),
            timeout_ms = timeout.as_millis(),
            "draining sessions"
        );

        let listener_done = async {
            if let Err(e) = listener.await {
                warn!(error = %e, "listener task failed");
            }
        };
        let sessions_done = self.sessions.wait();
        let completed = tokio::time::timeout(timeout, async {
            let _ = tokio::join!(listener_done, sessions_done);
        })
        .await
        .is_ok();

        let outcome = DrainOutcome {
            remaining_sessions: self.sessions.len(),
            completed,
        };
        if !completed {
            warn!(remaining = outcome.remaining_sessions, "drain timed out after {timeout:?}");
        }
        outcome
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_listener(token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { token.cancelled().await })
    }

    #[test]
    fn fresh_coordinator_is_running() {
        let coord = ShutdownCoordinator::default();
        assert!(!coord.is_shutting_down());
        assert_eq!(coord.active_sessions(), 0);
    }

    #[tokio::test]
    async fn drain_stops_sessions_watching_the_token() {
        let coord = ShutdownCoordinator::new();
        for _ in 0..3 {
            let token = coord.token();
            let _ = tokio::spawn(coord.track_session(async move { token.cancelled().await }));
        }
        assert_eq!(coord.active_sessions(), 3);

        let outcome = coord.drain(idle_listener(coord.token()), None).await;
        assert!(coord.is_shutting_down());
        assert_eq!(
            outcome,
            DrainOutcome {
                remaining_sessions: 0,
                completed: true,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn drain_reports_sessions_that_ignore_the_token() {
        let coord = ShutdownCoordinator::new();
        let _ = tokio::spawn(coord.track_session(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        }));

        let outcome = coord
            .drain(idle_listener(coord.token()), Some(Duration::from_millis(100)))
            .await;
        assert_eq!(outcome.remaining_sessions, 1);
        assert!(!outcome.completed);
    }
}
