//! Graceful shutdown coordination via `CancellationToken`.
//!
//! Shutdown happens in two stages: first wait for active runs to finish
//! (engines keep producing and the coordinator keeps appending until each
//! turn completes), then drain the server tasks. Both stages share one
//! deadline.

use std::time::Duration;

use colloquy_runtime::RunCoordinator;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default window for in-flight runs and server tasks to finish.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// How often to re-check the coordinator while runs are draining.
const RUN_DRAIN_POLL: Duration = Duration::from_millis(50);

/// Coordinates graceful shutdown across server tasks and in-flight runs.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, wait for the coordinator's active runs to drain,
    /// then wait for the server task handles, all within one `timeout`
    /// window. Runs still active at the deadline are logged and left to
    /// finish their appends on their own; committed events are never touched.
    pub async fn graceful_shutdown(
        &self,
        coordinator: &RunCoordinator,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        let deadline = Instant::now() + timeout;

        self.shutdown();
        info!(
            active_runs = coordinator.active_runs(),
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "shutting down"
        );

        // Stage one: let in-flight turns complete.
        while coordinator.active_runs() > 0 && Instant::now() < deadline {
            tokio::time::sleep(RUN_DRAIN_POLL).await;
        }
        let stranded = coordinator.active_runs();
        if stranded > 0 {
            warn!(stranded, "runs still active at shutdown deadline");
        }

        // Stage two: drain the server tasks with whatever window is left.
        let remaining = deadline.saturating_duration_since(Instant::now());
        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(remaining, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some tasks may still be running");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
