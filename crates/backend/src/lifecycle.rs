//! Lifecycle seam between the pipeline and whatever owns the backend.
//!
//! [`BackendLifecycle`] is implemented by
//! [`BackendProcess`](crate::process::BackendProcess); the pipeline is
//! generic over it so tests can drive it against an in-process fake.

use crate::port::{BackendAddress, PortError};

/// Errors that prevent the backend from reaching the ready state.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The launch command template has no program.
    #[error("Invalid launch command: {0}")]
    InvalidCommand(String),

    /// No free local port could be found.
    #[error(transparent)]
    Port(#[from] PortError),

    /// The OS refused to spawn the backend process.
    #[error("Failed to spawn backend process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The backend process exited before it became ready.
    #[error("Backend process exited during startup ({status})")]
    ExitedDuringStartup {
        /// Exit status as reported by the OS.
        status: String,
    },

    /// The backend did not become ready within the configured bound.
    #[error("Backend not ready after {attempts} probes ({elapsed_ms}ms)")]
    ReadinessTimeout {
        /// Number of readiness probes issued.
        attempts: u32,
        /// Wall-clock time spent waiting.
        elapsed_ms: u64,
    },

    /// Startup was aborted through the cancellation token.
    #[error("Backend startup cancelled")]
    Cancelled,
}

/// Start/stop control over a single backend instance.
pub trait BackendLifecycle: Send + Sync {
    /// Make sure the backend is running and ready, starting it if needed.
    ///
    /// Idempotent: once ready, repeated calls return the same address
    /// without side effects.
    fn ensure_started(
        &self,
    ) -> impl std::future::Future<Output = Result<BackendAddress, StartupError>> + Send;

    /// Stop the backend if it is running. A no-op otherwise.
    fn terminate(&self) -> impl std::future::Future<Output = ()> + Send;
}
