//! Readiness probing for a freshly launched backend.
//!
//! The backend accepts connections well before its model is loaded,
//! so "ready" means it completed one real, minimal generation request.
//! [`wait_until_ready`] polls a [`ReadinessProbe`] at a fixed interval
//! until it passes, the child exits, the wait times out, or the
//! [`CancellationToken`] is triggered.

use std::time::{Duration, Instant};

use tokio::process::Child;
use tokio_util::sync::CancellationToken;

use crate::api::BackendApi;
use crate::lifecycle::StartupError;

/// Log a not-ready attempt at `warn` only this often (plus the first).
const PROBE_LOG_EVERY: u32 = 10;

/// Tunable parameters for the readiness wait.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Delay between probes.
    pub poll_interval: Duration,
    /// Upper bound on the whole wait, probes included.
    pub timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Decides whether the backend at a base URL can serve requests.
pub trait ReadinessProbe: Send + Sync {
    /// `true` once the backend can complete real work. Never errors:
    /// any failure means "not ready".
    fn is_ready(&self, base_url: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// Production probe: `GET /` followed by a tiny generation request.
#[derive(Debug, Clone, Default)]
pub struct HttpReadinessProbe {
    client: reqwest::Client,
}

impl HttpReadinessProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ReadinessProbe for HttpReadinessProbe {
    async fn is_ready(&self, base_url: &str) -> bool {
        let api = BackendApi::with_client(self.client.clone(), base_url.to_string());

        if let Err(e) = api.liveness().await {
            tracing::debug!(base_url, error = %e, "Liveness check failed");
            return false;
        }

        match api.generate(&probe_payload()).await {
            Ok(images) => {
                if images.is_empty() {
                    tracing::debug!(base_url, "Probe generation returned no images");
                }
                !images.is_empty()
            }
            Err(e) => {
                tracing::debug!(base_url, error = %e, "Probe generation failed");
                false
            }
        }
    }
}

/// Smallest generation request that still exercises the full pipeline.
pub fn probe_payload() -> serde_json::Value {
    serde_json::json!({
        "steps": 1,
        "width": 64,
        "height": 64,
        "cfg_scale": 6,
        "enable_hr": false,
        "restore_faces": false,
        "batch_size": 1,
        "save_images": false,
        "alwayson_scripts": [],
        "script_name": "",
        "do_not_save_samples": true,
    })
}

/// Poll `probe` until the backend at `base_url` is ready.
///
/// Returns the number of probes issued. Fails with
/// [`StartupError::ExitedDuringStartup`] if `child` exits,
/// [`StartupError::ReadinessTimeout`] once `config.timeout` elapses, and
/// [`StartupError::Cancelled`] if `cancel` fires. The child is left
/// running on every path; killing it is the caller's decision.
pub async fn wait_until_ready<P: ReadinessProbe>(
    probe: &P,
    base_url: &str,
    child: &mut Child,
    config: &ReadinessConfig,
    cancel: &CancellationToken,
) -> Result<u32, StartupError> {
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::error!(base_url, %status, "Backend process exited during startup");
                return Err(StartupError::ExitedDuringStartup {
                    status: status.to_string(),
                });
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(base_url, error = %e, "Failed to poll backend process status");
            }
        }

        attempt += 1;
        let remaining = config.timeout.saturating_sub(start.elapsed());

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(base_url, attempt, "Readiness wait cancelled");
                return Err(StartupError::Cancelled);
            }
            result = tokio::time::timeout(remaining, probe.is_ready(base_url)) => {
                if result.unwrap_or(false) {
                    tracing::info!(
                        base_url,
                        attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Backend ready",
                    );
                    return Ok(attempt);
                }
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if start.elapsed() >= config.timeout {
            tracing::error!(base_url, attempt, elapsed_ms, "Backend readiness timed out");
            return Err(StartupError::ReadinessTimeout {
                attempts: attempt,
                elapsed_ms,
            });
        }

        if attempt == 1 || attempt % PROBE_LOG_EVERY == 0 {
            tracing::warn!(base_url, attempt, elapsed_ms, "Backend not ready yet");
        } else {
            tracing::debug!(base_url, attempt, elapsed_ms, "Backend not ready yet");
        }

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(base_url, attempt, "Readiness wait cancelled");
                return Err(StartupError::Cancelled);
            }
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }
}
