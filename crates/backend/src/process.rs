//! Ownership of the backend server subprocess.
//!
//! [`BackendProcess`] lazily launches the backend on the first free
//! local port, waits for it to pass the readiness probe, and kills it
//! on request. All state sits behind one async mutex that is held for
//! the whole start sequence, so concurrent callers never spawn twice.
//! Children are spawned with `kill_on_drop(true)`; dropping the
//! supervisor takes the backend down with it.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::{BackendLifecycle, StartupError};
use crate::port::{find_available_port, BackendAddress, PortScanConfig};
use crate::readiness::{wait_until_ready, HttpReadinessProbe, ReadinessConfig, ReadinessProbe};

/// Launch line of a stock stable-diffusion-webui checkout in API-only mode.
pub const DEFAULT_LAUNCH_COMMAND: &str = "python3 stable-diffusion-webui/launch.py --xformers --api --no-hashing --no-download-sd-model --freeze-settings --disable-console-progressbars --skip-version-check --skip-python-version-check --skip-prepare-environment --skip-torch-cuda-test --skip-install";

/// Flag placed in front of the discovered port.
pub const DEFAULT_PORT_FLAG: &str = "--port";

/// How the backend command line is built.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Whitespace-separated command template; the first word is the program.
    pub command: String,
    /// Optional flag emitted before the port, e.g. `--port`.
    pub port_flag: Option<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_LAUNCH_COMMAND.to_string(),
            port_flag: Some(DEFAULT_PORT_FLAG.to_string()),
        }
    }
}

/// Everything [`BackendProcess`] needs to launch and wait for a backend.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub launch: LaunchConfig,
    pub port_scan: PortScanConfig,
    pub readiness: ReadinessConfig,
}

/// Split the command template and append the port as the trailing argument.
///
/// Returns the program and its argument list.
pub fn launch_args(launch: &LaunchConfig, port: u16) -> Result<(String, Vec<String>), StartupError> {
    let mut words = launch.command.split_whitespace().map(str::to_string);
    let program = words
        .next()
        .ok_or_else(|| StartupError::InvalidCommand("command template is empty".to_string()))?;

    let mut args: Vec<String> = words.collect();
    if let Some(flag) = launch.port_flag.as_deref().filter(|f| !f.is_empty()) {
        args.push(flag.to_string());
    }
    args.push(port.to_string());

    Ok((program, args))
}

/// The one live backend: where it listens and the child that serves it.
#[derive(Debug)]
struct RunningBackend {
    address: BackendAddress,
    child: Child,
}

/// Supervisor for a single backend subprocess.
///
/// Created once per worker and shared by reference (typically in an
/// `Arc`). Generic over the readiness probe so tests can swap in a fake.
#[derive(Debug)]
pub struct BackendProcess<P = HttpReadinessProbe> {
    config: BackendConfig,
    client: reqwest::Client,
    probe: P,
    state: Mutex<Option<RunningBackend>>,
    /// Aborts an in-flight readiness wait (e.g. on worker shutdown).
    cancel: CancellationToken,
}

impl BackendProcess<HttpReadinessProbe> {
    /// Supervisor using the HTTP readiness probe over `client`.
    pub fn new(config: BackendConfig, client: reqwest::Client, cancel: CancellationToken) -> Self {
        let probe = HttpReadinessProbe::new(client.clone());
        Self::with_probe(config, client, probe, cancel)
    }
}

impl<P: ReadinessProbe> BackendProcess<P> {
    pub fn with_probe(
        config: BackendConfig,
        client: reqwest::Client,
        probe: P,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            client,
            probe,
            state: Mutex::new(None),
            cancel,
        }
    }

    /// Address of the running backend, if one has been started.
    pub async fn address(&self) -> Option<BackendAddress> {
        self.state.lock().await.as_ref().map(|r| r.address.clone())
    }

    /// OS process ID of the running backend, if any.
    pub async fn pid(&self) -> Option<u32> {
        self.state.lock().await.as_ref().and_then(|r| r.child.id())
    }

    /// `true` if a backend was started and has not exited since.
    pub async fn is_running(&self) -> bool {
        match self.state.lock().await.as_mut() {
            Some(running) => matches!(running.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Scan for a port, spawn the backend on it and wait until ready.
    ///
    /// On any failure after the spawn the child is killed before the
    /// error is returned.
    async fn start(&self) -> Result<RunningBackend, StartupError> {
        let address = find_available_port(&self.client, &self.config.port_scan).await?;
        let (program, args) = launch_args(&self.config.launch, address.port)?;

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            // stdout belongs to the worker's response stream.
            .stdout(std::io::stderr())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!(program = %program, error = %e, "Failed to spawn backend process");
                StartupError::Spawn(e)
            })?;

        tracing::info!(
            pid = child.id(),
            port = address.port,
            program = %program,
            "Backend process started",
        );

        let base_url = address.base_url();
        match wait_until_ready(
            &self.probe,
            &base_url,
            &mut child,
            &self.config.readiness,
            &self.cancel,
        )
        .await
        {
            Ok(_) => Ok(RunningBackend { address, child }),
            Err(e) => {
                kill_child(&mut child).await;
                Err(e)
            }
        }
    }
}

impl<P: ReadinessProbe> BackendLifecycle for BackendProcess<P> {
    async fn ensure_started(&self) -> Result<BackendAddress, StartupError> {
        let mut state = self.state.lock().await;

        if let Some(running) = state.as_mut() {
            match running.child.try_wait() {
                Ok(None) => return Ok(running.address.clone()),
                Ok(Some(status)) => {
                    tracing::warn!(
                        port = running.address.port,
                        %status,
                        "Backend process exited, starting a new one",
                    );
                    *state = None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to poll backend process status");
                    return Ok(running.address.clone());
                }
            }
        }

        let running = self.start().await?;
        let address = running.address.clone();
        *state = Some(running);
        Ok(address)
    }

    async fn terminate(&self) {
        let Some(mut running) = self.state.lock().await.take() else {
            tracing::debug!("No backend process to terminate");
            return;
        };
        kill_child(&mut running.child).await;
    }
}

/// Force-kill `child` unless it already exited, and reap it.
async fn kill_child(child: &mut Child) {
    let pid = child.id();
    match child.try_wait() {
        Ok(Some(status)) => {
            tracing::debug!(pid, %status, "Backend process already exited");
        }
        _ => match child.kill().await {
            Ok(()) => tracing::info!(pid, "Backend process killed"),
            Err(e) => tracing::warn!(pid, error = %e, "Failed to kill backend process"),
        },
    }
}
