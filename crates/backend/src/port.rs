//! Local port discovery for the backend server.
//!
//! [`find_available_port`] walks candidate ports upwards from a
//! configured start and returns the first one nothing answers on. A
//! port counts as taken as soon as a connection succeeds, whatever the
//! HTTP outcome; only a refused or unreachable connection marks it free.

use std::fmt;
use std::time::Duration;

/// Default host the backend binds to and is reached on.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default first candidate port.
pub const DEFAULT_INITIAL_PORT: u16 = 7860;

/// Default cap on the number of ports probed per scan.
pub const DEFAULT_MAX_PORTS_SCANNED: u16 = 100;

/// Per-port probe timeout.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Host and port of a backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendAddress {
    pub host: String,
    pub port: u16,
}

impl BackendAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// HTTP base URL, e.g. `http://127.0.0.1:7860`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Tunable parameters for a port scan.
#[derive(Debug, Clone)]
pub struct PortScanConfig {
    /// Host to probe.
    pub host: String,
    /// First candidate port.
    pub initial_port: u16,
    /// Maximum number of candidates probed before giving up.
    pub max_ports_scanned: u16,
    /// Timeout applied to each probe request.
    pub probe_timeout: Duration,
}

impl Default for PortScanConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            initial_port: DEFAULT_INITIAL_PORT,
            max_ports_scanned: DEFAULT_MAX_PORTS_SCANNED,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Errors from port discovery.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Every candidate in the scan window had a listener.
    #[error("No free port found after scanning {scanned} ports from {initial}")]
    Exhausted {
        /// First candidate port.
        initial: u16,
        /// Number of ports probed.
        scanned: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortState {
    Free,
    Occupied,
}

/// Find the first port at or above `config.initial_port` with no listener.
///
/// Candidates are probed in increasing order and never revisited. The
/// scan stops after `config.max_ports_scanned` probes or at the top of
/// the port range, whichever comes first.
pub async fn find_available_port(
    client: &reqwest::Client,
    config: &PortScanConfig,
) -> Result<BackendAddress, PortError> {
    let mut scanned = 0u32;

    for port in (config.initial_port..=u16::MAX).take(usize::from(config.max_ports_scanned)) {
        scanned += 1;
        let address = BackendAddress::new(config.host.clone(), port);

        match probe_port(client, &address, config.probe_timeout).await {
            PortState::Free => {
                tracing::debug!(port, scanned, "Found free port");
                return Ok(address);
            }
            PortState::Occupied => {
                tracing::debug!(port, "Port occupied, trying next");
            }
        }
    }

    Err(PortError::Exhausted {
        initial: config.initial_port,
        scanned,
    })
}

async fn probe_port(
    client: &reqwest::Client,
    address: &BackendAddress,
    timeout: Duration,
) -> PortState {
    match client.get(address.base_url()).timeout(timeout).send().await {
        Ok(_) => PortState::Occupied,
        Err(e) if e.is_connect() => PortState::Free,
        Err(e) => {
            // Accepted the connection but did not answer cleanly.
            tracing::debug!(port = address.port, error = %e, "Port probe inconclusive");
            PortState::Occupied
        }
    }
}
