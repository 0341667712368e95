use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use distillery_backend::port::PortScanConfig;
use distillery_backend::process::{BackendConfig, LaunchConfig, DEFAULT_LAUNCH_COMMAND, DEFAULT_PORT_FLAG};
use distillery_backend::readiness::ReadinessConfig;
use distillery_core::error::CoreError;
use distillery_pipeline::fan_out::{PipelineConfig, DEFAULT_MAX_CONCURRENCY};

/// Default timeout for generation and image-info requests, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Output format of the stderr log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `text` or `json`, got `{other}`")),
        }
    }
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub backend: BackendConfig,
    pub pipeline: PipelineConfig,
    /// Timeout applied to every backend API request.
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                         | Default                  |
    /// |---------------------------------|--------------------------|
    /// | `BACKEND_COMMAND`               | webui launch line        |
    /// | `BACKEND_PORT_FLAG`             | `--port` (empty = none)  |
    /// | `BACKEND_HOST`                  | `127.0.0.1`              |
    /// | `BACKEND_INITIAL_PORT`          | `7860`                   |
    /// | `BACKEND_MAX_PORT_SCAN`         | `100`                    |
    /// | `READINESS_POLL_INTERVAL_MS`    | `1000`                   |
    /// | `READINESS_TIMEOUT_SECS`        | `600`                    |
    /// | `BACKEND_REQUEST_TIMEOUT_SECS`  | `600`                    |
    /// | `TERMINATE_BACKEND_AFTER_BATCH` | `false`                  |
    /// | `ENRICH_MAX_CONCURRENCY`        | `8`                      |
    /// | `LOG_FORMAT`                    | `text`                   |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let scan_defaults = PortScanConfig::default();
        let readiness_defaults = ReadinessConfig::default();

        let launch = LaunchConfig {
            command: lookup("BACKEND_COMMAND")
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LAUNCH_COMMAND.into()),
            port_flag: match lookup("BACKEND_PORT_FLAG") {
                Some(flag) if flag.trim().is_empty() => None,
                Some(flag) => Some(flag.trim().to_string()),
                None => Some(DEFAULT_PORT_FLAG.into()),
            },
        };

        let port_scan = PortScanConfig {
            host: lookup("BACKEND_HOST").unwrap_or(scan_defaults.host),
            initial_port: parse_var(&lookup, "BACKEND_INITIAL_PORT", scan_defaults.initial_port)?,
            max_ports_scanned: parse_var(
                &lookup,
                "BACKEND_MAX_PORT_SCAN",
                scan_defaults.max_ports_scanned,
            )?,
            probe_timeout: scan_defaults.probe_timeout,
        };
        if port_scan.initial_port == 0 {
            return Err(invalid("BACKEND_INITIAL_PORT", "must be at least 1"));
        }
        if port_scan.max_ports_scanned == 0 {
            return Err(invalid("BACKEND_MAX_PORT_SCAN", "must be at least 1"));
        }

        let poll_ms: u64 = parse_var(
            &lookup,
            "READINESS_POLL_INTERVAL_MS",
            readiness_defaults.poll_interval.as_millis() as u64,
        )?;
        let timeout_secs: u64 = parse_var(
            &lookup,
            "READINESS_TIMEOUT_SECS",
            readiness_defaults.timeout.as_secs(),
        )?;
        let readiness = ReadinessConfig {
            poll_interval: Duration::from_millis(poll_ms),
            timeout: Duration::from_secs(timeout_secs),
        };

        let max_concurrency: usize =
            parse_var(&lookup, "ENRICH_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?;
        if max_concurrency == 0 {
            return Err(invalid("ENRICH_MAX_CONCURRENCY", "must be at least 1"));
        }

        let pipeline = PipelineConfig {
            terminate_after_batch: parse_bool(&lookup, "TERMINATE_BACKEND_AFTER_BATCH", false)?,
            max_concurrency,
        };

        let request_timeout = Duration::from_secs(parse_var(
            &lookup,
            "BACKEND_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw
                .parse()
                .map_err(|message| CoreError::InvalidSetting {
                    key: "LOG_FORMAT",
                    message,
                })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            backend: BackendConfig {
                launch,
                port_scan,
                readiness,
            },
            pipeline,
            request_timeout,
            log_format,
        })
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> CoreError {
    CoreError::InvalidSetting {
        key,
        message: message.into(),
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, format!("`{raw}`: {e}"))),
        None => Ok(default),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, CoreError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, format!("`{raw}` is not a boolean"))),
    }
}
