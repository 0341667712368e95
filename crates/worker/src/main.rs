//! `distillery-worker` -- supervises the image-generation backend and
//! serves dispatcher tasks over stdin/stdout.
//!
//! See [`distillery_worker::config::WorkerConfig::from_env`] for the
//! environment variables it reads.

use std::sync::Arc;

use distillery_backend::lifecycle::BackendLifecycle;
use distillery_backend::process::BackendProcess;
use distillery_pipeline::fan_out::FanOutPipeline;
use distillery_worker::config::{LogFormat, WorkerConfig};
use distillery_worker::dispatch;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();
    let log_format = config
        .as_ref()
        .map(|c| c.log_format)
        .unwrap_or_default();
    init_tracing(log_format);

    let config = config.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid worker configuration");
        std::process::exit(1);
    });

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Worker stopped with an error");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "distillery_worker=info,distillery_pipeline=info,distillery_backend=info".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run(config: WorkerConfig) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let shutdown = CancellationToken::new();
    let backend = Arc::new(BackendProcess::new(
        config.backend.clone(),
        client.clone(),
        shutdown.child_token(),
    ));
    let pipeline = FanOutPipeline::new(Arc::clone(&backend), client, config.pipeline.clone());

    tracing::info!(
        command = %config.backend.launch.command,
        initial_port = config.backend.port_scan.initial_port,
        terminate_after_batch = config.pipeline.terminate_after_batch,
        max_concurrency = config.pipeline.max_concurrency,
        "Starting distillery-worker",
    );

    let ctrl_c = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C");
                shutdown.cancel();
            }
        })
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let result = dispatch::run(&pipeline, stdin, tokio::io::stdout(), &shutdown).await;

    shutdown.cancel();
    ctrl_c.abort();
    backend.terminate().await;

    let answered = result?;
    tracing::info!(answered, "Worker stopped");
    Ok(())
}
