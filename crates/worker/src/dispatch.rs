//! Line-oriented task loop between the dispatcher and the pipeline.

use distillery_backend::lifecycle::BackendLifecycle;
use distillery_core::types::{TaskEvent, TaskResponse};
use distillery_pipeline::fan_out::FanOutPipeline;
use distillery_pipeline::handler::handle;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Process task events from `reader` until EOF or `shutdown` fires.
///
/// Every non-blank input line produces exactly one output line. Malformed
/// events, lines that are not UTF-8, and failed batches are answered with
/// `{"error": ...}` and the loop keeps going; only I/O errors on the
/// streams end it early.
/// Returns the number of tasks answered.
pub async fn run<B, R, W>(
    pipeline: &FanOutPipeline<B>,
    mut reader: R,
    mut writer: W,
    shutdown: &CancellationToken,
) -> anyhow::Result<u64>
where
    B: BackendLifecycle,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut answered = 0u64;

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown requested, leaving task loop");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read?,
        };

        if read == 0 {
            tracing::info!("Task stream closed");
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => respond(pipeline, line).await,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected task event that is not UTF-8");
                TaskResponse::error(format!("Invalid task event: {e}"))
            }
        };

        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
        writer.flush().await?;
        answered += 1;
    }

    Ok(answered)
}

async fn respond<B: BackendLifecycle>(pipeline: &FanOutPipeline<B>, line: &str) -> TaskResponse {
    let task: TaskEvent = match serde_json::from_str(line) {
        Ok(task) => task,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed task event");
            return TaskResponse::error(format!("Invalid task event: {e}"));
        }
    };

    match handle(pipeline, task).await {
        Ok(response) => response,
        Err(e) => TaskResponse::error(e.to_string()),
    }
}
