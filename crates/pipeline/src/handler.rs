//! Entry point invoked once per dispatcher task.

use distillery_backend::lifecycle::BackendLifecycle;
use distillery_core::types::{TaskEvent, TaskResponse};

use crate::fan_out::{FanOutPipeline, PipelineError};

/// Run the task's `input` through the pipeline.
///
/// A task without `input` yields a structured error response and never
/// touches the backend. Pipeline failures are returned as `Err` for the
/// dispatcher to report.
pub async fn handle<B: BackendLifecycle>(
    pipeline: &FanOutPipeline<B>,
    task: TaskEvent,
) -> Result<TaskResponse, PipelineError> {
    let Some(request) = task.input else {
        tracing::warn!("Task event has no input payload");
        return Ok(TaskResponse::missing_payload());
    };

    let results = pipeline.deliver(&request).await?;
    Ok(TaskResponse::Images(results))
}
