//! Wire types shared between the pipeline and the worker entry point.

use serde::{Deserialize, Serialize};

/// Opaque bag of generation parameters, forwarded to the backend untouched.
pub type GenerationRequest = serde_json::Value;

/// Message returned to the dispatcher when a task carries no `input`.
pub const MISSING_PAYLOAD_MESSAGE: &str = "No payload provided in event";

/// Inbound task event as delivered by the dispatcher.
///
/// A JSON `null` input deserializes to `None`, same as a missing key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskEvent {
    #[serde(default)]
    pub input: Option<GenerationRequest>,
}

/// One post-processed image plus the metadata text embedded in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedResult {
    /// Re-encoded PNG, base64 (standard alphabet, padded).
    pub image_base64: String,
    /// Raw metadata text as returned by the backend's image-info endpoint.
    pub png_info: String,
}

/// Response handed back to the dispatcher for one task.
///
/// Serializes to a bare JSON array on success and to
/// `{"error": "..."}` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TaskResponse {
    Images(Vec<EnrichedResult>),
    Error { error: String },
}

impl TaskResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Response for a task event without `input`.
    pub fn missing_payload() -> Self {
        Self::error(MISSING_PAYLOAD_MESSAGE)
    }
}
