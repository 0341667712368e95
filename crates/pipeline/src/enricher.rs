//! Per-image post-processing: embed the backend's generation metadata.

use distillery_backend::api::{BackendApi, BackendApiError};
use distillery_core::payload::{decode_image_payload, encode_image_payload, strip_data_uri};
use distillery_core::png_metadata::{embed_parameters, PngMetadataError};
use distillery_core::types::EnrichedResult;

/// Errors while enriching a single image. Any of them fails the item.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Invalid base64 image payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Failed to fetch image metadata: {0}")]
    Metadata(#[from] BackendApiError),

    #[error(transparent)]
    Image(#[from] PngMetadataError),

    /// The blocking re-encode task panicked or was cancelled.
    #[error("Image encoding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Embeds generation parameters into images produced by one backend.
#[derive(Debug, Clone)]
pub struct ImageEnricher {
    api: BackendApi,
}

impl ImageEnricher {
    pub fn new(api: BackendApi) -> Self {
        Self { api }
    }

    /// Decode `image_base64`, fetch its parameters from the backend, and
    /// re-encode it as PNG with those parameters embedded.
    ///
    /// The PNG work runs on the blocking pool so a large batch does not
    /// stall the runtime.
    pub async fn enrich(&self, image_base64: &str) -> Result<EnrichedResult, EnrichmentError> {
        let image_bytes = decode_image_payload(image_base64)?;
        let png_info = self.api.image_info(strip_data_uri(image_base64)).await?;

        let parameters = png_info.clone();
        let encoded =
            tokio::task::spawn_blocking(move || embed_parameters(&image_bytes, &parameters))
                .await??;

        Ok(EnrichedResult {
            image_base64: encode_image_payload(&encoded),
            png_info,
        })
    }
}
