//! Batch orchestration: start backend, generate, enrich in parallel.
//!
//! One call to [`FanOutPipeline::deliver`] is one batch. Images are
//! enriched concurrently up to [`PipelineConfig::max_concurrency`] and
//! collected in submission order. The first failing image aborts the
//! batch; there is no partial-success mode.
//!
//! Backend state across batches:
//!
//! ```text
//! NOT_STARTED -> STARTING -> READY --(terminate_after_batch)--> NOT_STARTED
//!                              \--(default)--> READY (reused by next batch)
//! ```

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use uuid::Uuid;

use distillery_backend::api::{BackendApi, BackendApiError};
use distillery_backend::lifecycle::{BackendLifecycle, StartupError};
use distillery_core::types::{EnrichedResult, GenerationRequest};

use crate::enricher::{EnrichmentError, ImageEnricher};

/// Default cap on concurrent enrichment tasks per batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Batch-level policy.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Kill the backend after every batch, successful or not.
    pub terminate_after_batch: bool,
    /// Upper bound on images enriched at the same time (at least 1).
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            terminate_after_batch: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Errors that abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Backend startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("Generation request failed: {0}")]
    Generation(#[source] BackendApiError),

    #[error("Enrichment of image {index} failed: {source}")]
    Enrichment {
        /// Position of the image in the backend's response.
        index: usize,
        #[source]
        source: EnrichmentError,
    },
}

/// Runs generation batches against one supervised backend.
#[derive(Debug)]
pub struct FanOutPipeline<B> {
    backend: Arc<B>,
    client: reqwest::Client,
    config: PipelineConfig,
}

impl<B: BackendLifecycle> FanOutPipeline<B> {
    pub fn new(backend: Arc<B>, client: reqwest::Client, config: PipelineConfig) -> Self {
        Self {
            backend,
            client,
            config,
        }
    }

    /// The supervised backend, e.g. for shutdown handling.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Run one batch and return one [`EnrichedResult`] per generated image.
    ///
    /// With `terminate_after_batch` set, the backend is terminated on
    /// every exit path, including startup and generation failures.
    pub async fn deliver(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<EnrichedResult>, PipelineError> {
        let batch_id = Uuid::now_v7();
        let result = self.run_batch(batch_id, request).await;

        if let Err(e) = &result {
            tracing::error!(%batch_id, error = %e, "Batch failed");
        }

        if self.config.terminate_after_batch {
            tracing::info!(%batch_id, "Terminating backend after batch");
            self.backend.terminate().await;
        }

        result
    }

    async fn run_batch(
        &self,
        batch_id: Uuid,
        request: &GenerationRequest,
    ) -> Result<Vec<EnrichedResult>, PipelineError> {
        let address = self.backend.ensure_started().await?;
        let api = BackendApi::with_client(self.client.clone(), address.base_url());

        let images = api
            .generate(request)
            .await
            .map_err(PipelineError::Generation)?;

        tracing::info!(%batch_id, image_count = images.len(), "Generation complete");

        if images.is_empty() {
            return Ok(Vec::new());
        }

        let concurrency = self.config.max_concurrency.clamp(1, images.len());
        let enricher = ImageEnricher::new(api);
        let enricher = &enricher;

        let results: Vec<EnrichedResult> = stream::iter(images.iter().enumerate())
            .map(move |(index, image)| async move {
                enricher
                    .enrich(image)
                    .await
                    .map_err(|source| PipelineError::Enrichment { index, source })
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        tracing::info!(%batch_id, concurrency, "Batch enriched");
        Ok(results)
    }
}
