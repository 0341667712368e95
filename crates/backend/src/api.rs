//! REST API client for the backend HTTP endpoints.
//!
//! Wraps the backend's liveness, generation and image-info endpoints
//! using [`reqwest`]. No retries happen at this layer; callers decide
//! how to react to failures.

use serde::Deserialize;

use distillery_core::payload::png_data_uri;

/// Path of the text-to-image generation endpoint.
pub const GENERATE_PATH: &str = "/generate";

/// Path of the endpoint that reports the parameters embedded in an image.
pub const IMAGE_INFO_PATH: &str = "/image-info";

/// HTTP client for a single backend instance.
#[derive(Debug, Clone)]
pub struct BackendApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response body of [`GENERATE_PATH`].
#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    /// Base64-encoded images; absent or `null` when nothing was produced.
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// Response body of [`IMAGE_INFO_PATH`].
#[derive(Debug, Default, Deserialize)]
pub struct ImageInfoResponse {
    /// Generation parameters as free-form text.
    #[serde(default)]
    pub info: Option<String>,
}

/// Errors from the backend REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum BackendApiError {
    /// The HTTP request itself failed (connect, timeout, body decode, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A required field was missing or `null` in the response body.
    #[error("Backend response is missing the `{0}` field")]
    MissingField(&'static str),
}

impl BackendApi {
    /// Create a new API client for a backend instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:7860`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (shares the connection pool and the configured request timeout).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Base HTTP URL of the backend.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Plain `GET /` liveness check. Succeeds on any 2xx status.
    pub async fn liveness(&self) -> Result<(), BackendApiError> {
        let response = self.client.get(&self.api_url).send().await?;
        Self::check_status(response).await
    }

    /// Submit a generation request.
    ///
    /// Sends `POST /generate` with `request` as the JSON body and returns
    /// the produced images (empty when the response has no `images`).
    pub async fn generate(
        &self,
        request: &serde_json::Value,
    ) -> Result<Vec<String>, BackendApiError> {
        let response = self
            .client
            .post(format!("{}{GENERATE_PATH}", self.api_url))
            .json(request)
            .send()
            .await?;

        let body: GenerateResponse = Self::parse_response(response).await?;
        Ok(body.images.unwrap_or_default())
    }

    /// Ask the backend which generation parameters produced an image.
    ///
    /// Sends `POST /image-info` with the image wrapped in a PNG data URI
    /// and returns the `info` text.
    pub async fn image_info(&self, image_base64: &str) -> Result<String, BackendApiError> {
        let body = serde_json::json!({
            "image": png_data_uri(image_base64),
        });

        let response = self
            .client
            .post(format!("{}{IMAGE_INFO_PATH}", self.api_url))
            .json(&body)
            .send()
            .await?;

        let body: ImageInfoResponse = Self::parse_response(response).await?;
        body.info.ok_or(BackendApiError::MissingField("info"))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`BackendApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BackendApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), BackendApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
