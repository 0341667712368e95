#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use distillery_backend::lifecycle::{BackendLifecycle, StartupError};
use distillery_backend::port::BackendAddress;
use distillery_core::payload::{decode_image_payload, encode_image_payload};
use distillery_pipeline::fan_out::{FanOutPipeline, PipelineConfig};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Base64 PNG of a solid `width`x`height` image.
pub fn png_base64(width: u32, height: u32) -> String {
    let img = RgbaImage::from_pixel(width, height, Rgba([40, 80, 120, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    encode_image_payload(&buf)
}

/// Metadata text the fake backend reports for an image of the given size.
pub fn info_for(width: u32, height: u32) -> String {
    format!("a lighthouse at dusk\nSteps: 1, Sampler: Euler a, Size: {width}x{height}")
}

/// Shared state of the fake backend, observable from tests.
#[derive(Clone, Default)]
pub struct FakeServer {
    pub images: Arc<Vec<String>>,
    pub info_delay: Duration,
    pub generate_calls: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl FakeServer {
    pub fn with_images(images: Vec<String>) -> Self {
        Self {
            images: Arc::new(images),
            ..Default::default()
        }
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Serve the fake on an ephemeral local port.
    pub async fn serve(&self) -> BackendAddress {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/generate", post(generate))
            .route("/image-info", post(image_info))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        BackendAddress::new("127.0.0.1", port)
    }
}

async fn generate(State(server): State<FakeServer>, Json(_request): Json<Value>) -> Json<Value> {
    server.generate_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "images": server.images.as_slice() }))
}

/// Reports the decoded image size, so each answer is tied to its image.
async fn image_info(
    State(server): State<FakeServer>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let now = server.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    server.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(server.info_delay).await;
    server.in_flight.fetch_sub(1, Ordering::SeqCst);

    let payload = body["image"].as_str().ok_or(StatusCode::BAD_REQUEST)?;
    if !payload.starts_with("data:image/png;base64,") {
        return Err(StatusCode::BAD_REQUEST);
    }
    let bytes = decode_image_payload(payload).map_err(|_| StatusCode::BAD_REQUEST)?;
    let img = image::load_from_memory(&bytes).map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    Ok(Json(json!({ "info": info_for(img.width(), img.height()) })))
}

/// In-process stand-in for the backend supervisor.
pub struct FakeBackend {
    address: BackendAddress,
    fail_start: bool,
    pub starts: AtomicUsize,
    pub terminations: AtomicUsize,
}

impl FakeBackend {
    pub fn at(address: BackendAddress) -> Self {
        Self {
            address,
            fail_start: false,
            starts: AtomicUsize::new(0),
            terminations: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::at(BackendAddress::new("127.0.0.1", 1))
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

impl BackendLifecycle for FakeBackend {
    async fn ensure_started(&self) -> Result<BackendAddress, StartupError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(StartupError::ReadinessTimeout {
                attempts: 3,
                elapsed_ms: 3_000,
            });
        }
        Ok(self.address.clone())
    }

    async fn terminate(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn pipeline(backend: Arc<FakeBackend>, config: PipelineConfig) -> FanOutPipeline<FakeBackend> {
    FanOutPipeline::new(backend, reqwest::Client::new(), config)
}

pub fn teardown() -> PipelineConfig {
    PipelineConfig {
        terminate_after_batch: true,
        ..Default::default()
    }
}
