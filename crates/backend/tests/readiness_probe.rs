//! Integration tests for the HTTP readiness probe against a fake backend.

mod common;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use distillery_backend::readiness::{HttpReadinessProbe, ReadinessProbe};
use serde_json::json;

async fn probe(router: Router) -> bool {
    let address = common::serve(router).await;
    HttpReadinessProbe::default()
        .is_ready(&address.base_url())
        .await
}

#[tokio::test]
async fn ready_when_generation_returns_an_image() {
    assert!(probe(common::generating(json!({ "images": ["aW1n"] }))).await);
}

#[tokio::test]
async fn not_ready_when_images_empty() {
    assert!(!probe(common::generating(json!({ "images": [] }))).await);
}

#[tokio::test]
async fn not_ready_when_images_missing_despite_200() {
    assert!(!probe(common::generating(json!({ "info": "model loading" }))).await);
}

#[tokio::test]
async fn not_ready_when_images_null() {
    assert!(!probe(common::generating(json!({ "images": null }))).await);
}

#[tokio::test]
async fn not_ready_when_liveness_fails() {
    assert!(!probe(common::loading()).await);
}

#[tokio::test]
async fn not_ready_when_generation_errors() {
    let router = Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory") }),
        );
    assert!(!probe(router).await);
}

#[tokio::test]
async fn not_ready_when_generation_body_is_not_json() {
    let router = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/generate", post(|| async { "still loading" }));
    assert!(!probe(router).await);
}

#[tokio::test]
async fn not_ready_when_nothing_listens() {
    let port = common::unused_port().await;
    let ready = HttpReadinessProbe::default()
        .is_ready(&format!("http://127.0.0.1:{port}"))
        .await;
    assert!(!ready);
}
