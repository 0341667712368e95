//! Integration tests for [`BackendApi`] against a fake backend.

mod common;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use distillery_backend::api::{BackendApi, BackendApiError};
use serde_json::{json, Value};

async fn api_for(router: Router) -> BackendApi {
    let address = common::serve(router).await;
    BackendApi::new(address.base_url())
}

#[tokio::test]
async fn generate_forwards_request_unmodified() {
    // Echo the request back as the single "image".
    let router = Router::new().route(
        "/generate",
        post(|Json(body): Json<Value>| async move {
            Json(json!({ "images": [body.to_string()] }))
        }),
    );
    let api = api_for(router).await;

    let request = json!({ "prompt": "a lighthouse", "steps": 20, "extra": { "k": [1, 2] } });
    let images = api.generate(&request).await.unwrap();

    assert_eq!(images.len(), 1);
    let echoed: Value = serde_json::from_str(&images[0]).unwrap();
    assert_eq!(echoed, request);
}

#[tokio::test]
async fn generate_without_images_is_empty() {
    let api = api_for(common::generating(json!({ "parameters": {} }))).await;
    assert!(api.generate(&json!({})).await.unwrap().is_empty());
}

#[tokio::test]
async fn generate_error_status_is_api_error() {
    let router = Router::new().route(
        "/generate",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let api = api_for(router).await;

    let err = api.generate(&json!({})).await.unwrap_err();
    assert_matches!(err, BackendApiError::ApiError { status: 500, ref body } if body == "boom");
}

#[tokio::test]
async fn image_info_sends_png_data_uri() {
    // Answer with the exact `image` field that was received.
    let router = Router::new().route(
        "/image-info",
        post(|Json(body): Json<Value>| async move {
            Json(json!({ "info": body["image"].as_str().unwrap_or_default() }))
        }),
    );
    let api = api_for(router).await;

    let info = api.image_info("aGVsbG8=").await.unwrap();
    assert_eq!(info, "data:image/png;base64,aGVsbG8=");
}

#[tokio::test]
async fn image_info_missing_field() {
    let router = Router::new().route(
        "/image-info",
        post(|| async { Json(json!({ "info": null, "items": {} })) }),
    );
    let api = api_for(router).await;

    let err = api.image_info("aGVsbG8=").await.unwrap_err();
    assert_matches!(err, BackendApiError::MissingField("info"));
}

#[tokio::test]
async fn liveness_rejects_error_status() {
    let api = api_for(Router::new()).await;
    let err = api.liveness().await.unwrap_err();
    assert_matches!(err, BackendApiError::ApiError { status: 404, .. });
}

#[tokio::test]
async fn liveness_accepts_ok() {
    let api = api_for(Router::new().route("/", get(|| async { "ok" }))).await;
    api.liveness().await.unwrap();
}

#[tokio::test]
async fn unreachable_backend_is_request_error() {
    let port = common::unused_port().await;
    let api = BackendApi::new(format!("http://127.0.0.1:{port}"));

    let err = api.generate(&json!({})).await.unwrap_err();
    assert_matches!(err, BackendApiError::Request(ref e) if e.is_connect());
}
