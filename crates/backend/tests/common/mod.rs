#![allow(dead_code)]

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use distillery_backend::port::BackendAddress;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral local port and return its address.
pub async fn serve(router: Router) -> BackendAddress {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    BackendAddress::new("127.0.0.1", port)
}

/// A port nothing is listening on (bound once, then released).
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Fake backend that is live and answers `/generate` with `body`.
pub fn generating(body: serde_json::Value) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/generate",
            post(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        )
}

/// Fake backend whose root answers 503 while `/generate` works.
pub fn loading() -> Router {
    Router::new()
        .route("/", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route(
            "/generate",
            post(|| async { Json(serde_json::json!({ "images": ["aW1n"] })) }),
        )
}
