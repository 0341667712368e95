//! Supervisor and HTTP client for the image-generation backend.
//!
//! Provides the REST wrapper for the backend's generation and
//! image-info endpoints, local port discovery, the readiness probe and
//! its bounded wait loop, and [`process::BackendProcess`], which owns
//! the single backend subprocess of a worker.

pub mod api;
pub mod lifecycle;
pub mod port;
pub mod process;
pub mod readiness;
