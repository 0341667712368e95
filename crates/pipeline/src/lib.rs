//! Generation batch pipeline.
//!
//! [`fan_out::FanOutPipeline`] makes sure the backend is up, submits a
//! generation request, and fans the produced images out to
//! [`enricher::ImageEnricher`] with bounded concurrency.
//! [`handler::handle`] adapts a dispatcher task event onto it.

pub mod enricher;
pub mod fan_out;
pub mod handler;
