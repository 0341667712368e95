//! Long-running worker process for the distillery pipeline.
//!
//! Reads dispatcher task events as JSON lines on stdin, runs each one
//! through [`distillery_pipeline::fan_out::FanOutPipeline`] and writes one
//! JSON response line per task to stdout. Logs go to stderr.

pub mod config;
pub mod dispatch;
