//! Shared types and pure helpers for the distillery worker.
//!
//! Holds the wire types exchanged with the task dispatcher, base64
//! payload handling, and PNG `parameters` metadata embedding. Nothing
//! in this crate performs network or process I/O.

pub mod error;
pub mod payload;
pub mod png_metadata;
pub mod types;
