//! Observability for keeldb
//!
//! Structured, synchronous logging only. No metrics, no buffering.

mod logger;

pub use logger::{Logger, Severity};
