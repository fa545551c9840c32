//! # kernel-telemetry
//!
//! Tracing bootstrap for the Settlement Kernel.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SK_LOG_LEVEL` | `info` | Log level filter (`EnvFilter` syntax) |
//! | `SK_LOG_JSON` | unset | Any value switches to JSON output |
//!
//! The kernel logs to stdout; shipping to an aggregation stack is a
//! deployment concern behind the same subscriber seam.

#![warn(missing_docs)]

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::init_telemetry;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
