//! # sk-09-gateway
//!
//! The orchestrator: every external operation passes through one request
//! boundary.
//!
//! ## Request Pipeline
//!
//! 1. tenant identification (`TENANT_REQUIRED`)
//! 2. body normalization (`SCHEMA_INVALID` with the offending path)
//! 3. idempotency probe (replay returns the stored response verbatim)
//! 4. ops-token scope check (`OPS_TOKEN_REQUIRED` / `OPS_SCOPE_DENIED`)
//! 5. per-tenant concurrency permit (`TENANT_CONCURRENCY_LIMIT`, 503)
//! 6. per-subject exclusive lock
//! 7. dispatch to the subsystem services
//! 8. persist the idempotent response, emit the observability span
//!
//! The HTTP framing itself is a transport concern; operations arrive here
//! as `OperationRequest` values with the protocol headers already lifted.

#![warn(missing_docs)]

pub mod config;
pub mod directory;
pub mod request;
pub mod router;
pub mod service;
pub mod tokens;

pub use config::KernelConfig;
pub use directory::AgentDirectory;
pub use request::{OperationRequest, RequestHeaders};
pub use service::SettlementKernel;
pub use tokens::{required_scope, OpsTokenRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
