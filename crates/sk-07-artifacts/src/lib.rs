//! # sk-07-artifacts
//!
//! Canonically hashed, signature-bound artifact bundles and the
//! conformance harness that cross-checks them.
//!
//! ## Artifact Family
//!
//! | Envelope | Hash Field |
//! |----------|-----------|
//! | `JobProof.v1` | `proofHash` |
//! | `MonthProof.v1` | `proofHash` |
//! | `FinancePack.v1` | `packHash` |
//! | `SessionTranscript.v1` | `transcriptHash` |
//! | `SessionReplayPack.v1` | `packHash` |
//! | `ConformanceRunReport.v1` | `reportHash` |
//! | `ConformanceCertBundle.v1` | `certHash` |
//!
//! Reports and cert bundles cross-reference each other; strict validation
//! recomputes every hash and enumerates every broken pairing.

#![warn(missing_docs)]

pub mod adapters;
pub mod domain;
pub mod service;

pub use adapters::subprocess::{run_adapter, AdapterConfig, AdapterRun};
pub use domain::conformance::{
    cert_core, report_core, validate_cert_pairing, CaseResult, ConformanceCase, ReportSummary,
    CERT_SCHEMA_VERSION, REPORT_SCHEMA_VERSION,
};
pub use domain::errors::ArtifactError;
pub use domain::federation::{FederationEnvelopeKind, TrustAnchor, TrustRegistry};
pub use domain::proofs::ArtifactBuilder;
pub use service::ConformanceHarness;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
