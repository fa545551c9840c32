//! # sk-tests
//!
//! Unified test suite for the Settlement Kernel.
//!
//! ## Test Categories
//!
//! 1. **Scenarios**: the literal end-to-end flows (happy release, void,
//!    refund, CAS conflict, idempotent replay, arbitration appeal)
//! 2. **Properties**: cross-subsystem invariants (conservation, chain
//!    validity, artifact determinism)

pub mod integration;
