//! # sk-08-policy
//!
//! Policy gatekeeper: wallet policies, billing plans, daily counters.
//!
//! ## Enforcement Matrix
//!
//! | Check | Enforced At |
//! |-------|-------------|
//! | `maxAmountCents`, allow-lists, delegation depth | authorize-payment |
//! | `maxDailyAuthorizationCents` | authorize-payment (per UTC day) |
//! | `requireQuote`, `requireStrictRequestBinding` | verify |
//! | `allowedReversalActions` | reversal commands |
//! | Billing hard limits | transitions that emit billable events |
//!
//! Policies are per-(tenant, agent); a missing policy is the permissive
//! default. Billing counters are per-(tenant, UTC month).

#![warn(missing_docs)]

pub mod domain;
pub mod service;

pub use domain::billing::{BillableCounter, BillingPlan, BillingUsage, OverageCharge};
pub use domain::errors::PolicyError;
pub use domain::wallet_policy::{WalletPolicy, WALLET_POLICY_SCHEMA_VERSION};
pub use service::PolicyGatekeeper;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
