//! # Money
//!
//! Durable state holds integer cents. Percentage math runs in milli-cents
//! and the milli-cent figure is stored alongside the cent figure so
//! reconciliation can detect drift.

use serde::{Deserialize, Serialize};

/// Non-negative integer cents.
pub type Cents = u64;

/// Non-negative integer milli-cents (1/1000 cent).
pub type MilliCents = u64;

/// Signed cent delta used by journal entries and conservation checks.
pub type CentsDelta = i64;

/// Outcome of splitting an escrowed amount at a release rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSplit {
    /// Cents released to the payee.
    pub released_cents: Cents,
    /// Cents refunded to the payer (the remainder).
    pub refunded_cents: Cents,
    /// Exact milli-cent release before the floor division.
    pub released_milli_cents: MilliCents,
}

/// Split `amount_cents` at `release_rate_pct` (must already be validated to
/// lie in `0..=100`).
///
/// `milli = amount * pct * 10`, floored to cents by dividing by 1000; the
/// remainder refunds. The milli-cent figure is exposed unfloored.
pub fn release_split(amount_cents: Cents, release_rate_pct: u32) -> ReleaseSplit {
    debug_assert!(release_rate_pct <= 100);
    let released_milli_cents = amount_cents * u64::from(release_rate_pct) * 10;
    let released_cents = released_milli_cents / 1000;
    ReleaseSplit {
        released_cents,
        refunded_cents: amount_cents - released_cents,
        released_milli_cents,
    }
}
