//! Release policy: per-colour auto-release rules.

use serde::{Deserialize, Serialize};
use sk_types::VerificationStatus;

/// Whether verification completes on its own or parks for an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Colour rules apply immediately.
    Automatic,
    /// Every verification parks in `verifying` until an operator decides.
    Manual,
}

/// Rule for one verification colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColourRule {
    /// Release without an operator decision.
    pub auto_release: bool,
    /// Percentage of escrow released to the payee, `0..=100`.
    pub release_rate_pct: u32,
}

/// Policy attached to a verify call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePolicy {
    /// Automatic or manual.
    pub mode: PolicyMode,
    /// Rule for green verifications.
    pub green: ColourRule,
    /// Rule for amber verifications.
    pub amber: ColourRule,
    /// Rule for red verifications.
    pub red: ColourRule,
}

impl Default for ReleasePolicy {
    /// Green releases in full, red refunds in full, amber parks.
    fn default() -> Self {
        Self {
            mode: PolicyMode::Automatic,
            green: ColourRule {
                auto_release: true,
                release_rate_pct: 100,
            },
            amber: ColourRule {
                auto_release: false,
                release_rate_pct: 0,
            },
            red: ColourRule {
                auto_release: true,
                release_rate_pct: 0,
            },
        }
    }
}

impl ReleasePolicy {
    /// The rule for a colour.
    pub fn rule_for(&self, status: VerificationStatus) -> ColourRule {
        match status {
            VerificationStatus::Green => self.green,
            VerificationStatus::Amber => self.amber,
            VerificationStatus::Red => self.red,
        }
    }

    /// Every rate must lie in `0..=100`.
    pub fn validate(&self) -> Result<(), u32> {
        for rule in [self.green, self.amber, self.red] {
            if rule.release_rate_pct > 100 {
                return Err(rule.release_rate_pct);
            }
        }
        Ok(())
    }
}
