//! Billing plans and per-period usage counters.

use crate::domain::errors::PolicyError;
use serde::{Deserialize, Serialize};
use sk_types::{Cents, MilliCents};

/// Included quotas and overage pricing for one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPlan {
    /// Plan identifier (`free`, `scale`, …).
    pub plan_id: String,
    /// When set, a breached quota rejects the transition with a 402
    /// instead of accruing overage.
    pub hard_limit_enforced: bool,
    /// Included verified runs per period.
    pub included_verified_runs: u64,
    /// Included settled volume per period.
    pub included_settled_volume_cents: Cents,
    /// Included arbitration cases per period.
    pub included_arbitration_cases: u64,
    /// Overage price per verified run, in milli-cents.
    pub overage_per_verified_run_milli_cents: MilliCents,
    /// Overage price per settled cent, in milli-cents per 100 cents.
    pub overage_per_100_settled_cents_milli_cents: MilliCents,
    /// Overage price per arbitration case, in milli-cents.
    pub overage_per_arbitration_case_milli_cents: MilliCents,
}

impl BillingPlan {
    /// Unmetered plan used when billing is disabled.
    pub fn unmetered() -> Self {
        Self {
            plan_id: "unmetered".to_string(),
            hard_limit_enforced: false,
            included_verified_runs: u64::MAX,
            included_settled_volume_cents: u64::MAX,
            included_arbitration_cases: u64::MAX,
            overage_per_verified_run_milli_cents: 0,
            overage_per_100_settled_cents_milli_cents: 0,
            overage_per_arbitration_case_milli_cents: 0,
        }
    }
}

/// Counters for one (tenant, period).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingUsage {
    /// Verified runs this period.
    pub verified_runs: u64,
    /// Settled volume this period.
    pub settled_volume_cents: Cents,
    /// Arbitration cases opened this period.
    pub arbitration_cases: u64,
}

/// Overage owed beyond the included quotas, in milli-cents (stored in
/// milli-cents so rounding happens once, at invoicing).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverageCharge {
    /// Total overage in milli-cents.
    pub total_milli_cents: MilliCents,
    /// Floored cent figure for display.
    pub total_cents: Cents,
}

/// Counter kinds for limit diagnostics.
#[derive(Debug, Clone, Copy)]
pub enum BillableCounter {
    /// A verify transition completed.
    VerifiedRun,
    /// Settled volume moved, in cents.
    SettledVolume(Cents),
    /// An arbitration case opened.
    ArbitrationCase,
}

/// Apply a billable event to `usage`, enforcing hard limits.
pub fn apply_billable(
    plan: &BillingPlan,
    usage: &mut BillingUsage,
    counter: BillableCounter,
) -> Result<(), PolicyError> {
    match counter {
        BillableCounter::VerifiedRun => {
            if plan.hard_limit_enforced && usage.verified_runs + 1 > plan.included_verified_runs {
                return Err(PolicyError::BillingLimitExceeded {
                    counter: "verifiedRuns".to_string(),
                });
            }
            usage.verified_runs += 1;
        }
        BillableCounter::SettledVolume(cents) => {
            if plan.hard_limit_enforced
                && usage.settled_volume_cents + cents > plan.included_settled_volume_cents
            {
                return Err(PolicyError::BillingLimitExceeded {
                    counter: "settledVolumeCents".to_string(),
                });
            }
            usage.settled_volume_cents += cents;
        }
        BillableCounter::ArbitrationCase => {
            if plan.hard_limit_enforced
                && usage.arbitration_cases + 1 > plan.included_arbitration_cases
            {
                return Err(PolicyError::BillingLimitExceeded {
                    counter: "arbitrationCases".to_string(),
                });
            }
            usage.arbitration_cases += 1;
        }
    }
    Ok(())
}

/// Price the usage beyond the plan's included quotas.
pub fn overage_charge(plan: &BillingPlan, usage: &BillingUsage) -> OverageCharge {
    let extra_runs = usage.verified_runs.saturating_sub(plan.included_verified_runs);
    let extra_volume = usage
        .settled_volume_cents
        .saturating_sub(plan.included_settled_volume_cents);
    let extra_cases = usage
        .arbitration_cases
        .saturating_sub(plan.included_arbitration_cases);

    let total_milli_cents = extra_runs * plan.overage_per_verified_run_milli_cents
        + (extra_volume / 100) * plan.overage_per_100_settled_cents_milli_cents
        + extra_cases * plan.overage_per_arbitration_case_milli_cents;

    OverageCharge {
        total_milli_cents,
        total_cents: total_milli_cents / 1000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metered_plan() -> BillingPlan {
        BillingPlan {
            plan_id: "scale".into(),
            hard_limit_enforced: true,
            included_verified_runs: 2,
            included_settled_volume_cents: 1000,
            included_arbitration_cases: 1,
            overage_per_verified_run_milli_cents: 2500,
            overage_per_100_settled_cents_milli_cents: 150,
            overage_per_arbitration_case_milli_cents: 50_000,
        }
    }

    #[test]
    fn hard_limit_rejects_with_402_semantics() {
        let plan = metered_plan();
        let mut usage = BillingUsage::default();
        apply_billable(&plan, &mut usage, BillableCounter::VerifiedRun).unwrap();
        apply_billable(&plan, &mut usage, BillableCounter::VerifiedRun).unwrap();

        let err = apply_billable(&plan, &mut usage, BillableCounter::VerifiedRun).unwrap_err();
        assert_eq!(err.code(), "BILLING_PLAN_LIMIT_EXCEEDED");
        assert_eq!(err.http_status(), 402);
        // Counter unchanged on rejection.
        assert_eq!(usage.verified_runs, 2);
    }

    #[test]
    fn soft_limit_accrues_overage() {
        let plan = BillingPlan {
            hard_limit_enforced: false,
            ..metered_plan()
        };
        let mut usage = BillingUsage::default();
        for _ in 0..4 {
            apply_billable(&plan, &mut usage, BillableCounter::VerifiedRun).unwrap();
        }
        apply_billable(&plan, &mut usage, BillableCounter::SettledVolume(1500)).unwrap();

        let charge = overage_charge(&plan, &usage);
        // 2 extra runs * 2500 + 5 * 150 blocks of settled volume overage
        assert_eq!(charge.total_milli_cents, 2 * 2500 + 5 * 150);
        assert_eq!(charge.total_cents, charge.total_milli_cents / 1000);
    }

    #[test]
    fn unmetered_plan_never_limits() {
        let plan = BillingPlan::unmetered();
        let mut usage = BillingUsage::default();
        for _ in 0..100 {
            apply_billable(&plan, &mut usage, BillableCounter::VerifiedRun).unwrap();
        }
        assert_eq!(overage_charge(&plan, &usage), OverageCharge::default());
    }
}
