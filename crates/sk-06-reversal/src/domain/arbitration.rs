//! Arbitration cases, verdict cores and appeal chains.
//!
//! Appeal chains are parent-pointer only; the forward child lookup is an
//! index materialized on case creation, so there are no in-memory cycles.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sk_types::entities::{
    AgentId, CaseId, DisputeId, GateId, RunId, TenantId, VerdictId,
};
use sk_types::CaseStatus;

/// Schema tag for verdict envelopes.
pub const VERDICT_SCHEMA_VERSION: &str = "ArbitrationVerdict.v1";

/// Upward pointer from an appeal case to the case it appeals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealRef {
    /// The appealed case.
    pub parent_case_id: CaseId,
}

/// An arbitration case over a dispute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrationCase {
    /// Case identifier.
    pub case_id: CaseId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Run under arbitration.
    pub run_id: RunId,
    /// Dispute this case arbitrates.
    pub dispute_id: DisputeId,
    /// Settlement gate the dispute names, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_gate_id: Option<GateId>,
    /// Assigned arbiter.
    pub arbiter_agent_id: AgentId,
    /// Lifecycle.
    pub status: CaseStatus,
    /// The sealed verdict envelope once issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Value>,
    /// Present on appeal cases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appeal_ref: Option<AppealRef>,
    /// Materialized forward index of appeals filed against this case.
    pub child_case_ids: Vec<CaseId>,
    /// Open time, unix milliseconds.
    pub opened_at_ms: u64,
}

/// `ArbitrationVerdict.v1` core, sealed under `verdictHash` and signed by
/// the arbiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictCore {
    /// Schema tag.
    pub schema_version: String,
    /// Verdict identifier.
    pub verdict_id: VerdictId,
    /// Case the verdict decides.
    pub case_id: CaseId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Run under arbitration.
    pub run_id: RunId,
    /// Settlement gate the verdict applies to, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_id: Option<GateId>,
    /// Dispute the case arbitrates.
    pub dispute_id: DisputeId,
    /// Issuing arbiter.
    pub arbiter_agent_id: AgentId,
    /// Outcome label (`accepted`, `rejected`, `partial`).
    pub outcome: String,
    /// Release rate applied to escrow still held, `0..=100`.
    pub release_rate_pct: u32,
    /// Arbiter's reasoning.
    pub rationale: String,
    /// Binding evidence.
    pub evidence_refs: Vec<String>,
    /// RFC-3339 issue time.
    pub issued_at: String,
    /// Present when this verdict decides an appeal case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appeal_ref: Option<AppealRef>,
}

/// Operator-workspace projection of a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseView {
    /// The case record.
    pub case: ArbitrationCase,
    /// Appeal chain summary.
    pub appeal_chain: AppealChainView,
    /// What an operator can do next.
    pub actionability: Actionability,
}

/// Appeal chain summary for the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealChainView {
    /// Parent case, when this case is an appeal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_case_id: Option<CaseId>,
    /// Appeals filed against this case.
    pub child_case_ids: Vec<CaseId>,
}

/// Next-action flags for a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actionability {
    /// A verdict may be issued.
    pub can_issue_verdict: bool,
    /// The case may be closed.
    pub can_close: bool,
    /// An appeal may be opened against it.
    pub can_open_appeal: bool,
}

impl ArbitrationCase {
    /// Compute the workspace flags for this case.
    pub fn actionability(&self) -> Actionability {
        let terminal = matches!(self.status, CaseStatus::VerdictIssued | CaseStatus::Closed);
        Actionability {
            can_issue_verdict: self.status == CaseStatus::UnderReview,
            can_close: self.status == CaseStatus::VerdictIssued,
            can_open_appeal: terminal && self.child_case_ids.is_empty(),
        }
    }
}
