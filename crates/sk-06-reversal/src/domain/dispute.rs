//! Dispute records.

use serde::{Deserialize, Serialize};
use sk_types::entities::{AgentId, DisputeId, GateId, RunId, TenantId};
use sk_types::DisputeStatus;

/// A dispute opened against a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispute {
    /// Dispute identifier.
    pub dispute_id: DisputeId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Disputed run.
    pub run_id: RunId,
    /// Agent who opened the dispute.
    pub opened_by: AgentId,
    /// Settlement gate under dispute, when one is named.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_gate_id: Option<GateId>,
    /// Lifecycle.
    pub status: DisputeStatus,
    /// Evidence presented at open.
    pub evidence_refs: Vec<String>,
    /// Free-form classification (`quality`, `non_delivery`, …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_type: Option<String>,
    /// Priority label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_priority: Option<String>,
    /// Intake channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_channel: Option<String>,
    /// Escalation level at open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_level: Option<u32>,
    /// Open time, unix milliseconds.
    pub opened_at_ms: u64,
    /// Close time, unix milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at_ms: Option<u64>,
}

/// Inputs to `dispute.open`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDisputeInput {
    /// Agent opening the dispute.
    pub opened_by: AgentId,
    /// Settlement gate under dispute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_gate_id: Option<GateId>,
    /// Evidence refs.
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    /// Classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_type: Option<String>,
    /// Priority label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_priority: Option<String>,
    /// Intake channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_channel: Option<String>,
    /// Escalation level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_level: Option<u32>,
}
