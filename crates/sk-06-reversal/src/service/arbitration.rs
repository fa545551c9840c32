//! # Arbitration Desk
//!
//! Disputes, arbitration cases, signed verdicts, appeal chains.

use crate::domain::arbitration::{
    AppealChainView, AppealRef, ArbitrationCase, CaseView, VerdictCore, VERDICT_SCHEMA_VERSION,
};
use crate::domain::dispute::{Dispute, OpenDisputeInput};
use crate::domain::errors::ReversalError;
use dashmap::DashMap;
use serde_json::{json, Value};
use sk_02_envelope::{AgentKeyDirectory, EnvelopeSignature, KeyRegistry};
use sk_03_event_ledger::{subject, EventLedger};
use sk_05_settlement::{evidence_request_hashes, SettlementEngine};
use sk_types::{CaseStatus, DisputeStatus, RunStatus};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Dispute and arbitration service.
pub struct ArbitrationDesk {
    engine: Arc<SettlementEngine>,
    ledger: Arc<EventLedger>,
    registry: Arc<dyn KeyRegistry>,
    directory: Arc<dyn AgentKeyDirectory>,
    disputes: DashMap<(String, String), Dispute>,
    cases: DashMap<(String, String), ArbitrationCase>,
}

impl ArbitrationDesk {
    /// Wire the desk over its collaborators.
    pub fn new(
        engine: Arc<SettlementEngine>,
        ledger: Arc<EventLedger>,
        registry: Arc<dyn KeyRegistry>,
        directory: Arc<dyn AgentKeyDirectory>,
    ) -> Self {
        Self {
            engine,
            ledger,
            registry,
            directory,
            disputes: DashMap::new(),
            cases: DashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // disputes
    // ------------------------------------------------------------------

    /// Open a dispute against a run; the run (and the named gate, if any)
    /// moves to `disputed`.
    pub fn open_dispute(
        &self,
        tenant_id: &str,
        run_id: &str,
        input: OpenDisputeInput,
        ts: u64,
    ) -> Result<Dispute, ReversalError> {
        self.ledger.get_run(tenant_id, run_id)?;
        if let Some(gate_id) = &input.settlement_gate_id {
            self.engine.mark_disputed(tenant_id, gate_id)?;
        }
        self.ledger
            .set_run_status(tenant_id, run_id, RunStatus::Disputed)?;

        let dispute = Dispute {
            dispute_id: format!("dsp_{}", Uuid::new_v4().simple()),
            tenant_id: tenant_id.to_string(),
            run_id: run_id.to_string(),
            opened_by: input.opened_by,
            settlement_gate_id: input.settlement_gate_id,
            status: DisputeStatus::Open,
            evidence_refs: input.evidence_refs,
            dispute_type: input.dispute_type,
            dispute_priority: input.dispute_priority,
            dispute_channel: input.dispute_channel,
            escalation_level: input.escalation_level,
            opened_at_ms: ts,
            closed_at_ms: None,
        };
        self.ledger.append_event(
            tenant_id,
            &subject::run(run_id),
            None,
            "dispute_opened",
            json!({ "disputeId": dispute.dispute_id, "openedBy": dispute.opened_by }),
            ts,
        )?;
        self.disputes.insert(
            (tenant_id.to_string(), dispute.dispute_id.clone()),
            dispute.clone(),
        );
        info!(tenant_id, run_id, dispute_id = %dispute.dispute_id, "dispute opened");
        Ok(dispute)
    }

    /// Close a dispute. When the dispute names a settlement bound to a
    /// request hash, the close must present matching request evidence.
    pub fn close_dispute(
        &self,
        tenant_id: &str,
        dispute_id: &str,
        evidence_refs: &[String],
        ts: u64,
    ) -> Result<Dispute, ReversalError> {
        let mut dispute = self.dispute(tenant_id, dispute_id)?;
        if dispute.status == DisputeStatus::Closed {
            return Err(ReversalError::DisputeClosed {
                dispute_id: dispute_id.to_string(),
            });
        }
        self.check_settlement_binding(
            tenant_id,
            dispute.settlement_gate_id.as_deref(),
            evidence_refs,
            ReversalError::DisputeCloseEvidenceRequired,
            ReversalError::DisputeCloseEvidenceMismatch,
        )?;

        dispute.status = DisputeStatus::Closed;
        dispute.closed_at_ms = Some(ts);
        self.ledger.append_event(
            tenant_id,
            &subject::run(&dispute.run_id),
            None,
            "dispute_closed",
            json!({ "disputeId": dispute.dispute_id }),
            ts,
        )?;
        self.disputes.insert(
            (tenant_id.to_string(), dispute_id.to_string()),
            dispute.clone(),
        );
        Ok(dispute)
    }

    // ------------------------------------------------------------------
    // arbitration cases
    // ------------------------------------------------------------------

    /// Open an arbitration case over an open dispute.
    pub fn open_case(
        &self,
        tenant_id: &str,
        dispute_id: &str,
        arbiter_agent_id: &str,
        ts: u64,
    ) -> Result<ArbitrationCase, ReversalError> {
        let dispute = self.dispute(tenant_id, dispute_id)?;
        if dispute.status == DisputeStatus::Closed {
            return Err(ReversalError::DisputeClosed {
                dispute_id: dispute_id.to_string(),
            });
        }
        let case = ArbitrationCase {
            case_id: format!("arb_{}", Uuid::new_v4().simple()),
            tenant_id: tenant_id.to_string(),
            run_id: dispute.run_id.clone(),
            dispute_id: dispute_id.to_string(),
            settlement_gate_id: dispute.settlement_gate_id.clone(),
            arbiter_agent_id: arbiter_agent_id.to_string(),
            status: CaseStatus::UnderReview,
            verdict: None,
            appeal_ref: None,
            child_case_ids: Vec::new(),
            opened_at_ms: ts,
        };
        self.ledger.append_event(
            tenant_id,
            &subject::arbitration_case(&case.case_id),
            None,
            "arbitration_opened",
            json!({ "caseId": case.case_id, "disputeId": dispute_id, "arbiter": arbiter_agent_id }),
            ts,
        )?;
        self.cases
            .insert((tenant_id.to_string(), case.case_id.clone()), case.clone());
        info!(tenant_id, case_id = %case.case_id, "arbitration case opened");
        Ok(case)
    }

    /// Record an arbiter-signed verdict envelope against a case and apply
    /// its release rate to a still-escrowed settlement.
    pub fn issue_verdict(
        &self,
        tenant_id: &str,
        case_id: &str,
        verdict_envelope: &Value,
        ts: u64,
    ) -> Result<ArbitrationCase, ReversalError> {
        let mut case = self.case(tenant_id, case_id)?;
        if case.status != CaseStatus::UnderReview {
            return Err(ReversalError::CaseStateInvalid {
                op: "arbitration.verdict".to_string(),
                case_id: case_id.to_string(),
            });
        }

        // Signer must be the assigned arbiter before anything else.
        let signer: EnvelopeSignature = verdict_envelope
            .get("signature")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or(ReversalError::ArbiterMismatch)?;
        if !self
            .directory
            .key_belongs_to(tenant_id, &case.arbiter_agent_id, &signer.key_id)
        {
            return Err(ReversalError::ArbiterMismatch);
        }

        let core_value = sk_02_envelope::open(
            verdict_envelope,
            "verdictHash",
            self.registry.as_ref(),
            tenant_id,
            true,
        )?;
        let core: VerdictCore = serde_json::from_value(core_value).map_err(|e| {
            ReversalError::VerdictInvalid {
                reason: e.to_string(),
            }
        })?;
        if core.schema_version != VERDICT_SCHEMA_VERSION {
            return Err(ReversalError::VerdictInvalid {
                reason: format!("unsupported schemaVersion {}", core.schema_version),
            });
        }
        if core.case_id != case.case_id {
            return Err(ReversalError::VerdictInvalid {
                reason: "verdict does not name this case".to_string(),
            });
        }
        if core.release_rate_pct > 100 {
            return Err(ReversalError::VerdictInvalid {
                reason: format!("releaseRatePct {} out of range", core.release_rate_pct),
            });
        }
        self.check_settlement_binding(
            tenant_id,
            case.settlement_gate_id.as_deref(),
            &core.evidence_refs,
            ReversalError::BindingEvidenceRequired,
            ReversalError::BindingEvidenceMismatch,
        )?;

        let appended = self.ledger.append_event(
            tenant_id,
            &subject::arbitration_case(case_id),
            None,
            "verdict_issued",
            json!({
                "caseId": case_id,
                "verdictId": core.verdict_id,
                "outcome": core.outcome,
                "releaseRatePct": core.release_rate_pct,
            }),
            ts,
        )?;
        if let Some(gate_id) = &case.settlement_gate_id {
            self.engine.apply_verdict_release(
                tenant_id,
                gate_id,
                core.release_rate_pct,
                &appended.last_chain_hash,
                ts,
            )?;
        }

        case.status = CaseStatus::VerdictIssued;
        case.verdict = Some(verdict_envelope.clone());
        self.cases
            .insert((tenant_id.to_string(), case_id.to_string()), case.clone());
        info!(tenant_id, case_id, "verdict issued");
        Ok(case)
    }

    /// Close a case after its verdict.
    pub fn close_case(
        &self,
        tenant_id: &str,
        case_id: &str,
        ts: u64,
    ) -> Result<ArbitrationCase, ReversalError> {
        let mut case = self.case(tenant_id, case_id)?;
        match case.status {
            CaseStatus::VerdictIssued => {}
            CaseStatus::UnderReview => {
                return Err(ReversalError::VerdictRequired {
                    case_id: case_id.to_string(),
                })
            }
            CaseStatus::Closed => {
                return Err(ReversalError::CaseStateInvalid {
                    op: "arbitration.close".to_string(),
                    case_id: case_id.to_string(),
                })
            }
        }
        case.status = CaseStatus::Closed;
        self.ledger.append_event(
            tenant_id,
            &subject::arbitration_case(case_id),
            None,
            "case_closed",
            json!({ "caseId": case_id }),
            ts,
        )?;
        self.cases
            .insert((tenant_id.to_string(), case_id.to_string()), case.clone());
        Ok(case)
    }

    /// Open an appeal case against a terminal case. Binding evidence must
    /// match the parent's settlement request hash.
    pub fn open_appeal(
        &self,
        tenant_id: &str,
        parent_case_id: &str,
        arbiter_agent_id: &str,
        evidence_refs: &[String],
        ts: u64,
    ) -> Result<ArbitrationCase, ReversalError> {
        let mut parent = self.case(tenant_id, parent_case_id)?;
        let actionability = parent.actionability();
        if !actionability.can_open_appeal {
            return Err(ReversalError::AppealNotAllowed {
                reason: format!(
                    "case {parent_case_id} is not appealable (status {:?}, {} appeals)",
                    parent.status,
                    parent.child_case_ids.len()
                ),
            });
        }
        self.check_settlement_binding(
            tenant_id,
            parent.settlement_gate_id.as_deref(),
            evidence_refs,
            ReversalError::BindingEvidenceRequired,
            ReversalError::BindingEvidenceMismatch,
        )?;

        let case = ArbitrationCase {
            case_id: format!("arb_{}", Uuid::new_v4().simple()),
            tenant_id: tenant_id.to_string(),
            run_id: parent.run_id.clone(),
            dispute_id: parent.dispute_id.clone(),
            settlement_gate_id: parent.settlement_gate_id.clone(),
            arbiter_agent_id: arbiter_agent_id.to_string(),
            status: CaseStatus::UnderReview,
            verdict: None,
            appeal_ref: Some(AppealRef {
                parent_case_id: parent_case_id.to_string(),
            }),
            child_case_ids: Vec::new(),
            opened_at_ms: ts,
        };
        self.ledger.append_event(
            tenant_id,
            &subject::arbitration_case(&case.case_id),
            None,
            "appeal_opened",
            json!({ "caseId": case.case_id, "parentCaseId": parent_case_id }),
            ts,
        )?;

        parent.child_case_ids.push(case.case_id.clone());
        self.cases.insert(
            (tenant_id.to_string(), parent_case_id.to_string()),
            parent,
        );
        self.cases
            .insert((tenant_id.to_string(), case.case_id.clone()), case.clone());
        info!(tenant_id, case_id = %case.case_id, parent_case_id, "appeal opened");
        Ok(case)
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    /// Fetch a dispute.
    pub fn dispute(&self, tenant_id: &str, dispute_id: &str) -> Result<Dispute, ReversalError> {
        self.disputes
            .get(&(tenant_id.to_string(), dispute_id.to_string()))
            .map(|d| d.clone())
            .ok_or_else(|| ReversalError::DisputeNotFound {
                dispute_id: dispute_id.to_string(),
            })
    }

    /// Fetch a case.
    pub fn case(&self, tenant_id: &str, case_id: &str) -> Result<ArbitrationCase, ReversalError> {
        self.cases
            .get(&(tenant_id.to_string(), case_id.to_string()))
            .map(|c| c.clone())
            .ok_or_else(|| ReversalError::CaseNotFound {
                case_id: case_id.to_string(),
            })
    }

    /// Operator workspace projection of a case.
    pub fn case_view(&self, tenant_id: &str, case_id: &str) -> Result<CaseView, ReversalError> {
        let case = self.case(tenant_id, case_id)?;
        Ok(CaseView {
            appeal_chain: AppealChainView {
                parent_case_id: case.appeal_ref.as_ref().map(|r| r.parent_case_id.clone()),
                child_case_ids: case.child_case_ids.clone(),
            },
            actionability: case.actionability(),
            case,
        })
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    /// When the settlement is bound to a request hash, the presented
    /// evidence must name it.
    fn check_settlement_binding(
        &self,
        tenant_id: &str,
        gate_id: Option<&str>,
        evidence_refs: &[String],
        required: ReversalError,
        mismatch: ReversalError,
    ) -> Result<(), ReversalError> {
        let Some(gate_id) = gate_id else {
            return Ok(());
        };
        let gate = self.engine.gate(tenant_id, gate_id)?;
        let Some(bound) = &gate.request_sha256 else {
            return Ok(());
        };
        let presented = evidence_request_hashes(evidence_refs);
        if presented.is_empty() {
            return Err(required);
        }
        if !presented.iter().any(|h| *h == bound.as_str()) {
            return Err(mismatch);
        }
        Ok(())
    }
}
