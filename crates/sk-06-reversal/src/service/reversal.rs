//! # Reversal Command Processor
//!
//! Verifies a signed `X402ReversalCommand.v1`, binds it to the stored
//! settlement, gates it through wallet policy and applies the effect.
//! Every effect appends to the gate's chained reversal stream.

use crate::domain::command::{ReversalCommand, ReversalRequest};
use crate::domain::errors::ReversalError;
use dashmap::DashMap;
use serde_json::{json, Value};
use sk_02_envelope::{AgentKeyDirectory, EnvelopeSignature, KeyRegistry};
use sk_03_event_ledger::{subject, EventLedger, LedgerEvent};
use sk_05_settlement::evidence_request_hashes;
use sk_05_settlement::{SettlementEngine, SettlementError};
use sk_08_policy::PolicyGatekeeper;
use sk_crypto::verify_hash_hex;
use sk_types::{GateStatus, ReversalAction};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
struct CommandRecord {
    payload_hash: String,
    outcome: Value,
}

/// Processes payer-signed reversal commands.
pub struct ReversalProcessor {
    engine: Arc<SettlementEngine>,
    ledger: Arc<EventLedger>,
    registry: Arc<dyn KeyRegistry>,
    directory: Arc<dyn AgentKeyDirectory>,
    gatekeeper: Arc<PolicyGatekeeper>,
    commands: DashMap<(String, String), CommandRecord>,
}

impl ReversalProcessor {
    /// Wire the processor over its collaborators.
    pub fn new(
        engine: Arc<SettlementEngine>,
        ledger: Arc<EventLedger>,
        registry: Arc<dyn KeyRegistry>,
        directory: Arc<dyn AgentKeyDirectory>,
        gatekeeper: Arc<PolicyGatekeeper>,
    ) -> Self {
        Self {
            engine,
            ledger,
            registry,
            directory,
            gatekeeper,
            commands: DashMap::new(),
        }
    }

    /// Process a reversal request. `now_ms` drives the expiry check; `ts`
    /// stamps the resulting events.
    pub fn process(
        &self,
        tenant_id: &str,
        request: &ReversalRequest,
        now_ms: u64,
        ts: u64,
    ) -> Result<Value, ReversalError> {
        let command = &request.command;
        let payload_hash = command.payload_hash()?;

        // Replay pinning: same command id must carry the same payload.
        let key = (tenant_id.to_string(), command.command_id.clone());
        if let Some(record) = self.commands.get(&key) {
            if record.payload_hash == payload_hash {
                return Ok(record.outcome.clone());
            }
            return Err(ReversalError::CommandPayloadHashMismatch {
                command_id: command.command_id.clone(),
            });
        }

        if command.exp <= now_ms {
            return Err(ReversalError::CommandExpired { exp: command.exp });
        }

        let gate = self.engine.gate(tenant_id, &command.target.gate_id)?;
        let policy = self.gatekeeper.policy_for(tenant_id, &gate.payer_agent_id);

        // Signature by the named key; optionally pinned to the payer.
        let public_key = self
            .registry
            .lookup(tenant_id, &command.agent_key_id)
            .ok_or_else(|| ReversalError::CommandSignatureInvalid {
                reason: format!("unknown key {}", command.agent_key_id),
            })?;
        if !verify_hash_hex(&payload_hash, &command.signature_base64, &public_key) {
            return Err(ReversalError::CommandSignatureInvalid {
                reason: "signature does not verify over the payload hash".to_string(),
            });
        }
        if policy.require_agent_key_match
            && !self
                .directory
                .key_belongs_to(tenant_id, &gate.payer_agent_id, &command.agent_key_id)
        {
            return Err(ReversalError::CommandKeyNotPayer {
                key_id: command.agent_key_id.clone(),
            });
        }

        self.check_target_binding(&gate, command)?;
        policy.check_reversal_action(command.action)?;

        if matches!(
            command.action,
            ReversalAction::RequestRefund | ReversalAction::ResolveRefund
        ) {
            self.check_binding_evidence(&gate, &request.evidence_refs, &policy)?;
        }

        let (gate, event, receipt) = match command.action {
            ReversalAction::VoidAuthorization => self.apply_void(tenant_id, command, ts)?,
            ReversalAction::RequestRefund => self.apply_request_refund(tenant_id, command, ts)?,
            ReversalAction::ResolveRefund => {
                self.apply_resolve_refund(tenant_id, request, ts)?
            }
        };

        let outcome = json!({
            "commandId": command.command_id,
            "action": command.action,
            "gateId": gate.gate_id,
            "gateStatus": gate.status,
            "receiptId": gate.receipt_id,
            "payloadHash": payload_hash,
            "event": {
                "eventId": event.event_id,
                "type": event.event_type,
                "chainHash": event.chain_hash,
                "prevChainHash": event.prev_chain_hash,
            },
            "receipt": receipt,
        });
        self.commands.insert(
            key,
            CommandRecord {
                payload_hash,
                outcome: outcome.clone(),
            },
        );
        info!(tenant_id, command_id = %command.command_id, action = ?command.action, "reversal applied");
        Ok(outcome)
    }

    /// Chained reversal events of a gate, oldest first.
    pub fn list_events(&self, tenant_id: &str, gate_id: &str) -> Vec<LedgerEvent> {
        self.ledger
            .list_events(tenant_id, &subject::gate_reversals(gate_id))
    }

    /// One reversal event by id.
    pub fn get_event(
        &self,
        tenant_id: &str,
        gate_id: &str,
        event_id: &str,
    ) -> Result<LedgerEvent, ReversalError> {
        Ok(self
            .ledger
            .get_event(tenant_id, &subject::gate_reversals(gate_id), event_id)?)
    }

    // ------------------------------------------------------------------
    // binding checks
    // ------------------------------------------------------------------

    fn check_target_binding(
        &self,
        gate: &sk_05_settlement::SettlementGate,
        command: &ReversalCommand,
    ) -> Result<(), ReversalError> {
        if let Some(receipt_id) = &gate.receipt_id {
            if receipt_id != &command.target.receipt_id {
                return Err(ReversalError::TargetMismatch {
                    reason: format!(
                        "receiptId {} does not match settled receipt {receipt_id}",
                        command.target.receipt_id
                    ),
                });
            }
        }
        if let (Some(quote_id), Some(gate_quote)) = (&command.target.quote_id, &gate.quote_id) {
            if quote_id != gate_quote {
                return Err(ReversalError::TargetMismatch {
                    reason: format!("quoteId {quote_id} does not match settled quote {gate_quote}"),
                });
            }
        }
        if let (Some(request_hash), Some(bound)) =
            (&command.target.request_sha256, &gate.request_sha256)
        {
            if request_hash != bound {
                return Err(ReversalError::TargetMismatch {
                    reason: "requestSha256 does not match the bound request hash".to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_binding_evidence(
        &self,
        gate: &sk_05_settlement::SettlementGate,
        evidence_refs: &[String],
        policy: &sk_08_policy::WalletPolicy,
    ) -> Result<(), ReversalError> {
        match &gate.request_sha256 {
            Some(bound) => {
                let presented = evidence_request_hashes(evidence_refs);
                if presented.is_empty() {
                    return Err(ReversalError::BindingEvidenceRequired);
                }
                if !presented.iter().any(|h| *h == bound.as_str()) {
                    return Err(ReversalError::BindingEvidenceMismatch);
                }
                Ok(())
            }
            // No bound request hash: only strict-binding policies insist.
            None if policy.require_strict_request_binding => {
                Err(ReversalError::BindingEvidenceRequired)
            }
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // effects
    // ------------------------------------------------------------------

    fn apply_void(
        &self,
        tenant_id: &str,
        command: &ReversalCommand,
        ts: u64,
    ) -> Result<(sk_05_settlement::SettlementGate, LedgerEvent, Option<Value>), ReversalError>
    {
        let gate = self.engine.gate(tenant_id, &command.target.gate_id)?;
        if !matches!(gate.status, GateStatus::Created | GateStatus::Authorized) {
            return Err(ReversalError::Settlement(
                SettlementError::InvalidTransition {
                    op: "void_authorization".to_string(),
                    status: gate.status,
                },
            ));
        }
        let appended = self.ledger.append_event(
            tenant_id,
            &subject::gate_reversals(&gate.gate_id),
            None,
            "authorization_voided",
            json!({ "commandId": command.command_id, "gateId": gate.gate_id }),
            ts,
        )?;
        let (gate, receipt) =
            self.engine
                .void_gate(tenant_id, &command.target.gate_id, &appended.last_chain_hash, ts)?;
        Ok((gate, appended.event, receipt))
    }

    fn apply_request_refund(
        &self,
        tenant_id: &str,
        command: &ReversalCommand,
        ts: u64,
    ) -> Result<(sk_05_settlement::SettlementGate, LedgerEvent, Option<Value>), ReversalError>
    {
        let gate = self.engine.gate(tenant_id, &command.target.gate_id)?;
        if !matches!(
            gate.status,
            GateStatus::Released | GateStatus::PartiallyReleased
        ) {
            return Err(ReversalError::Settlement(
                SettlementError::InvalidTransition {
                    op: "request_refund".to_string(),
                    status: gate.status,
                },
            ));
        }
        let appended = self.ledger.append_event(
            tenant_id,
            &subject::gate_reversals(&gate.gate_id),
            None,
            "refund_requested",
            json!({ "commandId": command.command_id, "gateId": gate.gate_id }),
            ts,
        )?;
        let gate = self.engine.begin_refund(tenant_id, &command.target.gate_id)?;
        Ok((gate, appended.event, None))
    }

    fn apply_resolve_refund(
        &self,
        tenant_id: &str,
        request: &ReversalRequest,
        ts: u64,
    ) -> Result<(sk_05_settlement::SettlementGate, LedgerEvent, Option<Value>), ReversalError>
    {
        let command = &request.command;
        let gate = self.engine.gate(tenant_id, &command.target.gate_id)?;
        if gate.status != GateStatus::RefundPending {
            return Err(ReversalError::Settlement(
                SettlementError::InvalidTransition {
                    op: "resolve_refund".to_string(),
                    status: gate.status,
                },
            ));
        }

        let decision_envelope = request
            .provider_decision
            .as_ref()
            .ok_or(ReversalError::ProviderDecisionRequired)?;
        let decision = self.check_provider_decision(tenant_id, &gate, decision_envelope)?;

        let appended = self.ledger.append_event(
            tenant_id,
            &subject::gate_reversals(&gate.gate_id),
            None,
            "refund_resolved",
            json!({
                "commandId": command.command_id,
                "gateId": gate.gate_id,
                "decision": decision,
            }),
            ts,
        )?;

        let (gate, receipt) = if decision == "accepted" {
            self.engine.resolve_refund_accepted(
                tenant_id,
                &command.target.gate_id,
                &appended.last_chain_hash,
                ts,
            )?
        } else {
            (
                self.engine
                    .resolve_refund_declined(tenant_id, &command.target.gate_id)?,
                None,
            )
        };
        Ok((gate, appended.event, receipt))
    }

    /// The decision artifact is sealed under `decisionHash`, signed by a
    /// payee key, and must name this gate.
    fn check_provider_decision(
        &self,
        tenant_id: &str,
        gate: &sk_05_settlement::SettlementGate,
        envelope: &Value,
    ) -> Result<String, ReversalError> {
        let signer: EnvelopeSignature = envelope
            .get("signature")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or(ReversalError::ProviderDecisionRequired)?;
        if !self
            .directory
            .key_belongs_to(tenant_id, &gate.payee_agent_id, &signer.key_id)
        {
            return Err(ReversalError::ProviderDecisionInvalid {
                reason: format!("key {} is not registered for the payee", signer.key_id),
            });
        }

        let core = sk_02_envelope::open(
            envelope,
            "decisionHash",
            self.registry.as_ref(),
            tenant_id,
            true,
        )?;
        if core.get("gateId").and_then(Value::as_str) != Some(gate.gate_id.as_str()) {
            return Err(ReversalError::ProviderDecisionInvalid {
                reason: "decision does not name this gate".to_string(),
            });
        }
        match core.get("decision").and_then(Value::as_str) {
            Some(d @ ("accepted" | "declined")) => Ok(d.to_string()),
            other => Err(ReversalError::ProviderDecisionInvalid {
                reason: format!("unsupported decision {other:?}"),
            }),
        }
    }
}
