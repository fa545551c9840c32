//! # Settlement Engine
//!
//! Drives the gate state machine over the wallet ledger and the event
//! ledger. Transitions validate everything first, then append the ledger
//! event, then move funds bound to that event's chain hash; balances are
//! pre-checked so the movement cannot fail after the event is appended.

use crate::domain::binding::{
    evidence_request_hashes, verify_provider_signature, verify_quote_binding,
};
use crate::domain::entities::{CreateGateInput, SettlementGate, VerifyInput};
use crate::domain::errors::SettlementError;
use crate::domain::receipt::{
    DecisionRecord, ProviderSigReceiptBinding, QuoteReceiptBinding, ReceiptBindings, ReceiptCore,
    ReceiptIndexEntry, ReceiptStatus, SpendAuthorizationBinding, VerificationContext,
    RECEIPT_SCHEMA_VERSION,
};
use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{json, Value};
use sk_02_envelope::{open, seal, AgentKeyDirectory, KeyRegistry};
use sk_03_event_ledger::{subject, EventLedger};
use sk_04_wallet::WalletLedger;
use sk_crypto::SigningPair;
use sk_types::{release_split, GateStatus, VerificationStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Result of a completed (non-parked) verify.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    /// The gate after the transition.
    pub gate: SettlementGate,
    /// The sealed receipt envelope, absent when the gate parked in
    /// `verifying`.
    pub receipt: Option<Value>,
}

/// Settlement gate engine.
pub struct SettlementEngine {
    gates: DashMap<(String, String), SettlementGate>,
    receipt_cores: DashMap<(String, String), ReceiptCore>,
    receipt_envelopes: DashMap<(String, String), Value>,
    receipt_index: RwLock<HashMap<String, Vec<ReceiptIndexEntry>>>,
    used_quotes: DashMap<(String, String), String>,
    wallets: Arc<WalletLedger>,
    ledger: Arc<EventLedger>,
    registry: Arc<dyn KeyRegistry>,
    directory: Arc<dyn AgentKeyDirectory>,
    server_key: SigningPair,
}

impl SettlementEngine {
    /// Wire the engine over its collaborators.
    pub fn new(
        wallets: Arc<WalletLedger>,
        ledger: Arc<EventLedger>,
        registry: Arc<dyn KeyRegistry>,
        directory: Arc<dyn AgentKeyDirectory>,
        server_key: SigningPair,
    ) -> Self {
        Self {
            gates: DashMap::new(),
            receipt_cores: DashMap::new(),
            receipt_envelopes: DashMap::new(),
            receipt_index: RwLock::new(HashMap::new()),
            used_quotes: DashMap::new(),
            wallets,
            ledger,
            registry,
            directory,
            server_key,
        }
    }

    // ------------------------------------------------------------------
    // create
    // ------------------------------------------------------------------

    /// Create a gate. Allocates no funds.
    pub fn create_gate(
        &self,
        tenant_id: &str,
        input: CreateGateInput,
        ts: u64,
    ) -> Result<SettlementGate, SettlementError> {
        self.ledger.get_run(tenant_id, &input.run_id)?;
        let key = (tenant_id.to_string(), input.gate_id.clone());
        if self.gates.contains_key(&key) {
            return Err(SettlementError::GateExists {
                gate_id: input.gate_id,
            });
        }
        if let Some(passport) = &input.agent_passport {
            passport
                .validate()
                .map_err(|reason| SettlementError::PassportInvalid { reason })?;
        }

        let mut gate = SettlementGate {
            gate_id: input.gate_id.clone(),
            tenant_id: tenant_id.to_string(),
            run_id: input.run_id.clone(),
            payer_agent_id: input.payer_agent_id,
            payee_agent_id: input.payee_agent_id,
            amount_cents: input.amount_cents,
            currency: input.currency,
            tool_id: input.tool_id,
            provider_id: input.provider_id,
            agreement_id: input.agreement_id,
            status: GateStatus::Created,
            agent_passport: input.agent_passport,
            receipt_id: None,
            request_sha256: None,
            quote_id: None,
            released_cents: 0,
            refunded_cents: 0,
            decision_trace: vec!["gate created".to_string()],
            created_at_ms: ts,
        };

        self.ledger.append_event(
            tenant_id,
            &subject::run(&gate.run_id),
            None,
            "gate_created",
            json!({ "gateId": gate.gate_id, "amountCents": gate.amount_cents }),
            ts,
        )?;
        gate.decision_trace.push(format!(
            "escrow target {} {} for tool {}",
            gate.amount_cents, gate.currency, gate.tool_id
        ));
        self.gates.insert(key, gate.clone());
        debug!(tenant_id, gate_id = %gate.gate_id, "gate created");
        Ok(gate)
    }

    // ------------------------------------------------------------------
    // authorize-payment
    // ------------------------------------------------------------------

    /// Lock the gate amount from the payer's wallet into escrow.
    ///
    /// Sponsor-funded passports must present a signed issuer decision
    /// token sealed under `decisionHash`.
    pub fn authorize_payment(
        &self,
        tenant_id: &str,
        gate_id: &str,
        sponsor_decision_token: Option<&Value>,
        ts: u64,
    ) -> Result<SettlementGate, SettlementError> {
        let mut gate = self.gate(tenant_id, gate_id)?;
        if gate.status != GateStatus::Created {
            return Err(SettlementError::InvalidTransition {
                op: "authorize-payment".to_string(),
                status: gate.status,
            });
        }

        if let Some(sponsor_ref) = gate
            .agent_passport
            .as_ref()
            .and_then(|p| p.sponsor_wallet_ref.clone())
        {
            let token = sponsor_decision_token.ok_or(SettlementError::SponsorDecisionRequired)?;
            self.check_sponsor_token(tenant_id, &gate, &sponsor_ref, token)?;
            gate.decision_trace
                .push(format!("sponsor {sponsor_ref} approved the spend"));
        }

        // Pre-validate the wallet invariant before touching the ledger.
        let payer = self.wallets.get(tenant_id, &gate.payer_agent_id)?;
        if payer.currency != gate.currency {
            return Err(SettlementError::Wallet(
                sk_04_wallet::WalletError::CurrencyMismatch {
                    payer_currency: payer.currency,
                    payee_currency: gate.currency.clone(),
                },
            ));
        }
        if payer.available_cents < gate.amount_cents {
            return Err(SettlementError::Wallet(
                sk_04_wallet::WalletError::InsufficientFunds {
                    needed_cents: gate.amount_cents,
                    available_cents: payer.available_cents,
                },
            ));
        }

        let appended = self.ledger.append_event(
            tenant_id,
            &subject::run(&gate.run_id),
            None,
            "payment_authorized",
            json!({ "gateId": gate.gate_id, "amountCents": gate.amount_cents }),
            ts,
        )?;
        self.wallets.lock_escrow(
            tenant_id,
            &gate.payer_agent_id,
            gate.amount_cents,
            &appended.last_chain_hash,
            ts,
        )?;

        gate.status = GateStatus::Authorized;
        gate.decision_trace
            .push(format!("escrow locked {}", gate.amount_cents));
        self.put_gate(gate.clone());
        info!(tenant_id, gate_id, "payment authorized");
        Ok(gate)
    }

    // ------------------------------------------------------------------
    // verify
    // ------------------------------------------------------------------

    /// Verify a gate and release/refund per policy.
    pub fn verify(
        &self,
        tenant_id: &str,
        gate_id: &str,
        input: VerifyInput,
        ts: u64,
    ) -> Result<VerifyOutcome, SettlementError> {
        let mut gate = self.gate(tenant_id, gate_id)?;
        if !matches!(gate.status, GateStatus::Authorized | GateStatus::Verifying) {
            return Err(SettlementError::InvalidTransition {
                op: "verify".to_string(),
                status: gate.status,
            });
        }
        input
            .policy
            .validate()
            .map_err(|pct| SettlementError::ReleaseRateOutOfRange { pct })?;

        // Resolve the release rate: an operator decision completes a hold;
        // otherwise the colour rule applies, parking when it may not
        // auto-release.
        let rule = input.policy.rule_for(input.verification_status);
        let release_rate_pct = match input.operator_release_rate_pct {
            Some(pct) => {
                if pct > 100 {
                    return Err(SettlementError::ReleaseRateOutOfRange { pct });
                }
                pct
            }
            None => {
                let manual = matches!(input.policy.mode, crate::domain::policy::PolicyMode::Manual);
                if manual || !rule.auto_release {
                    gate.status = GateStatus::Verifying;
                    gate.decision_trace.push(format!(
                        "verification {} held for operator decision",
                        status_label(input.verification_status)
                    ));
                    self.ledger.append_event(
                        tenant_id,
                        &subject::run(&gate.run_id),
                        None,
                        "verification_held",
                        json!({ "gateId": gate.gate_id }),
                        ts,
                    )?;
                    self.put_gate(gate.clone());
                    return Ok(VerifyOutcome { gate, receipt: None });
                }
                rule.release_rate_pct
            }
        };

        // Bindings verify before any mutation.
        let provider_binding = match (&input.provider_signature, &input.provider_response) {
            (Some(signature), Some(response)) => Some(verify_provider_signature(
                tenant_id,
                &gate.payee_agent_id,
                response,
                signature,
                &input.evidence_refs,
                self.registry.as_ref(),
                self.directory.as_ref(),
            )?),
            (Some(_), None) => {
                return Err(SettlementError::ProviderSignatureInvalid {
                    reason: "providerSignature present without providerResponse".to_string(),
                })
            }
            _ => None,
        };

        let quote_binding = match &input.provider_quote_payload {
            Some(payload) => {
                let signature = input.provider_quote_signature.as_ref().ok_or_else(|| {
                    SettlementError::QuoteBindingMismatch {
                        reason: "providerQuotePayload present without providerQuoteSignature"
                            .to_string(),
                    }
                })?;
                let binding = verify_quote_binding(
                    tenant_id,
                    &gate.payee_agent_id,
                    payload,
                    input.quote_sha256.as_deref(),
                    signature,
                    gate.amount_cents,
                    &gate.currency,
                    &input.evidence_refs,
                    self.registry.as_ref(),
                    self.directory.as_ref(),
                )?;
                if let Some(prior_gate) = self
                    .used_quotes
                    .get(&(tenant_id.to_string(), binding.quote_id.clone()))
                {
                    if *prior_gate != gate.gate_id {
                        return Err(SettlementError::QuoteAlreadyUsed {
                            quote_id: binding.quote_id,
                        });
                    }
                }
                Some(binding)
            }
            None => None,
        };

        let split = release_split(gate.amount_cents, release_rate_pct);

        // Pre-check the escrow invariant.
        let payer = self.wallets.get(tenant_id, &gate.payer_agent_id)?;
        if payer.escrow_locked_cents < gate.amount_cents {
            return Err(SettlementError::Wallet(
                sk_04_wallet::WalletError::EscrowUnderflow {
                    needed_cents: gate.amount_cents,
                    locked_cents: payer.escrow_locked_cents,
                },
            ));
        }

        let (new_status, receipt_status, event_type) = if split.released_cents == gate.amount_cents
        {
            (GateStatus::Released, ReceiptStatus::Released, "settlement_released")
        } else if split.released_cents == 0 {
            (GateStatus::Refunded, ReceiptStatus::Refunded, "settlement_refunded")
        } else {
            (
                GateStatus::PartiallyReleased,
                ReceiptStatus::PartiallyReleased,
                "settlement_partially_released",
            )
        };

        let appended = self.ledger.append_event(
            tenant_id,
            &subject::run(&gate.run_id),
            None,
            event_type,
            json!({
                "gateId": gate.gate_id,
                "releasedCents": split.released_cents,
                "refundedCents": split.refunded_cents,
                "releaseRatePct": release_rate_pct,
            }),
            ts,
        )?;
        self.wallets.release_escrow(
            tenant_id,
            &gate.payer_agent_id,
            &gate.payee_agent_id,
            split.released_cents,
            split.refunded_cents,
            &appended.last_chain_hash,
            ts,
        )?;

        gate.status = new_status;
        gate.released_cents = split.released_cents;
        gate.refunded_cents = split.refunded_cents;
        gate.quote_id = quote_binding.as_ref().map(|b| b.quote_id.clone());
        gate.request_sha256 = quote_binding
            .as_ref()
            .map(|b| b.request_binding_sha256.clone())
            .or_else(|| {
                evidence_request_hashes(&input.evidence_refs)
                    .first()
                    .map(|h| h.to_string())
            });
        gate.decision_trace.push(format!(
            "verified {} at {}%: released {} refunded {}",
            status_label(input.verification_status),
            release_rate_pct,
            split.released_cents,
            split.refunded_cents
        ));

        let receipt_id = format!("rcp_{}", Uuid::new_v4().simple());
        let core = ReceiptCore {
            schema_version: RECEIPT_SCHEMA_VERSION.to_string(),
            receipt_id: receipt_id.clone(),
            tenant_id: tenant_id.to_string(),
            gate_id: gate.gate_id.clone(),
            run_id: gate.run_id.clone(),
            payer_agent_id: gate.payer_agent_id.clone(),
            payee_agent_id: gate.payee_agent_id.clone(),
            tool_id: gate.tool_id.clone(),
            agreement_id: gate.agreement_id.clone(),
            amount_cents: gate.amount_cents,
            currency: gate.currency.clone(),
            status: receipt_status,
            bindings: ReceiptBindings {
                spend_authorization: gate.agent_passport.as_ref().map(|p| {
                    SpendAuthorizationBinding {
                        delegation_ref: p.delegation_ref.clone(),
                        effective_delegation_ref: p.effective_delegation_ref.clone(),
                        root_delegation_ref: p.root_delegation_ref.clone(),
                        delegation_depth: p.delegation_depth,
                        delegation_chain_length: p.delegation_chain_length,
                    }
                }),
                provider_sig: provider_binding.map(|b| ProviderSigReceiptBinding {
                    verified: true,
                    key_id: b.key_id,
                    jwk_thumbprint: b.jwk_thumbprint,
                    response_sha256: b.response_sha256,
                }),
                provider_quote_sig: quote_binding.as_ref().map(|b| QuoteReceiptBinding {
                    verified: true,
                    key_id: b.key_id.clone(),
                    jwk_thumbprint: b.jwk_thumbprint.clone(),
                    quote_id: b.quote_id.clone(),
                    quote_sha256: b.quote_sha256.clone(),
                    request_binding_sha256: b.request_binding_sha256.clone(),
                }),
            },
            verification_context: VerificationContext {
                verification_status: input.verification_status,
                verification_method: input.verification_method.clone(),
                evidence_refs: input.evidence_refs.clone(),
                policy: input.policy.clone(),
            },
            decision_record: DecisionRecord {
                release_rate_pct,
                released_cents: split.released_cents,
                refunded_cents: split.refunded_cents,
                released_milli_cents: split.released_milli_cents,
                decision_trace: gate.decision_trace.clone(),
            },
            issued_at: rfc3339(ts),
            issued_at_ms: ts,
        };
        let envelope = self.store_receipt(core)?;

        if let Some(binding) = &quote_binding {
            self.used_quotes.insert(
                (tenant_id.to_string(), binding.quote_id.clone()),
                gate.gate_id.clone(),
            );
        }
        gate.receipt_id = Some(receipt_id);
        self.put_gate(gate.clone());
        info!(tenant_id, gate_id, status = ?gate.status, "gate verified");
        Ok(VerifyOutcome {
            gate,
            receipt: Some(envelope),
        })
    }

    // ------------------------------------------------------------------
    // reversal-facing mutations (driven by the reversal subsystem)
    // ------------------------------------------------------------------

    /// Void an authorization: unlock escrow and close the gate. Legal only
    /// while the gate is `created` or `authorized`.
    pub fn void_gate(
        &self,
        tenant_id: &str,
        gate_id: &str,
        chain_hash: &str,
        ts: u64,
    ) -> Result<(SettlementGate, Option<Value>), SettlementError> {
        let mut gate = self.gate(tenant_id, gate_id)?;
        if !matches!(gate.status, GateStatus::Created | GateStatus::Authorized) {
            return Err(SettlementError::InvalidTransition {
                op: "void_authorization".to_string(),
                status: gate.status,
            });
        }
        if gate.status == GateStatus::Authorized {
            self.wallets.void_escrow(
                tenant_id,
                &gate.payer_agent_id,
                gate.amount_cents,
                chain_hash,
                ts,
            )?;
        }
        gate.status = GateStatus::Voided;
        gate.refunded_cents = gate.amount_cents;
        gate.decision_trace
            .push("authorization voided by reversal command".to_string());

        let receipt = self.issue_reversal_receipt(tenant_id, &mut gate, ReceiptStatus::Refunded, ts)?;
        self.put_gate(gate.clone());
        Ok((gate, Some(receipt)))
    }

    /// Move a released gate to `refund_pending`.
    pub fn begin_refund(
        &self,
        tenant_id: &str,
        gate_id: &str,
    ) -> Result<SettlementGate, SettlementError> {
        let mut gate = self.gate(tenant_id, gate_id)?;
        if !matches!(
            gate.status,
            GateStatus::Released | GateStatus::PartiallyReleased
        ) {
            return Err(SettlementError::InvalidTransition {
                op: "request_refund".to_string(),
                status: gate.status,
            });
        }
        gate.status = GateStatus::RefundPending;
        gate.decision_trace.push("refund requested".to_string());
        self.put_gate(gate.clone());
        Ok(gate)
    }

    /// Apply an accepted payee refund decision: claw the released funds
    /// back and reissue the receipt as refunded.
    pub fn resolve_refund_accepted(
        &self,
        tenant_id: &str,
        gate_id: &str,
        chain_hash: &str,
        ts: u64,
    ) -> Result<(SettlementGate, Option<Value>), SettlementError> {
        let mut gate = self.gate(tenant_id, gate_id)?;
        if gate.status != GateStatus::RefundPending {
            return Err(SettlementError::InvalidTransition {
                op: "resolve_refund".to_string(),
                status: gate.status,
            });
        }
        self.wallets.refund_released(
            tenant_id,
            &gate.payer_agent_id,
            &gate.payee_agent_id,
            gate.released_cents,
            chain_hash,
            ts,
        )?;
        gate.refunded_cents += gate.released_cents;
        gate.released_cents = 0;
        gate.status = GateStatus::Refunded;
        gate.decision_trace
            .push("refund accepted by payee; funds returned".to_string());

        let receipt = self.issue_reversal_receipt(tenant_id, &mut gate, ReceiptStatus::Refunded, ts)?;
        self.put_gate(gate.clone());
        Ok((gate, Some(receipt)))
    }

    /// Return a `refund_pending` gate to its released status (payee
    /// declined the refund).
    pub fn resolve_refund_declined(
        &self,
        tenant_id: &str,
        gate_id: &str,
    ) -> Result<SettlementGate, SettlementError> {
        let mut gate = self.gate(tenant_id, gate_id)?;
        if gate.status != GateStatus::RefundPending {
            return Err(SettlementError::InvalidTransition {
                op: "resolve_refund".to_string(),
                status: gate.status,
            });
        }
        gate.status = if gate.refunded_cents > 0 {
            GateStatus::PartiallyReleased
        } else {
            GateStatus::Released
        };
        gate.decision_trace
            .push("refund declined by payee".to_string());
        self.put_gate(gate.clone());
        Ok(gate)
    }

    /// Mark a gate disputed (dispute opened against its run).
    pub fn mark_disputed(
        &self,
        tenant_id: &str,
        gate_id: &str,
    ) -> Result<SettlementGate, SettlementError> {
        let mut gate = self.gate(tenant_id, gate_id)?;
        if !matches!(
            gate.status,
            GateStatus::Authorized | GateStatus::Released | GateStatus::PartiallyReleased
        ) {
            return Err(SettlementError::InvalidTransition {
                op: "dispute.open".to_string(),
                status: gate.status,
            });
        }
        gate.status = GateStatus::Disputed;
        gate.decision_trace.push("dispute opened".to_string());
        self.put_gate(gate.clone());
        Ok(gate)
    }

    /// Apply an arbitration verdict's release rate to a disputed gate whose
    /// escrow is still locked. Reuses the verify release arithmetic.
    pub fn apply_verdict_release(
        &self,
        tenant_id: &str,
        gate_id: &str,
        release_rate_pct: u32,
        chain_hash: &str,
        ts: u64,
    ) -> Result<SettlementGate, SettlementError> {
        if release_rate_pct > 100 {
            return Err(SettlementError::ReleaseRateOutOfRange {
                pct: release_rate_pct,
            });
        }
        let mut gate = self.gate(tenant_id, gate_id)?;
        if gate.status != GateStatus::Disputed {
            return Err(SettlementError::InvalidTransition {
                op: "arbitration.verdict".to_string(),
                status: gate.status,
            });
        }

        let payer = self.wallets.get(tenant_id, &gate.payer_agent_id)?;
        if payer.escrow_locked_cents >= gate.amount_cents {
            let split = release_split(gate.amount_cents, release_rate_pct);
            self.wallets.release_escrow(
                tenant_id,
                &gate.payer_agent_id,
                &gate.payee_agent_id,
                split.released_cents,
                split.refunded_cents,
                chain_hash,
                ts,
            )?;
            gate.released_cents = split.released_cents;
            gate.refunded_cents = split.refunded_cents;
            gate.status = if split.released_cents == gate.amount_cents {
                GateStatus::Released
            } else if split.released_cents == 0 {
                GateStatus::Refunded
            } else {
                GateStatus::PartiallyReleased
            };
            gate.decision_trace.push(format!(
                "arbitration verdict applied at {release_rate_pct}%"
            ));
        } else {
            // Funds already moved before the dispute; the verdict is
            // recorded without a wallet movement.
            gate.status = if gate.released_cents == 0 {
                GateStatus::Refunded
            } else if gate.refunded_cents == 0 {
                GateStatus::Released
            } else {
                GateStatus::PartiallyReleased
            };
            gate.decision_trace.push(format!(
                "arbitration verdict recorded at {release_rate_pct}% (funds already settled)"
            ));
        }
        self.put_gate(gate.clone());
        Ok(gate)
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    /// Fetch a gate.
    pub fn gate(&self, tenant_id: &str, gate_id: &str) -> Result<SettlementGate, SettlementError> {
        self.gates
            .get(&(tenant_id.to_string(), gate_id.to_string()))
            .map(|g| g.clone())
            .ok_or_else(|| SettlementError::GateNotFound {
                gate_id: gate_id.to_string(),
            })
    }

    /// Fetch a sealed receipt envelope.
    pub fn receipt_envelope(
        &self,
        tenant_id: &str,
        receipt_id: &str,
    ) -> Result<Value, SettlementError> {
        self.receipt_envelopes
            .get(&(tenant_id.to_string(), receipt_id.to_string()))
            .map(|v| v.clone())
            .ok_or_else(|| SettlementError::ReceiptNotFound {
                receipt_id: receipt_id.to_string(),
            })
    }

    /// The receipt core (typed) behind an envelope.
    pub fn receipt_core(
        &self,
        tenant_id: &str,
        receipt_id: &str,
    ) -> Result<ReceiptCore, SettlementError> {
        self.receipt_cores
            .get(&(tenant_id.to_string(), receipt_id.to_string()))
            .map(|c| c.clone())
            .ok_or_else(|| SettlementError::ReceiptNotFound {
                receipt_id: receipt_id.to_string(),
            })
    }

    /// Index entries for a tenant, ordered by `(issued_at_ms, receipt_id)`.
    pub fn receipt_index(&self, tenant_id: &str) -> Vec<ReceiptIndexEntry> {
        self.receipt_index
            .read()
            .get(tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn check_sponsor_token(
        &self,
        tenant_id: &str,
        gate: &SettlementGate,
        sponsor_ref: &str,
        token: &Value,
    ) -> Result<(), SettlementError> {
        let core = open(token, "decisionHash", self.registry.as_ref(), tenant_id, true)?;
        let approved = core.get("approved").and_then(Value::as_bool) == Some(true);
        let gate_match = core.get("gateId").and_then(Value::as_str) == Some(gate.gate_id.as_str());
        let sponsor_match =
            core.get("sponsorRef").and_then(Value::as_str) == Some(sponsor_ref);
        if !gate_match || !sponsor_match {
            return Err(SettlementError::SponsorDecisionRejected {
                reason: "decision token does not bind this gate and sponsor".to_string(),
            });
        }
        if !approved {
            return Err(SettlementError::SponsorDecisionRejected {
                reason: "issuer declined the spend".to_string(),
            });
        }
        Ok(())
    }

    fn issue_reversal_receipt(
        &self,
        tenant_id: &str,
        gate: &mut SettlementGate,
        status: ReceiptStatus,
        ts: u64,
    ) -> Result<Value, SettlementError> {
        match gate.receipt_id.clone() {
            // A receipt exists (released gate): reissue with the new status
            // and the extended decision trace under the same receipt id.
            Some(receipt_id) => {
                let mut core = self.receipt_core(tenant_id, &receipt_id)?;
                core.status = status;
                core.decision_record.decision_trace = gate.decision_trace.clone();
                core.decision_record.released_cents = gate.released_cents;
                core.decision_record.refunded_cents = gate.refunded_cents;
                self.store_receipt(core)
            }
            // No receipt yet (void before verify): issue a fresh one.
            None => {
                let receipt_id = format!("rcp_{}", Uuid::new_v4().simple());
                gate.receipt_id = Some(receipt_id.clone());
                let core = ReceiptCore {
                    schema_version: RECEIPT_SCHEMA_VERSION.to_string(),
                    receipt_id,
                    tenant_id: tenant_id.to_string(),
                    gate_id: gate.gate_id.clone(),
                    run_id: gate.run_id.clone(),
                    payer_agent_id: gate.payer_agent_id.clone(),
                    payee_agent_id: gate.payee_agent_id.clone(),
                    tool_id: gate.tool_id.clone(),
                    agreement_id: gate.agreement_id.clone(),
                    amount_cents: gate.amount_cents,
                    currency: gate.currency.clone(),
                    status,
                    bindings: ReceiptBindings {
                        spend_authorization: gate.agent_passport.as_ref().map(|p| {
                            SpendAuthorizationBinding {
                                delegation_ref: p.delegation_ref.clone(),
                                effective_delegation_ref: p.effective_delegation_ref.clone(),
                                root_delegation_ref: p.root_delegation_ref.clone(),
                                delegation_depth: p.delegation_depth,
                                delegation_chain_length: p.delegation_chain_length,
                            }
                        }),
                        provider_sig: None,
                        provider_quote_sig: None,
                    },
                    verification_context: VerificationContext {
                        verification_status: VerificationStatus::Red,
                        verification_method: Some("reversal".to_string()),
                        evidence_refs: Vec::new(),
                        policy: crate::domain::policy::ReleasePolicy::default(),
                    },
                    decision_record: DecisionRecord {
                        release_rate_pct: 0,
                        released_cents: 0,
                        refunded_cents: gate.refunded_cents,
                        released_milli_cents: 0,
                        decision_trace: gate.decision_trace.clone(),
                    },
                    issued_at: rfc3339(ts),
                    issued_at_ms: ts,
                };
                self.store_receipt(core)
            }
        }
    }

    fn store_receipt(&self, core: ReceiptCore) -> Result<Value, SettlementError> {
        let core_value = serde_json::to_value(&core).map_err(|e| {
            SettlementError::Envelope(sk_02_envelope::EnvelopeError::Signing(e.to_string()))
        })?;
        let envelope = seal(&core_value, "receiptHash", &self.server_key)?;

        let tenant_id = core.tenant_id.clone();
        let receipt_id = core.receipt_id.clone();
        let entry = ReceiptIndexEntry {
            issued_at_ms: core.issued_at_ms,
            receipt_id: receipt_id.clone(),
            gate_id: core.gate_id.clone(),
            run_id: core.run_id.clone(),
            tool_id: core.tool_id.clone(),
            agreement_id: core.agreement_id.clone(),
        };
        self.receipt_cores
            .insert((tenant_id.clone(), receipt_id.clone()), core);
        self.receipt_envelopes
            .insert((tenant_id.clone(), receipt_id.clone()), envelope.clone());

        let mut index = self.receipt_index.write();
        let entries = index.entry(tenant_id).or_default();
        match entries.iter().position(|e| e.receipt_id == entry.receipt_id) {
            Some(pos) => entries[pos] = entry, // Reissue keeps its position
            None => {
                let pos = entries
                    .binary_search_by(|e| {
                        (e.issued_at_ms, e.receipt_id.as_str())
                            .cmp(&(entry.issued_at_ms, entry.receipt_id.as_str()))
                    })
                    .unwrap_or_else(|p| p);
                entries.insert(pos, entry);
            }
        }
        Ok(envelope)
    }

    fn put_gate(&self, gate: SettlementGate) {
        self.gates
            .insert((gate.tenant_id.clone(), gate.gate_id.clone()), gate);
    }
}

fn status_label(status: VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Green => "green",
        VerificationStatus::Amber => "amber",
        VerificationStatus::Red => "red",
    }
}

fn rfc3339(ts_ms: u64) -> String {
    match Utc.timestamp_millis_opt(ts_ms as i64) {
        chrono::LocalResult::Single(dt) => dt.to_rfc3339(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AgentPassport, ProviderSignature};
    use crate::domain::policy::{ColourRule, PolicyMode, ReleasePolicy};
    use sk_01_canonical::hash_canonical;
    use sk_02_envelope::InMemoryKeyRegistry;
    use sk_03_event_ledger::InMemoryEventStore;

    struct Fixture {
        engine: SettlementEngine,
        wallets: Arc<WalletLedger>,
        ledger: Arc<EventLedger>,
        registry: Arc<InMemoryKeyRegistry>,
        payee_key: SigningPair,
    }

    fn fixture() -> Fixture {
        let wallets = Arc::new(WalletLedger::new());
        let ledger = Arc::new(EventLedger::new(Arc::new(InMemoryEventStore::new())));
        let registry = Arc::new(InMemoryKeyRegistry::new());
        let payee_key = SigningPair::generate();
        registry.register_for_agent("t1", "agt_E", payee_key.public_key());

        wallets.create_wallet("t1", "agt_P", "USD").unwrap();
        wallets.create_wallet("t1", "agt_E", "USD").unwrap();
        wallets.credit("t1", "agt_P", 5000, "h0", 1).unwrap();
        ledger.create_run("t1", "run_1").unwrap();

        let engine = SettlementEngine::new(
            Arc::clone(&wallets),
            Arc::clone(&ledger),
            registry.clone() as Arc<dyn KeyRegistry>,
            registry.clone() as Arc<dyn AgentKeyDirectory>,
            SigningPair::generate(),
        );
        Fixture {
            engine,
            wallets,
            ledger,
            registry,
            payee_key,
        }
    }

    fn gate_input(gate_id: &str, amount: u64) -> CreateGateInput {
        CreateGateInput {
            gate_id: gate_id.to_string(),
            run_id: "run_1".to_string(),
            payer_agent_id: "agt_P".to_string(),
            payee_agent_id: "agt_E".to_string(),
            amount_cents: amount,
            currency: "USD".to_string(),
            tool_id: "search".to_string(),
            provider_id: None,
            agreement_id: None,
            agent_passport: None,
        }
    }

    fn green_verify() -> VerifyInput {
        VerifyInput {
            verification_status: VerificationStatus::Green,
            policy: ReleasePolicy::default(),
            verification_method: Some("attestation".to_string()),
            evidence_refs: Vec::new(),
            provider_response: None,
            provider_signature: None,
            provider_quote_payload: None,
            quote_sha256: None,
            provider_quote_signature: None,
            operator_release_rate_pct: None,
        }
    }

    #[test]
    fn happy_release_full_cycle() {
        let fx = fixture();
        fx.engine.create_gate("t1", gate_input("g1", 500), 10).unwrap();
        fx.engine.authorize_payment("t1", "g1", None, 11).unwrap();

        let payer = fx.wallets.get("t1", "agt_P").unwrap();
        assert_eq!(payer.available_cents, 4500);
        assert_eq!(payer.escrow_locked_cents, 500);

        let outcome = fx.engine.verify("t1", "g1", green_verify(), 12).unwrap();
        assert_eq!(outcome.gate.status, GateStatus::Released);
        assert_eq!(fx.wallets.get("t1", "agt_E").unwrap().available_cents, 500);
        assert_eq!(fx.wallets.get("t1", "agt_P").unwrap().escrow_locked_cents, 0);

        let receipt = outcome.receipt.unwrap();
        assert_eq!(receipt["schemaVersion"], RECEIPT_SCHEMA_VERSION);
        assert_eq!(receipt["status"], "released");
        assert!(receipt["receiptHash"].is_string());

        // The run chain recorded every transition.
        fx.ledger.verify_chain("t1", &subject::run("run_1")).unwrap();
        let events: Vec<String> = fx
            .ledger
            .list_events("t1", &subject::run("run_1"))
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(events, vec!["gate_created", "payment_authorized", "settlement_released"]);
    }

    #[test]
    fn red_verify_refunds_everything() {
        let fx = fixture();
        fx.engine.create_gate("t1", gate_input("g1", 700), 10).unwrap();
        fx.engine.authorize_payment("t1", "g1", None, 11).unwrap();

        let mut input = green_verify();
        input.verification_status = VerificationStatus::Red;
        let outcome = fx.engine.verify("t1", "g1", input, 12).unwrap();
        assert_eq!(outcome.gate.status, GateStatus::Refunded);
        assert_eq!(fx.wallets.get("t1", "agt_P").unwrap().available_cents, 5000);
        assert_eq!(fx.wallets.get("t1", "agt_E").unwrap().available_cents, 0);
    }

    #[test]
    fn partial_release_uses_milli_cents() {
        let fx = fixture();
        fx.engine.create_gate("t1", gate_input("g1", 333), 10).unwrap();
        fx.engine.authorize_payment("t1", "g1", None, 11).unwrap();

        let mut input = green_verify();
        input.policy.green = ColourRule {
            auto_release: true,
            release_rate_pct: 33,
        };
        let outcome = fx.engine.verify("t1", "g1", input, 12).unwrap();
        assert_eq!(outcome.gate.status, GateStatus::PartiallyReleased);
        assert_eq!(outcome.gate.released_cents, 109);
        assert_eq!(outcome.gate.refunded_cents, 224);

        let receipt = outcome.receipt.unwrap();
        assert_eq!(receipt["decisionRecord"]["releasedMilliCents"], 109_890);
    }

    #[test]
    fn manual_policy_parks_then_operator_completes() {
        let fx = fixture();
        fx.engine.create_gate("t1", gate_input("g1", 500), 10).unwrap();
        fx.engine.authorize_payment("t1", "g1", None, 11).unwrap();

        let mut input = green_verify();
        input.policy.mode = PolicyMode::Manual;
        let held = fx.engine.verify("t1", "g1", input, 12).unwrap();
        assert_eq!(held.gate.status, GateStatus::Verifying);
        assert!(held.receipt.is_none());
        // Escrow untouched while parked.
        assert_eq!(fx.wallets.get("t1", "agt_P").unwrap().escrow_locked_cents, 500);

        let mut decide = green_verify();
        decide.operator_release_rate_pct = Some(100);
        let outcome = fx.engine.verify("t1", "g1", decide, 13).unwrap();
        assert_eq!(outcome.gate.status, GateStatus::Released);
    }

    #[test]
    fn provider_signature_binding_recorded_in_receipt() {
        let fx = fixture();
        fx.engine.create_gate("t1", gate_input("g1", 500), 10).unwrap();
        fx.engine.authorize_payment("t1", "g1", None, 11).unwrap();

        let response = serde_json::json!({ "result": "42" });
        let response_hash = hash_canonical(&response).unwrap();
        let mut input = green_verify();
        input.evidence_refs = vec![format!("http:response_sha256:{response_hash}")];
        input.provider_response = Some(response);
        input.provider_signature = Some(ProviderSignature {
            key_id: fx.payee_key.key_id(),
            signature_base64: fx.payee_key.sign_hash_hex(&response_hash).unwrap(),
        });

        let outcome = fx.engine.verify("t1", "g1", input, 12).unwrap();
        let receipt = outcome.receipt.unwrap();
        assert_eq!(receipt["bindings"]["providerSig"]["verified"], true);
        assert_eq!(
            receipt["bindings"]["providerSig"]["responseSha256"],
            serde_json::json!(response_hash)
        );
    }

    #[test]
    fn quote_binding_enforces_amount_and_uniqueness() {
        let fx = fixture();
        fx.engine.create_gate("t1", gate_input("g1", 500), 10).unwrap();
        fx.engine.authorize_payment("t1", "g1", None, 11).unwrap();

        let request_hash = sk_crypto::sha256_hex("request bytes");
        let quote = serde_json::json!({
            "quoteId": "q_1",
            "amountCents": 500,
            "currency": "USD",
            "requestBindingSha256": request_hash,
        });
        let quote_hash = hash_canonical(&quote).unwrap();
        let mut input = green_verify();
        input.evidence_refs = vec![format!("http:request_sha256:{request_hash}")];
        input.provider_quote_payload = Some(quote.clone());
        input.quote_sha256 = Some(quote_hash.clone());
        input.provider_quote_signature = Some(ProviderSignature {
            key_id: fx.payee_key.key_id(),
            signature_base64: fx.payee_key.sign_hash_hex(&quote_hash).unwrap(),
        });

        let outcome = fx.engine.verify("t1", "g1", input.clone(), 12).unwrap();
        assert_eq!(outcome.gate.quote_id.as_deref(), Some("q_1"));
        assert_eq!(outcome.gate.request_sha256.as_deref(), Some(request_hash.as_str()));

        // Same quote against a second gate is rejected.
        fx.engine.create_gate("t1", gate_input("g2", 500), 13).unwrap();
        fx.engine.authorize_payment("t1", "g2", None, 14).unwrap();
        let err = fx.engine.verify("t1", "g2", input, 15).unwrap_err();
        assert_eq!(err.code(), "QUOTE_BINDING_MISMATCH");
    }

    #[test]
    fn sponsor_passport_requires_decision_token() {
        let fx = fixture();
        let mut input = gate_input("g1", 500);
        input.agent_passport = Some(AgentPassport {
            sponsor_wallet_ref: Some("spw_1".to_string()),
            ..AgentPassport::default()
        });
        fx.engine.create_gate("t1", input, 10).unwrap();

        let err = fx.engine.authorize_payment("t1", "g1", None, 11).unwrap_err();
        assert_eq!(err.code(), "X402_WALLET_ISSUER_DECISION_REQUIRED");

        // A signed, binding decision token unlocks the authorization.
        let issuer = SigningPair::generate();
        fx.registry.register("t1", issuer.public_key());
        let token_core = serde_json::json!({
            "sponsorRef": "spw_1",
            "gateId": "g1",
            "approved": true,
        });
        let token = seal(&token_core, "decisionHash", &issuer).unwrap();
        let gate = fx
            .engine
            .authorize_payment("t1", "g1", Some(&token), 12)
            .unwrap();
        assert_eq!(gate.status, GateStatus::Authorized);
    }

    #[test]
    fn invalid_transitions_fail_closed() {
        let fx = fixture();
        fx.engine.create_gate("t1", gate_input("g1", 500), 10).unwrap();

        // Verify before authorize is illegal.
        let err = fx.engine.verify("t1", "g1", green_verify(), 11).unwrap_err();
        assert_eq!(err.code(), "SETTLEMENT_INVALID_TRANSITION");

        // Double authorize is illegal and does not double-lock.
        fx.engine.authorize_payment("t1", "g1", None, 12).unwrap();
        let err = fx.engine.authorize_payment("t1", "g1", None, 13).unwrap_err();
        assert_eq!(err.code(), "SETTLEMENT_INVALID_TRANSITION");
        assert_eq!(fx.wallets.get("t1", "agt_P").unwrap().escrow_locked_cents, 500);
    }

    #[test]
    fn void_and_refund_paths() {
        let fx = fixture();
        fx.engine.create_gate("t1", gate_input("g1", 700), 10).unwrap();
        fx.engine.authorize_payment("t1", "g1", None, 11).unwrap();

        let (gate, receipt) = fx.engine.void_gate("t1", "g1", "rev_hash", 12).unwrap();
        assert_eq!(gate.status, GateStatus::Voided);
        assert_eq!(fx.wallets.get("t1", "agt_P").unwrap().available_cents, 5000);
        assert_eq!(receipt.unwrap()["status"], "refunded");

        // Released gate: request then resolve a refund.
        fx.engine.create_gate("t1", gate_input("g2", 700), 13).unwrap();
        fx.engine.authorize_payment("t1", "g2", None, 14).unwrap();
        fx.engine.verify("t1", "g2", green_verify(), 15).unwrap();

        fx.engine.begin_refund("t1", "g2").unwrap();
        let (gate, receipt) = fx
            .engine
            .resolve_refund_accepted("t1", "g2", "rev_hash2", 16)
            .unwrap();
        assert_eq!(gate.status, GateStatus::Refunded);
        assert_eq!(receipt.unwrap()["status"], "refunded");
        assert_eq!(fx.wallets.get("t1", "agt_P").unwrap().available_cents, 5000);
        assert_eq!(fx.wallets.get("t1", "agt_E").unwrap().available_cents, 0);
    }

    #[test]
    fn receipt_index_orders_by_issue_time() {
        let fx = fixture();
        for (i, ts) in [(1, 30u64), (2, 10), (3, 20)] {
            let id = format!("g{i}");
            fx.engine.create_gate("t1", gate_input(&id, 100), ts).unwrap();
            fx.engine.authorize_payment("t1", &id, None, ts).unwrap();
            fx.engine.verify("t1", &id, green_verify(), ts).unwrap();
        }
        let index = fx.engine.receipt_index("t1");
        let times: Vec<u64> = index.iter().map(|e| e.issued_at_ms).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }
}
