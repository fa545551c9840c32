//! Reversal and arbitration service tests.

use crate::domain::arbitration::{AppealRef, VerdictCore, VERDICT_SCHEMA_VERSION};
use crate::domain::command::{ReversalCommand, ReversalRequest, ReversalTarget};
use crate::domain::dispute::OpenDisputeInput;
use crate::service::arbitration::ArbitrationDesk;
use crate::service::reversal::ReversalProcessor;
use serde_json::{json, Value};
use sk_02_envelope::{seal, AgentKeyDirectory, InMemoryKeyRegistry, KeyRegistry};
use sk_03_event_ledger::{EventLedger, InMemoryEventStore};
use sk_04_wallet::WalletLedger;
use sk_05_settlement::{
    CreateGateInput, ReleasePolicy, SettlementEngine, VerifyInput,
};
use sk_08_policy::{PolicyGatekeeper, WalletPolicy};
use sk_crypto::SigningPair;
use sk_types::{CaseStatus, GateStatus, ReversalAction, VerificationStatus};
use std::sync::Arc;

struct Fixture {
    wallets: Arc<WalletLedger>,
    ledger: Arc<EventLedger>,
    registry: Arc<InMemoryKeyRegistry>,
    engine: Arc<SettlementEngine>,
    processor: ReversalProcessor,
    desk: ArbitrationDesk,
    payer_key: SigningPair,
    payee_key: SigningPair,
    arbiter_key: SigningPair,
}

fn fixture() -> Fixture {
    let wallets = Arc::new(WalletLedger::new());
    let ledger = Arc::new(EventLedger::new(Arc::new(InMemoryEventStore::new())));
    let registry = Arc::new(InMemoryKeyRegistry::new());
    let gatekeeper = Arc::new(PolicyGatekeeper::new());

    let payer_key = SigningPair::generate();
    let payee_key = SigningPair::generate();
    let arbiter_key = SigningPair::generate();
    registry.register_for_agent("t1", "agt_P", payer_key.public_key());
    registry.register_for_agent("t1", "agt_E", payee_key.public_key());
    registry.register_for_agent("t1", "agt_A", arbiter_key.public_key());

    wallets.create_wallet("t1", "agt_P", "USD").unwrap();
    wallets.create_wallet("t1", "agt_E", "USD").unwrap();
    wallets.credit("t1", "agt_P", 5000, "h0", 1).unwrap();
    ledger.create_run("t1", "run_1").unwrap();
    gatekeeper.set_policy("t1", "agt_P", WalletPolicy::permissive());

    let engine = Arc::new(SettlementEngine::new(
        Arc::clone(&wallets),
        Arc::clone(&ledger),
        registry.clone() as Arc<dyn KeyRegistry>,
        registry.clone() as Arc<dyn AgentKeyDirectory>,
        SigningPair::generate(),
    ));
    let processor = ReversalProcessor::new(
        Arc::clone(&engine),
        Arc::clone(&ledger),
        registry.clone() as Arc<dyn KeyRegistry>,
        registry.clone() as Arc<dyn AgentKeyDirectory>,
        Arc::clone(&gatekeeper),
    );
    let desk = ArbitrationDesk::new(
        Arc::clone(&engine),
        Arc::clone(&ledger),
        registry.clone() as Arc<dyn KeyRegistry>,
        registry.clone() as Arc<dyn AgentKeyDirectory>,
    );
    Fixture {
        wallets,
        ledger,
        registry,
        engine,
        processor,
        desk,
        payer_key,
        payee_key,
        arbiter_key,
    }
}

fn create_and_authorize(fx: &Fixture, gate_id: &str, amount: u64) {
    fx.engine
        .create_gate(
            "t1",
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
            },
            10,
        )
        .unwrap();
    fx.engine.authorize_payment("t1", gate_id, None, 11).unwrap();
}

fn release_green(fx: &Fixture, gate_id: &str) -> String {
    let outcome = fx
        .engine
        .verify(
            "t1",
            gate_id,
            VerifyInput {
                verification_status: VerificationStatus::Green,
                policy: ReleasePolicy::default(),
                verification_method: None,
                evidence_refs: Vec::new(),
                provider_response: None,
                provider_signature: None,
                provider_quote_payload: None,
                quote_sha256: None,
                provider_quote_signature: None,
                operator_release_rate_pct: None,
            },
            12,
        )
        .unwrap();
    outcome.gate.receipt_id.unwrap()
}

fn signed_command(
    fx: &Fixture,
    command_id: &str,
    gate_id: &str,
    receipt_id: &str,
    action: ReversalAction,
) -> ReversalCommand {
    let mut command = ReversalCommand {
        command_id: command_id.to_string(),
        sponsor_ref: "self".to_string(),
        agent_key_id: fx.payer_key.key_id(),
        target: ReversalTarget {
            gate_id: gate_id.to_string(),
            receipt_id: receipt_id.to_string(),
            quote_id: None,
            request_sha256: None,
        },
        action,
        nonce: "n1".to_string(),
        idempotency_key: format!("idem_{command_id}"),
        exp: 1_000_000,
        signature_base64: String::new(),
    };
    let hash = command.payload_hash().unwrap();
    command.signature_base64 = fx.payer_key.sign_hash_hex(&hash).unwrap();
    command
}

fn request(command: ReversalCommand) -> ReversalRequest {
    ReversalRequest {
        command,
        evidence_refs: Vec::new(),
        provider_decision: None,
    }
}

fn payee_decision(fx: &Fixture, gate_id: &str, decision: &str) -> Value {
    let core = json!({ "gateId": gate_id, "decision": decision });
    seal(&core, "decisionHash", &fx.payee_key).unwrap()
}

// ---------------------------------------------------------------------
// reversal commands
// ---------------------------------------------------------------------

#[test]
fn void_before_execution_restores_payer() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);

    let command = signed_command(&fx, "cmd_1", "g1", "unissued", ReversalAction::VoidAuthorization);
    let outcome = fx.processor.process("t1", &request(command), 100, 20).unwrap();

    assert_eq!(outcome["gateStatus"], "voided");
    assert_eq!(outcome["receipt"]["status"], "refunded");
    assert_eq!(outcome["event"]["type"], "authorization_voided");
    assert_eq!(fx.wallets.get("t1", "agt_P").unwrap().available_cents, 5000);
    assert_eq!(fx.wallets.get("t1", "agt_P").unwrap().escrow_locked_cents, 0);
}

#[test]
fn replay_returns_prior_outcome_and_drift_conflicts() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);

    let command = signed_command(&fx, "cmd_1", "g1", "unissued", ReversalAction::VoidAuthorization);
    let first = fx.processor.process("t1", &request(command.clone()), 100, 20).unwrap();
    let replay = fx.processor.process("t1", &request(command.clone()), 100, 21).unwrap();
    assert_eq!(first, replay);

    // Same commandId, different payload.
    let mut drifted = command;
    drifted.nonce = "n2".to_string();
    let hash = drifted.payload_hash().unwrap();
    drifted.signature_base64 = fx.payer_key.sign_hash_hex(&hash).unwrap();
    let err = fx.processor.process("t1", &request(drifted), 100, 22).unwrap_err();
    assert_eq!(err.code(), "X402_REVERSAL_COMMAND_PAYLOAD_HASH_MISMATCH");
}

#[test]
fn expired_and_tampered_commands_rejected() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);

    let mut command =
        signed_command(&fx, "cmd_1", "g1", "unissued", ReversalAction::VoidAuthorization);
    command.exp = 50;
    let hash = command.payload_hash().unwrap();
    command.signature_base64 = fx.payer_key.sign_hash_hex(&hash).unwrap();
    let err = fx.processor.process("t1", &request(command), 100, 20).unwrap_err();
    assert_eq!(err.code(), "X402_REVERSAL_COMMAND_EXPIRED");

    // Signature by a non-payer key.
    let mut command =
        signed_command(&fx, "cmd_2", "g1", "unissued", ReversalAction::VoidAuthorization);
    command.agent_key_id = fx.payee_key.key_id();
    let hash = command.payload_hash().unwrap();
    command.signature_base64 = fx.payee_key.sign_hash_hex(&hash).unwrap();
    let err = fx.processor.process("t1", &request(command), 100, 20).unwrap_err();
    assert_eq!(err.code(), "X402_REVERSAL_AGENT_KEY_MISMATCH");
}

#[test]
fn policy_gates_reversal_actions() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);

    // A fresh gatekeeper would deny; install a policy without void.
    let gatekeeper = Arc::new(PolicyGatekeeper::new());
    gatekeeper.set_policy(
        "t1",
        "agt_P",
        WalletPolicy {
            allowed_reversal_actions: vec![ReversalAction::RequestRefund],
            ..WalletPolicy::default()
        },
    );
    let processor = ReversalProcessor::new(
        Arc::clone(&fx.engine),
        Arc::clone(&fx.ledger),
        fx.registry.clone() as Arc<dyn KeyRegistry>,
        fx.registry.clone() as Arc<dyn AgentKeyDirectory>,
        gatekeeper,
    );

    let command = signed_command(&fx, "cmd_1", "g1", "unissued", ReversalAction::VoidAuthorization);
    let err = processor.process("t1", &request(command), 100, 20).unwrap_err();
    assert_eq!(err.code(), "X402_WALLET_POLICY_REVERSAL_ACTION_NOT_ALLOWED");
}

#[test]
fn refund_flow_returns_funds_and_chains_events() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);
    let receipt_id = release_green(&fx, "g1");
    assert_eq!(fx.wallets.get("t1", "agt_E").unwrap().available_cents, 700);

    let command = signed_command(&fx, "cmd_1", "g1", &receipt_id, ReversalAction::RequestRefund);
    let outcome = fx.processor.process("t1", &request(command), 100, 20).unwrap();
    assert_eq!(outcome["gateStatus"], "refund_pending");

    let command = signed_command(&fx, "cmd_2", "g1", &receipt_id, ReversalAction::ResolveRefund);
    let mut req = request(command);
    req.provider_decision = Some(payee_decision(&fx, "g1", "accepted"));
    let outcome = fx.processor.process("t1", &req, 100, 21).unwrap();

    assert_eq!(outcome["gateStatus"], "refunded");
    assert_eq!(outcome["receipt"]["status"], "refunded");
    assert_eq!(fx.wallets.get("t1", "agt_P").unwrap().available_cents, 5000);
    assert_eq!(fx.wallets.get("t1", "agt_E").unwrap().available_cents, 0);

    // Two reversal events, chained.
    let events = fx.processor.list_events("t1", "g1");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "refund_requested");
    assert_eq!(events[1].event_type, "refund_resolved");
    assert_eq!(events[1].prev_chain_hash, events[0].chain_hash);
}

#[test]
fn resolve_refund_requires_payee_decision() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);
    let receipt_id = release_green(&fx, "g1");

    let command = signed_command(&fx, "cmd_1", "g1", &receipt_id, ReversalAction::RequestRefund);
    fx.processor.process("t1", &request(command), 100, 20).unwrap();

    // Missing artifact.
    let command = signed_command(&fx, "cmd_2", "g1", &receipt_id, ReversalAction::ResolveRefund);
    let err = fx.processor.process("t1", &request(command), 100, 21).unwrap_err();
    assert_eq!(err.code(), "X402_REVERSAL_PROVIDER_DECISION_REQUIRED");

    // Artifact signed by the wrong agent.
    let command = signed_command(&fx, "cmd_3", "g1", &receipt_id, ReversalAction::ResolveRefund);
    let mut req = request(command);
    let core = json!({ "gateId": "g1", "decision": "accepted" });
    req.provider_decision = Some(seal(&core, "decisionHash", &fx.payer_key).unwrap());
    let err = fx.processor.process("t1", &req, 100, 22).unwrap_err();
    assert_eq!(err.code(), "X402_REVERSAL_PROVIDER_DECISION_INVALID");

    // Declined decision restores the released status without moving funds.
    let command = signed_command(&fx, "cmd_4", "g1", &receipt_id, ReversalAction::ResolveRefund);
    let mut req = request(command);
    req.provider_decision = Some(payee_decision(&fx, "g1", "declined"));
    let outcome = fx.processor.process("t1", &req, 100, 23).unwrap();
    assert_eq!(outcome["gateStatus"], "released");
    assert_eq!(fx.wallets.get("t1", "agt_E").unwrap().available_cents, 700);
}

#[test]
fn wrong_receipt_target_rejected() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);
    let _receipt_id = release_green(&fx, "g1");

    let command = signed_command(&fx, "cmd_1", "g1", "rcp_wrong", ReversalAction::RequestRefund);
    let err = fx.processor.process("t1", &request(command), 100, 20).unwrap_err();
    assert_eq!(err.code(), "X402_REVERSAL_TARGET_MISMATCH");
}

// ---------------------------------------------------------------------
// disputes and arbitration
// ---------------------------------------------------------------------

fn signed_verdict(fx: &Fixture, case_id: &str, release_rate_pct: u32) -> Value {
    let core = VerdictCore {
        schema_version: VERDICT_SCHEMA_VERSION.to_string(),
        verdict_id: "vrd_1".to_string(),
        case_id: case_id.to_string(),
        tenant_id: "t1".to_string(),
        run_id: "run_1".to_string(),
        settlement_id: None,
        dispute_id: "d".to_string(),
        arbiter_agent_id: "agt_A".to_string(),
        outcome: "accepted".to_string(),
        release_rate_pct,
        rationale: "evidence supports the payee".to_string(),
        evidence_refs: Vec::new(),
        issued_at: "2026-07-01T00:00:00Z".to_string(),
        appeal_ref: None,
    };
    let core_value = serde_json::to_value(core).unwrap();
    seal(&core_value, "verdictHash", &fx.arbiter_key).unwrap()
}

#[test]
fn arbitration_appeal_chain_end_to_end() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);

    let dispute = fx
        .desk
        .open_dispute(
            "t1",
            "run_1",
            OpenDisputeInput {
                opened_by: "agt_P".to_string(),
                settlement_gate_id: Some("g1".to_string()),
                ..OpenDisputeInput::default()
            },
            30,
        )
        .unwrap();
    assert_eq!(fx.engine.gate("t1", "g1").unwrap().status, GateStatus::Disputed);
    assert_eq!(
        fx.ledger.get_run("t1", "run_1").unwrap().status,
        sk_types::RunStatus::Disputed
    );

    let case = fx
        .desk
        .open_case("t1", &dispute.dispute_id, "agt_A", 31)
        .unwrap();
    assert_eq!(case.status, CaseStatus::UnderReview);

    let verdict = signed_verdict(&fx, &case.case_id, 100);
    let case = fx.desk.issue_verdict("t1", &case.case_id, &verdict, 32).unwrap();
    assert_eq!(case.status, CaseStatus::VerdictIssued);
    // Escrow was still locked; the verdict released it in full.
    assert_eq!(fx.wallets.get("t1", "agt_E").unwrap().available_cents, 700);

    let case = fx.desk.close_case("t1", &case.case_id, 33).unwrap();
    assert_eq!(case.status, CaseStatus::Closed);

    let appeal = fx
        .desk
        .open_appeal("t1", &case.case_id, "agt_A", &[], 34)
        .unwrap();
    assert_eq!(
        appeal.appeal_ref,
        Some(AppealRef {
            parent_case_id: case.case_id.clone()
        })
    );

    let parent_view = fx.desk.case_view("t1", &case.case_id).unwrap();
    assert_eq!(parent_view.appeal_chain.child_case_ids, vec![appeal.case_id.clone()]);
    assert!(!parent_view.actionability.can_open_appeal);

    let child_view = fx.desk.case_view("t1", &appeal.case_id).unwrap();
    assert_eq!(
        child_view.appeal_chain.parent_case_id,
        Some(case.case_id.clone())
    );
    assert!(!child_view.actionability.can_open_appeal);

    // One appeal per case.
    let err = fx
        .desk
        .open_appeal("t1", &case.case_id, "agt_A", &[], 35)
        .unwrap_err();
    assert_eq!(err.code(), "ARBITRATION_APPEAL_NOT_ALLOWED");
}

#[test]
fn verdict_requires_the_assigned_arbiter() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);
    let dispute = fx
        .desk
        .open_dispute(
            "t1",
            "run_1",
            OpenDisputeInput {
                opened_by: "agt_P".to_string(),
                settlement_gate_id: Some("g1".to_string()),
                ..OpenDisputeInput::default()
            },
            30,
        )
        .unwrap();
    let case = fx
        .desk
        .open_case("t1", &dispute.dispute_id, "agt_A", 31)
        .unwrap();

    // Signed by the payee, not the arbiter.
    let core = serde_json::to_value(VerdictCore {
        schema_version: VERDICT_SCHEMA_VERSION.to_string(),
        verdict_id: "vrd_1".to_string(),
        case_id: case.case_id.clone(),
        tenant_id: "t1".to_string(),
        run_id: "run_1".to_string(),
        settlement_id: None,
        dispute_id: dispute.dispute_id.clone(),
        arbiter_agent_id: "agt_A".to_string(),
        outcome: "accepted".to_string(),
        release_rate_pct: 50,
        rationale: "".to_string(),
        evidence_refs: Vec::new(),
        issued_at: "2026-07-01T00:00:00Z".to_string(),
        appeal_ref: None,
    })
    .unwrap();
    let envelope = seal(&core, "verdictHash", &fx.payee_key).unwrap();
    let err = fx
        .desk
        .issue_verdict("t1", &case.case_id, &envelope, 32)
        .unwrap_err();
    assert_eq!(err.code(), "ARBITRATION_ARBITER_MISMATCH");

    // Closing without a verdict is rejected.
    let err = fx.desk.close_case("t1", &case.case_id, 33).unwrap_err();
    assert_eq!(err.code(), "ARBITRATION_VERDICT_REQUIRED");
}

#[test]
fn dispute_close_requires_binding_evidence_when_bound() {
    let fx = fixture();
    create_and_authorize(&fx, "g1", 700);

    // Bind the settlement to a request hash via quote-free evidence.
    let request_hash = sk_crypto::sha256_hex("the original request");
    fx.engine
        .verify(
            "t1",
            "g1",
            VerifyInput {
                verification_status: VerificationStatus::Green,
                policy: ReleasePolicy::default(),
                verification_method: None,
                evidence_refs: vec![format!("http:request_sha256:{request_hash}")],
                provider_response: None,
                provider_signature: None,
                provider_quote_payload: None,
                quote_sha256: None,
                provider_quote_signature: None,
                operator_release_rate_pct: None,
            },
            12,
        )
        .unwrap();

    let dispute = fx
        .desk
        .open_dispute(
            "t1",
            "run_1",
            OpenDisputeInput {
                opened_by: "agt_P".to_string(),
                settlement_gate_id: Some("g1".to_string()),
                ..OpenDisputeInput::default()
            },
            30,
        )
        .unwrap();

    let err = fx
        .desk
        .close_dispute("t1", &dispute.dispute_id, &[], 31)
        .unwrap_err();
    assert_eq!(err.code(), "X402_DISPUTE_CLOSE_BINDING_EVIDENCE_REQUIRED");

    let err = fx
        .desk
        .close_dispute(
            "t1",
            &dispute.dispute_id,
            &[format!("http:request_sha256:{}", sk_crypto::sha256_hex("other"))],
            32,
        )
        .unwrap_err();
    assert_eq!(err.code(), "X402_DISPUTE_CLOSE_BINDING_EVIDENCE_MISMATCH");

    let dispute = fx
        .desk
        .close_dispute(
            "t1",
            &dispute.dispute_id,
            &[format!("http:request_sha256:{request_hash}")],
            33,
        )
        .unwrap();
    assert_eq!(dispute.status, sk_types::DisputeStatus::Closed);
}
