//! The literal end-to-end scenarios.

use crate::integration::fixtures::{
    default_policy, seeded, signed_reversal_body, ADMIN_TOKEN,
};
use serde_json::json;
use sk_02_envelope::seal;
use sk_09_gateway::OperationRequest;

// ---------------------------------------------------------------------
// 1. Happy release
// ---------------------------------------------------------------------

#[tokio::test]
async fn happy_release() {
    let fx = seeded(5000).await;

    fx.open_gate("g1", 500).await;
    assert_eq!(fx.wallet("agt_P"), (4500, 500));

    let response = fx.release_green("g1").await;
    assert_eq!(response["gate"]["status"], "released");
    assert_eq!(fx.wallet("agt_P"), (4500, 0));
    assert_eq!(fx.wallet("agt_E"), (500, 0));

    let receipt = &response["receipt"];
    assert_eq!(receipt["schemaVersion"], "X402ReceiptRecord.v1");
    assert!(receipt["receiptHash"].is_string());
    assert_eq!(receipt["signature"]["algorithm"], "ed25519");
}

#[tokio::test]
async fn happy_release_with_provider_signature() {
    let fx = seeded(5000).await;
    fx.open_gate("g1", 500).await;

    let provider_response = json!({ "result": "report.pdf", "bytes": 123 });
    let response_hash = sk_01_canonical::hash_canonical(&provider_response).unwrap();
    let response = fx
        .op(
            "gate.verify",
            json!({
                "gateId": "g1",
                "verificationStatus": "green",
                "policy": default_policy(),
                "evidenceRefs": [format!("http:response_sha256:{response_hash}")],
                "providerResponse": provider_response,
                "providerSignature": {
                    "keyId": fx.payee_key.key_id(),
                    "signatureBase64": fx.payee_key.sign_hash_hex(&response_hash).unwrap(),
                },
            }),
        )
        .await
        .unwrap();

    assert_eq!(response["receipt"]["bindings"]["providerSig"]["verified"], true);
    assert_eq!(
        response["receipt"]["bindings"]["providerSig"]["responseSha256"],
        json!(response_hash)
    );
}

// ---------------------------------------------------------------------
// 2. Void before execution
// ---------------------------------------------------------------------

#[tokio::test]
async fn void_before_execution() {
    let fx = seeded(5000).await;
    fx.open_gate("g2", 700).await;
    assert_eq!(fx.wallet("agt_P"), (4300, 700));

    let body = signed_reversal_body(
        &fx.payer_key,
        "cmd_void",
        "g2",
        "unissued",
        "void_authorization",
        vec![],
        None,
    );
    let outcome = fx.op("gate.reversal", body).await.unwrap();

    assert_eq!(outcome["gateStatus"], "voided");
    assert_eq!(outcome["receipt"]["status"], "refunded");
    assert_eq!(outcome["event"]["type"], "authorization_voided");
    assert_eq!(fx.wallet("agt_P"), (5000, 0));
}

// ---------------------------------------------------------------------
// 3. Refund request -> accepted
// ---------------------------------------------------------------------

#[tokio::test]
async fn refund_request_then_accepted() {
    let fx = seeded(5000).await;
    fx.open_gate("g3", 700).await;

    // Release bound to a request hash so reversal evidence must match.
    let request_hash = sk_crypto::sha256_hex("the original request");
    let evidence = format!("http:request_sha256:{request_hash}");
    let response = fx
        .op(
            "gate.verify",
            json!({
                "gateId": "g3",
                "verificationStatus": "green",
                "policy": default_policy(),
                "evidenceRefs": [evidence],
            }),
        )
        .await
        .unwrap();
    let receipt_id = response["receipt"]["receiptId"].as_str().unwrap().to_string();
    assert_eq!(fx.wallet("agt_E"), (700, 0));

    // Refund without matching evidence fails closed.
    let body = signed_reversal_body(
        &fx.payer_key,
        "cmd_rr_bad",
        "g3",
        &receipt_id,
        "request_refund",
        vec![],
        None,
    );
    let err = fx.op("gate.reversal", body).await.unwrap_err();
    assert_eq!(err.code, "X402_REVERSAL_BINDING_EVIDENCE_REQUIRED");

    let body = signed_reversal_body(
        &fx.payer_key,
        "cmd_rr",
        "g3",
        &receipt_id,
        "request_refund",
        vec![format!("http:request_sha256:{request_hash}")],
        None,
    );
    let outcome = fx.op("gate.reversal", body).await.unwrap();
    assert_eq!(outcome["gateStatus"], "refund_pending");

    // Payee accepts; funds return.
    let decision = seal(
        &json!({ "gateId": "g3", "decision": "accepted" }),
        "decisionHash",
        &fx.payee_key,
    )
    .unwrap();
    let body = signed_reversal_body(
        &fx.payer_key,
        "cmd_resolve",
        "g3",
        &receipt_id,
        "resolve_refund",
        vec![format!("http:request_sha256:{request_hash}")],
        Some(decision),
    );
    let outcome = fx.op("gate.reversal", body).await.unwrap();
    assert_eq!(outcome["gateStatus"], "refunded");
    assert_eq!(outcome["receipt"]["status"], "refunded");
    assert_eq!(fx.wallet("agt_P"), (5000, 0));
    assert_eq!(fx.wallet("agt_E"), (0, 0));

    // Two reversal events, chained.
    let events = fx.op("reversal.events", json!({ "gateId": "g3" })).await.unwrap();
    let events = events["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "refund_requested");
    assert_eq!(events[1]["type"], "refund_resolved");
    assert_eq!(events[1]["prevChainHash"], events[0]["chainHash"]);

    // Single-event lookup on the reversal stream.
    let event_id = events[0]["eventId"].as_str().unwrap();
    let fetched = fx
        .op("reversal.event", json!({ "gateId": "g3", "eventId": event_id }))
        .await
        .unwrap();
    assert_eq!(fetched["event"]["eventId"], events[0]["eventId"]);
}

// ---------------------------------------------------------------------
// 4. CAS conflict
// ---------------------------------------------------------------------

#[tokio::test]
async fn cas_conflict_one_winner() {
    let fx = seeded(0).await;
    let genesis = sk_types::GENESIS_CHAIN_HASH;

    let append = |idem: &'static str| {
        fx.kernel.handle_at(
            OperationRequest::new(
                "run.append_event",
                "t1",
                json!({ "runId": "run_1", "type": "step", "payload": { "n": 1 } }),
            )
            .with_ops_token(ADMIN_TOKEN)
            .with_idempotency_key(idem)
            .with_expected_prev(genesis),
            1_700_000_000_000,
        )
    };

    let (first, second) = tokio::join!(append("idem_cas_a"), append("idem_cas_b"));
    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| {
            r.as_ref()
                .err()
                .map(|e| e.code == "CHAIN_HASH_CAS_MISMATCH")
                .unwrap_or(false)
        })
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 1);

    // No partial append: exactly one event on the chain.
    let events = fx.op("run.events", json!({ "runId": "run_1" })).await.unwrap();
    assert_eq!(events["events"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------
// 5. Idempotent replay with body drift
// ---------------------------------------------------------------------

#[tokio::test]
async fn idempotent_replay_and_body_drift() {
    let fx = seeded(5000).await;

    let body = json!({ "runId": "run_2" });
    let first = fx.op_with_key("run.create", body.clone(), "idem_run").await.unwrap();

    // Byte-identical replay returns the stored response.
    let replay = fx.op_with_key("run.create", body, "idem_run").await.unwrap();
    assert_eq!(first, replay);

    // Same key, different body.
    let err = fx
        .op_with_key("run.create", json!({ "runId": "run_3" }), "idem_run")
        .await
        .unwrap_err();
    assert_eq!(err.code, "IDEMPOTENCY_BODY_MISMATCH");
    assert_eq!(err.status, 409);

    // The stored response is unchanged.
    let replay = fx
        .op_with_key("run.create", json!({ "runId": "run_2" }), "idem_run")
        .await
        .unwrap();
    assert_eq!(first, replay);
}

// ---------------------------------------------------------------------
// 6. Arbitration appeal
// ---------------------------------------------------------------------

#[tokio::test]
async fn arbitration_appeal_chain() {
    let fx = seeded(5000).await;
    fx.open_gate("g6", 400).await;

    let dispute = fx
        .op(
            "dispute.open",
            json!({
                "runId": "run_1",
                "openedBy": "agt_P",
                "settlementGateId": "g6",
                "disputeType": "quality",
            }),
        )
        .await
        .unwrap();
    let dispute_id = dispute["dispute"]["disputeId"].as_str().unwrap().to_string();

    let case = fx
        .op(
            "arbitration.open",
            json!({ "disputeId": dispute_id, "arbiterAgentId": "agt_A" }),
        )
        .await
        .unwrap();
    let case_id = case["case"]["caseId"].as_str().unwrap().to_string();
    assert_eq!(case["case"]["status"], "under_review");

    let verdict_core = json!({
        "schemaVersion": "ArbitrationVerdict.v1",
        "verdictId": "vrd_1",
        "caseId": case_id,
        "tenantId": "t1",
        "runId": "run_1",
        "disputeId": dispute_id,
        "arbiterAgentId": "agt_A",
        "outcome": "accepted",
        "releaseRatePct": 100,
        "rationale": "delivery was verified on appeal evidence",
        "evidenceRefs": [],
        "issuedAt": "2026-07-01T00:00:00Z",
    });
    let verdict = seal(&verdict_core, "verdictHash", &fx.arbiter_key).unwrap();
    let case = fx
        .op("arbitration.verdict", json!({ "caseId": case_id, "verdict": verdict }))
        .await
        .unwrap();
    assert_eq!(case["case"]["status"], "verdict_issued");

    fx.op("arbitration.close", json!({ "caseId": case_id })).await.unwrap();

    let appeal = fx
        .op(
            "arbitration.appeal",
            json!({ "parentCaseId": case_id, "arbiterAgentId": "agt_A" }),
        )
        .await
        .unwrap();
    let appeal_id = appeal["case"]["caseId"].as_str().unwrap().to_string();
    assert_eq!(appeal["case"]["status"], "under_review");
    assert_eq!(appeal["case"]["appealRef"]["parentCaseId"], json!(case_id));

    // Workspace views: the parent lists the child; the child cannot be
    // appealed while under review.
    let parent_view = fx
        .op("workspace.case_view", json!({ "caseId": case_id }))
        .await
        .unwrap();
    assert_eq!(
        parent_view["appealChain"]["childCaseIds"],
        json!([appeal_id.clone()])
    );
    assert_eq!(parent_view["actionability"]["canOpenAppeal"], false);

    let child_view = fx
        .op("workspace.case_view", json!({ "caseId": appeal_id }))
        .await
        .unwrap();
    assert_eq!(child_view["actionability"]["canOpenAppeal"], false);
}

// ---------------------------------------------------------------------
// pipeline guards
// ---------------------------------------------------------------------

#[tokio::test]
async fn tenant_and_scope_guards() {
    let fx = seeded(0).await;

    // Missing tenant.
    let err = fx
        .kernel
        .handle_at(
            OperationRequest {
                op: "run.create".to_string(),
                headers: Default::default(),
                body: json!({ "runId": "r" }),
            },
            0,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, "TENANT_REQUIRED");

    // Missing ops token on a scoped op.
    let err = fx
        .kernel
        .handle_at(
            OperationRequest::new("receipts.list", "t1", json!({})),
            0,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, "OPS_TOKEN_REQUIRED");

    // Token without the needed scope.
    fx.kernel
        .tokens()
        .issue("t1", "tok-audit", &[sk_types::OpsScope::AuditRead]);
    let err = fx
        .kernel
        .handle_at(
            OperationRequest::new("receipts.list", "t1", json!({}))
                .with_ops_token("tok-audit"),
            0,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, "OPS_SCOPE_DENIED");
    assert_eq!(err.status, 403);

    // Unknown keys fail closed.
    let err = fx
        .op("run.create", json!({ "runId": "r", "unexpected": 1 }))
        .await
        .unwrap_err();
    assert_eq!(err.code, "SCHEMA_INVALID");

    // Mutations demand an idempotency key.
    let err = fx
        .kernel
        .handle_at(
            OperationRequest::new("run.create", "t1", json!({ "runId": "r" }))
                .with_ops_token(ADMIN_TOKEN),
            0,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, "IDEMPOTENCY_KEY_REQUIRED");
}

#[tokio::test]
async fn receipts_listing_filters_and_paginates() {
    let fx = seeded(5000).await;
    for (i, tool) in [(1, "search"), (2, "search"), (3, "browse")] {
        let gate_id = format!("g{i}");
        fx.op(
            "gate.create",
            json!({
                "gateId": gate_id,
                "runId": "run_1",
                "payerAgentId": "agt_P",
                "payeeAgentId": "agt_E",
                "amountCents": 100,
                "currency": "USD",
                "toolId": tool,
            }),
        )
        .await
        .unwrap();
        fx.op("gate.authorize_payment", json!({ "gateId": gate_id })).await.unwrap();
        fx.release_green(&gate_id).await;
    }

    let page = fx
        .op("receipts.list", json!({ "toolId": "search", "limit": 1 }))
        .await
        .unwrap();
    assert_eq!(page["receipts"].as_array().unwrap().len(), 1);
    let cursor = page["nextCursor"].as_str().unwrap().to_string();

    let page2 = fx
        .op("receipts.list", json!({ "toolId": "search", "limit": 1, "cursor": cursor }))
        .await
        .unwrap();
    assert_eq!(page2["receipts"].as_array().unwrap().len(), 1);
    assert_ne!(
        page["receipts"][0]["receiptId"],
        page2["receipts"][0]["receiptId"]
    );

    let export = fx.op("receipts.export", json!({})).await.unwrap();
    assert_eq!(export["count"], 3);
    let ndjson = export["ndjson"].as_str().unwrap();
    assert_eq!(ndjson.lines().count(), 3);
    // Every line is canonical JSON of a sealed receipt.
    for line in ndjson.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["receiptHash"].is_string());
    }
}

#[tokio::test]
async fn federation_envelopes_verify_against_trust() {
    let fx = seeded(0).await;
    let coordinator = sk_crypto::SigningPair::generate();
    fx.kernel.trust().refresh(vec![sk_07_artifacts::TrustAnchor {
        key_id: coordinator.key_id(),
        public_key: coordinator.public_key(),
        anchor_version: 1,
        revoked: false,
        rotated_at_ms: None,
    }]);

    let envelope = seal(
        &json!({
            "schemaVersion": "FederationInvoke.v1",
            "tenantId": "t1",
            "operation": "run.append_event",
            "trust": { "anchorVersion": 1 },
            "signedAt": 1_700_000_000_000u64,
        }),
        "envelopeHash",
        &coordinator,
    )
    .unwrap();

    let response = fx
        .op("federation.invoke", json!({ "envelope": envelope }))
        .await
        .unwrap();
    assert_eq!(response["verified"], true);

    // An unknown coordinator is a 403.
    let rogue = sk_crypto::SigningPair::generate();
    let envelope = seal(
        &json!({
            "schemaVersion": "FederationInvoke.v1",
            "tenantId": "t1",
            "operation": "run.append_event",
            "trust": { "anchorVersion": 1 },
        }),
        "envelopeHash",
        &rogue,
    )
    .unwrap();
    let err = fx
        .op("federation.invoke", json!({ "envelope": envelope }))
        .await
        .unwrap_err();
    assert_eq!(err.code, "FEDERATION_UNTRUSTED_COORDINATOR");
    assert_eq!(err.status, 403);
}
