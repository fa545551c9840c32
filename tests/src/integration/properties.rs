//! Cross-subsystem invariant checks.

use crate::integration::fixtures::{default_policy, seeded};
use serde_json::json;

/// Escrow conservation across a gate's whole life: the sum of payer
/// available, payer escrow and payee available is constant.
#[tokio::test]
async fn gate_conserves_total_balance() {
    let fx = seeded(5000).await;

    let total = |fx: &crate::integration::fixtures::TestKernel| {
        let (p_avail, p_escrow) = fx.wallet("agt_P");
        let (e_avail, e_escrow) = fx.wallet("agt_E");
        p_avail + p_escrow + e_avail + e_escrow
    };
    let baseline = total(&fx);

    fx.open_gate("g1", 333).await;
    assert_eq!(total(&fx), baseline);

    fx.op(
        "gate.verify",
        json!({
            "gateId": "g1",
            "verificationStatus": "green",
            "policy": {
                "mode": "automatic",
                "green": { "autoRelease": true, "releaseRatePct": 33 },
                "amber": { "autoRelease": false, "releaseRatePct": 0 },
                "red": { "autoRelease": true, "releaseRatePct": 0 },
            },
        }),
    )
    .await
    .unwrap();
    assert_eq!(total(&fx), baseline);

    // Journal legs of internal transfers sum to zero.
    for entry in fx.kernel.wallets().journal("t1") {
        if entry.op == "credit" || entry.op == "debit" {
            continue;
        }
        let sum: i64 = entry
            .legs
            .iter()
            .map(|leg| leg.available_delta + leg.escrow_delta)
            .sum();
        assert_eq!(sum, 0, "op {} must conserve", entry.op);
    }
}

/// Every subject the kernel wrote is a valid linked chain.
#[tokio::test]
async fn all_chains_verify() {
    let fx = seeded(5000).await;
    fx.open_gate("g1", 500).await;
    fx.release_green("g1").await;

    fx.kernel.ledger().verify_chain("t1", "run/run_1").unwrap();
    fx.kernel.ledger().verify_chain("t1", "wallet/agt_P").unwrap();

    // Restart-style recovery agrees with the live tail.
    assert_eq!(
        fx.kernel.ledger().recover_last_chain_hash("t1", "run/run_1"),
        fx.kernel.ledger().last_chain_hash("t1", "run/run_1"),
    );
}

/// Receipts verify offline against the canonical encoding alone: strip
/// the hash and signature, re-hash, compare.
#[tokio::test]
async fn receipts_verify_offline() {
    let fx = seeded(5000).await;
    fx.open_gate("g1", 500).await;
    let response = fx.release_green("g1").await;
    let receipt = response["receipt"].clone();

    let mut core = receipt.as_object().unwrap().clone();
    let embedded = core.remove("receiptHash").unwrap();
    core.remove("signature");
    let recomputed =
        sk_01_canonical::hash_canonical(&serde_json::Value::Object(core)).unwrap();
    assert_eq!(embedded.as_str().unwrap(), recomputed);
}

/// A single-bit mutation of a receipt core breaks verification.
#[tokio::test]
async fn tampered_receipt_fails_verification() {
    let fx = seeded(5000).await;
    fx.open_gate("g1", 500).await;
    let response = fx.release_green("g1").await;

    let mut tampered = response["receipt"].clone();
    tampered["amountCents"] = json!(501);

    let mut core = tampered.as_object().unwrap().clone();
    let embedded = core.remove("receiptHash").unwrap();
    core.remove("signature");
    let recomputed =
        sk_01_canonical::hash_canonical(&serde_json::Value::Object(core)).unwrap();
    assert_ne!(embedded.as_str().unwrap(), recomputed);
}

/// Milli-cent arithmetic is exposed for reconciliation and matches the
/// floored cent figures.
#[tokio::test]
async fn receipt_milli_cents_match_split() {
    let fx = seeded(5000).await;
    fx.open_gate("g1", 333).await;
    let response = fx
        .op(
            "gate.verify",
            json!({
                "gateId": "g1",
                "verificationStatus": "green",
                "policy": {
                    "mode": "automatic",
                    "green": { "autoRelease": true, "releaseRatePct": 33 },
                    "amber": { "autoRelease": false, "releaseRatePct": 0 },
                    "red": { "autoRelease": true, "releaseRatePct": 0 },
                },
            }),
        )
        .await
        .unwrap();

    let record = &response["receipt"]["decisionRecord"];
    assert_eq!(record["releasedMilliCents"], 109_890);
    assert_eq!(record["releasedCents"], 109);
    assert_eq!(record["refundedCents"], 224);
    assert_eq!(
        record["releasedCents"].as_u64().unwrap() + record["refundedCents"].as_u64().unwrap(),
        333
    );
}

/// Artifacts built from kernel state stay verifiable and deterministic.
#[tokio::test]
async fn job_proof_binds_the_run_chain() {
    let fx = seeded(5000).await;
    fx.open_gate("g1", 500).await;
    let response = fx.release_green("g1").await;
    let receipt_id = response["receipt"]["receiptId"].as_str().unwrap().to_string();

    let events = fx.kernel.ledger().list_events("t1", "run/run_1");
    let tail = fx.kernel.ledger().last_chain_hash("t1", "run/run_1");
    let proof = fx
        .kernel
        .artifacts()
        .job_proof("t1", "run_1", &tail, events.len(), &[receipt_id], "2026-07-01T00:00:00Z")
        .unwrap();

    assert_eq!(proof["lastChainHash"].as_str().unwrap(), tail);
    let again = {
        let events = fx.kernel.ledger().list_events("t1", "run/run_1");
        let receipt_id = response["receipt"]["receiptId"].as_str().unwrap().to_string();
        fx.kernel
            .artifacts()
            .job_proof("t1", "run_1", &tail, events.len(), &[receipt_id], "2026-07-01T00:00:00Z")
            .unwrap()
    };
    assert_eq!(
        sk_01_canonical::encode(&proof).unwrap(),
        sk_01_canonical::encode(&again).unwrap()
    );
}

/// Transcripts and finance packs built from kernel state verify offline.
#[tokio::test]
async fn session_and_finance_artifacts_verify() {
    let fx = seeded(5000).await;
    fx.open_gate("g1", 500).await;
    let response = fx.release_green("g1").await;

    let events = fx.kernel.ledger().list_events("t1", "run/run_1");
    let transcript = fx
        .kernel
        .artifacts()
        .session_transcript("t1", "run/run_1", &events, "2026-07-01T00:00:00Z")
        .unwrap();
    assert_eq!(transcript["schemaVersion"], "SessionTranscript.v1");
    assert!(transcript["transcriptHash"].is_string());
    assert_eq!(
        transcript["verification"]["eventCount"].as_u64().unwrap() as usize,
        events.len()
    );

    let replay = fx
        .kernel
        .artifacts()
        .session_replay_pack(
            "t1",
            "run/run_1",
            &events,
            &[json!({ "attempt": 1, "status": 200 })],
            "2026-07-01T00:00:00Z",
        )
        .unwrap();
    assert!(replay["packHash"].is_string());

    let receipts = vec![response["receipt"].clone()];
    let journal_count = fx.kernel.wallets().journal("t1").len() as u64;
    let pack = fx
        .kernel
        .artifacts()
        .finance_pack("t1", "2026-07", &receipts, journal_count, "2026-08-01T00:00:00Z")
        .unwrap();
    assert_eq!(pack["schemaVersion"], "FinancePack.v1");

    // Month aggregates line up with the billing meter.
    let usage = fx.kernel.gatekeeper().usage_for("t1", 1_700_000_000_000);
    assert_eq!(usage.verified_runs, 1);
    assert_eq!(usage.settled_volume_cents, 500);
    let overage = fx.kernel.gatekeeper().overage_for("t1", 1_700_000_000_000);
    assert_eq!(overage.total_milli_cents, 0);
    let month = fx
        .kernel
        .artifacts()
        .month_proof(
            "t1",
            "2026-07",
            1,
            usage.settled_volume_cents,
            0,
            overage.total_milli_cents,
            "2026-08-01T00:00:00Z",
        )
        .unwrap();
    assert_eq!(month["settledVolumeCents"], 500);
}

/// Amber verification under the default policy parks the gate and a later
/// operator decision completes it; funds stay locked in between.
#[tokio::test]
async fn amber_holds_until_operator_decides() {
    let fx = seeded(5000).await;
    fx.open_gate("g1", 400).await;

    let held = fx
        .op(
            "gate.verify",
            json!({
                "gateId": "g1",
                "verificationStatus": "amber",
                "policy": default_policy(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(held["gate"]["status"], "verifying");
    assert!(held["receipt"].is_null());
    assert_eq!(fx.wallet("agt_P"), (4600, 400));

    let decided = fx
        .op(
            "gate.verify",
            json!({
                "gateId": "g1",
                "verificationStatus": "amber",
                "policy": default_policy(),
                "operatorReleaseRatePct": 50,
            }),
        )
        .await
        .unwrap();
    assert_eq!(decided["gate"]["status"], "partially_released");
    assert_eq!(fx.wallet("agt_E"), (200, 0));
    assert_eq!(fx.wallet("agt_P"), (4800, 0));
}
