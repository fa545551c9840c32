//! Shared fixtures for the integration suite.

use serde_json::{json, Value};
use sk_09_gateway::{KernelConfig, OperationRequest, SettlementKernel};
use sk_crypto::SigningPair;
use sk_types::{ApiError, OpsScope};
use std::sync::atomic::{AtomicU64, Ordering};

static IDEM_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The admin token every fixture issues for tenant `t1`.
pub const ADMIN_TOKEN: &str = "tok-admin";

/// A kernel plus the signing pairs of its seeded agents.
pub struct TestKernel {
    pub kernel: SettlementKernel,
    pub payer_key: SigningPair,
    pub payee_key: SigningPair,
    pub arbiter_key: SigningPair,
}

/// Fresh kernel, seeded with the two-agent world and a payer credit.
pub async fn seeded(credit_cents: u64) -> TestKernel {
    let fx = kernel();
    fx.seed_world(credit_cents).await;
    fx
}

/// Fresh kernel with an all-scope admin token for `t1`.
pub fn kernel() -> TestKernel {
    let kernel = SettlementKernel::new(KernelConfig::default()).expect("default config is valid");
    kernel.tokens().issue(
        "t1",
        ADMIN_TOKEN,
        &[
            OpsScope::FinanceRead,
            OpsScope::FinanceWrite,
            OpsScope::OpsRead,
            OpsScope::AuditRead,
        ],
    );
    TestKernel {
        kernel,
        payer_key: SigningPair::generate(),
        payee_key: SigningPair::generate(),
        arbiter_key: SigningPair::generate(),
    }
}

impl TestKernel {
    /// Run an operation as tenant `t1` with the admin token and a fresh
    /// idempotency key.
    pub async fn op(&self, op: &str, body: Value) -> Result<Value, ApiError> {
        let key = format!("idem_{}", IDEM_COUNTER.fetch_add(1, Ordering::Relaxed));
        self.kernel
            .handle_at(
                OperationRequest::new(op, "t1", body)
                    .with_ops_token(ADMIN_TOKEN)
                    .with_idempotency_key(key),
                1_700_000_000_000,
            )
            .await
    }

    /// Like [`Self::op`] but with a caller-chosen idempotency key.
    pub async fn op_with_key(
        &self,
        op: &str,
        body: Value,
        idempotency_key: &str,
    ) -> Result<Value, ApiError> {
        self.kernel
            .handle_at(
                OperationRequest::new(op, "t1", body)
                    .with_ops_token(ADMIN_TOKEN)
                    .with_idempotency_key(idempotency_key),
                1_700_000_000_000,
            )
            .await
    }

    /// Register an agent with a signing key and a USD wallet.
    pub async fn register_agent(&self, agent_id: &str, key: &SigningPair) {
        self.op(
            "agent.register",
            json!({
                "agentId": agent_id,
                "displayName": agent_id,
                "owner": "acme",
                "publicKeyBase64": key.public_key().to_base64(),
            }),
        )
        .await
        .expect("agent registration succeeds");
    }

    /// Seed the two-agent happy-path world: payer with `credit_cents`,
    /// payee with an empty wallet, one run `run_1`.
    pub async fn seed_world(&self, credit_cents: u64) {
        self.register_agent("agt_P", &self.payer_key).await;
        self.register_agent("agt_E", &self.payee_key).await;
        self.register_agent("agt_A", &self.arbiter_key).await;
        self.op("wallet.credit", json!({ "agentId": "agt_P", "amountCents": credit_cents }))
            .await
            .expect("credit succeeds");
        self.op("run.create", json!({ "runId": "run_1" }))
            .await
            .expect("run creation succeeds");
        // The scenarios exercise reversals; the payer opts into them.
        self.kernel
            .gatekeeper()
            .set_policy("t1", "agt_P", sk_08_policy::WalletPolicy::permissive());
    }

    /// Create and authorize a gate on `run_1`.
    pub async fn open_gate(&self, gate_id: &str, amount_cents: u64) {
        self.op(
            "gate.create",
            json!({
                "gateId": gate_id,
                "runId": "run_1",
                "payerAgentId": "agt_P",
                "payeeAgentId": "agt_E",
                "amountCents": amount_cents,
                "currency": "USD",
                "toolId": "search",
            }),
        )
        .await
        .expect("gate creation succeeds");
        self.op("gate.authorize_payment", json!({ "gateId": gate_id }))
            .await
            .expect("authorization succeeds");
    }

    /// Green-verify a gate at 100% auto-release; returns the response.
    pub async fn release_green(&self, gate_id: &str) -> Value {
        self.op(
            "gate.verify",
            json!({
                "gateId": gate_id,
                "verificationStatus": "green",
                "policy": default_policy(),
            }),
        )
        .await
        .expect("verify succeeds")
    }

    /// Wallet snapshot helper.
    pub fn wallet(&self, agent_id: &str) -> (u64, u64) {
        let w = self
            .kernel
            .wallets()
            .get("t1", agent_id)
            .expect("wallet exists");
        (w.available_cents, w.escrow_locked_cents)
    }
}

/// The default verify policy body: green releases 100%, red refunds.
pub fn default_policy() -> Value {
    json!({
        "mode": "automatic",
        "green": { "autoRelease": true, "releaseRatePct": 100 },
        "amber": { "autoRelease": false, "releaseRatePct": 0 },
        "red": { "autoRelease": true, "releaseRatePct": 0 },
    })
}

/// Build a signed reversal command body for `gate.reversal`.
pub fn signed_reversal_body(
    payer_key: &SigningPair,
    command_id: &str,
    gate_id: &str,
    receipt_id: &str,
    action: &str,
    evidence_refs: Vec<String>,
    provider_decision: Option<Value>,
) -> Value {
    let mut command = json!({
        "commandId": command_id,
        "sponsorRef": "self",
        "agentKeyId": payer_key.key_id(),
        "target": { "gateId": gate_id, "receiptId": receipt_id },
        "action": action,
        "nonce": format!("nonce_{command_id}"),
        "idempotencyKey": format!("idem_cmd_{command_id}"),
        "exp": 9_999_999_999_999u64,
        "signatureBase64": "",
    });
    // Hash covers the command without its signature.
    let mut unsigned = command.clone();
    unsigned.as_object_mut().unwrap().remove("signatureBase64");
    let payload_hash = sk_01_canonical::hash_canonical(&unsigned).unwrap();
    command["signatureBase64"] = json!(payer_key.sign_hash_hex(&payload_hash).unwrap());

    let mut body = json!({ "command": command, "evidenceRefs": evidence_refs });
    if let Some(decision) = provider_decision {
        body["providerDecision"] = decision;
    }
    body
}
