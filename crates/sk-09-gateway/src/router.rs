//! Operation dispatch.
//!
//! Operations are organized by surface:
//! - Principal surface: `agent.*`, `wallet.*`, `run.*`
//! - Settlement surface: `gate.*`
//! - Dispute surface: `dispute.*`, `arbitration.*`, `workspace.*`
//! - Finance surface: `receipts.*`
//! - Federation surface: `federation.*`

use crate::request::OperationRequest;
use crate::service::SettlementKernel;
use serde_json::{json, Map, Value};
use sk_01_canonical::{canonical_string, check_allowed_keys, require_keys};
use sk_05_settlement::{evidence_request_hashes, CreateGateInput, VerifyInput};
use sk_06_reversal::{OpenDisputeInput, ReversalRequest};
use sk_07_artifacts::FederationEnvelopeKind;
use sk_08_policy::{BillableCounter, PolicyError};
use sk_crypto::PublicKey;
use sk_types::{ApiError, PageCursor, RunStatus};

/// Operations that mutate state and therefore demand an idempotency key.
pub fn is_mutation(op: &str) -> bool {
    matches!(
        op,
        "agent.register"
            | "wallet.credit"
            | "run.create"
            | "run.append_event"
            | "gate.create"
            | "gate.authorize_payment"
            | "gate.verify"
            | "gate.reversal"
            | "dispute.open"
            | "dispute.close"
            | "arbitration.open"
            | "arbitration.verdict"
            | "arbitration.close"
            | "arbitration.appeal"
    )
}

/// The exclusive-lock subject of an operation, when it has one.
pub fn subject_of(op: &str, body: &Value) -> Option<String> {
    let field = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    match op {
        "run.create" | "run.get" | "run.events" | "run.append_event" => {
            field("runId").map(|id| format!("run/{id}"))
        }
        "gate.create" => field("runId").map(|id| format!("run/{id}")),
        "gate.authorize_payment" | "gate.verify" => field("gateId").map(|id| format!("gate/{id}")),
        "gate.reversal" => body
            .get("command")
            .and_then(|c| c.get("target"))
            .and_then(|t| t.get("gateId"))
            .and_then(Value::as_str)
            .map(|id| format!("gate/{id}")),
        "reversal.events" => field("gateId").map(|id| format!("gate/{id}")),
        "dispute.open" => field("runId").map(|id| format!("run/{id}")),
        "dispute.close" | "arbitration.open" => field("disputeId").map(|id| format!("dispute/{id}")),
        "arbitration.verdict" | "arbitration.close" | "workspace.case_view" => {
            field("caseId").map(|id| format!("case/{id}"))
        }
        "arbitration.appeal" => field("parentCaseId").map(|id| format!("case/{id}")),
        "wallet.credit" => field("agentId").map(|id| format!("wallet/{id}")),
        _ => None,
    }
}

/// Dispatch a normalized operation.
pub async fn route(
    kernel: &SettlementKernel,
    tenant_id: &str,
    request: &OperationRequest,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    match request.op.as_str() {
        "agent.register" => agent_register(kernel, tenant_id, body),
        "wallet.credit" => wallet_credit(kernel, tenant_id, body, now_ms),
        "run.create" => run_create(kernel, tenant_id, body),
        "run.get" => run_get(kernel, tenant_id, body),
        "run.events" => run_events(kernel, tenant_id, body),
        "run.append_event" => run_append_event(kernel, tenant_id, request, body, now_ms),
        "gate.create" => gate_create(kernel, tenant_id, body, now_ms),
        "gate.authorize_payment" => gate_authorize(kernel, tenant_id, body, now_ms),
        "gate.verify" => gate_verify(kernel, tenant_id, body, now_ms),
        "gate.reversal" => gate_reversal(kernel, tenant_id, body, now_ms),
        "reversal.events" => reversal_events(kernel, tenant_id, body),
        "reversal.event" => reversal_event(kernel, tenant_id, body),
        "dispute.open" => dispute_open(kernel, tenant_id, body, now_ms),
        "dispute.close" => dispute_close(kernel, tenant_id, body, now_ms),
        "arbitration.open" => arbitration_open(kernel, tenant_id, body, now_ms),
        "arbitration.verdict" => arbitration_verdict(kernel, tenant_id, body, now_ms),
        "arbitration.close" => arbitration_close(kernel, tenant_id, body, now_ms),
        "arbitration.appeal" => arbitration_appeal(kernel, tenant_id, body, now_ms),
        "workspace.case_view" => workspace_case_view(kernel, tenant_id, body),
        "receipts.list" => receipts_list(kernel, tenant_id, body),
        "receipts.export" => receipts_export(kernel, tenant_id),
        "federation.invoke" => federation(kernel, body, FederationEnvelopeKind::Invoke),
        "federation.result" => federation(kernel, body, FederationEnvelopeKind::Result),
        other => Err(ApiError::new(
            404,
            "UNKNOWN_OPERATION",
            format!("unknown operation {other}"),
        )),
    }
}

// ---------------------------------------------------------------------
// principal surface
// ---------------------------------------------------------------------

fn agent_register(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(
        map,
        &["agentId", "displayName", "owner", "capabilities", "publicKeyBase64", "currency"],
    )?;
    required(map, &["agentId", "displayName", "owner"])?;
    let agent_id = str_field(map, "agentId")?;
    let capabilities = map
        .get("capabilities")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let public_key = match map.get("publicKeyBase64").and_then(Value::as_str) {
        Some(b64) => Some(PublicKey::from_base64(b64).map_err(|e| {
            ApiError::schema_invalid("/publicKeyBase64", e.to_string())
        })?),
        None => None,
    };
    let currency = map
        .get("currency")
        .and_then(Value::as_str)
        .unwrap_or("USD");

    let agent = kernel.directory().register(
        tenant_id,
        &agent_id,
        &str_field(map, "displayName")?,
        &str_field(map, "owner")?,
        capabilities,
        public_key,
    );
    let wallet = match kernel.wallets().create_wallet(tenant_id, &agent_id, currency) {
        Ok(wallet) => wallet,
        // Re-registration keeps the existing wallet.
        Err(e) if e.code() == "WALLET_EXISTS" => kernel
            .wallets()
            .get(tenant_id, &agent_id)
            .map_err(api_wallet)?,
        Err(e) => return Err(api_wallet(e)),
    };
    Ok(json!({ "agent": agent, "wallet": wallet }))
}

fn wallet_credit(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["agentId", "amountCents"])?;
    required(map, &["agentId", "amountCents"])?;
    let agent_id = str_field(map, "agentId")?;
    let amount_cents = u64_field(map, "amountCents")?;

    // Credits are externally-triggered; they still chain on the wallet's
    // own subject so the journal binds a real event.
    let appended = kernel
        .ledger()
        .append_event(
            tenant_id,
            &format!("wallet/{agent_id}"),
            None,
            "funds_credited",
            json!({ "agentId": agent_id, "amountCents": amount_cents }),
            now_ms,
        )
        .map_err(api_ledger)?;
    let wallet = kernel
        .wallets()
        .credit(tenant_id, &agent_id, amount_cents, &appended.last_chain_hash, now_ms)
        .map_err(api_wallet)?;
    Ok(json!({ "wallet": wallet, "event": appended.event }))
}

fn run_create(kernel: &SettlementKernel, tenant_id: &str, body: &Value) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["runId"])?;
    required(map, &["runId"])?;
    let run = kernel
        .ledger()
        .create_run(tenant_id, &str_field(map, "runId")?)
        .map_err(api_ledger)?;
    Ok(json!({ "run": run }))
}

fn run_get(kernel: &SettlementKernel, tenant_id: &str, body: &Value) -> Result<Value, ApiError> {
    let map = obj(body)?;
    required(map, &["runId"])?;
    let run = kernel
        .ledger()
        .get_run(tenant_id, &str_field(map, "runId")?)
        .map_err(api_ledger)?;
    Ok(json!({ "run": run }))
}

fn run_events(kernel: &SettlementKernel, tenant_id: &str, body: &Value) -> Result<Value, ApiError> {
    let map = obj(body)?;
    required(map, &["runId"])?;
    let run_id = str_field(map, "runId")?;
    kernel.ledger().get_run(tenant_id, &run_id).map_err(api_ledger)?;
    let events = kernel
        .ledger()
        .list_events(tenant_id, &format!("run/{run_id}"));
    Ok(json!({ "events": events }))
}

fn run_append_event(
    kernel: &SettlementKernel,
    tenant_id: &str,
    request: &OperationRequest,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["runId", "type", "payload"])?;
    required(map, &["runId", "type"])?;
    let run_id = str_field(map, "runId")?;
    let event_type = str_field(map, "type")?;
    let payload = map.get("payload").cloned().unwrap_or(Value::Null);

    let run = kernel.ledger().get_run(tenant_id, &run_id).map_err(api_ledger)?;
    let outcome = kernel
        .ledger()
        .append_event(
            tenant_id,
            &format!("run/{run_id}"),
            request.headers.expected_prev_chain_hash.as_deref(),
            &event_type,
            payload,
            now_ms,
        )
        .map_err(api_ledger)?;
    if run.status == RunStatus::Created {
        kernel
            .ledger()
            .set_run_status(tenant_id, &run_id, RunStatus::InProgress)
            .map_err(api_ledger)?;
    }
    Ok(json!({ "event": outcome.event, "lastChainHash": outcome.last_chain_hash }))
}

// ---------------------------------------------------------------------
// settlement surface
// ---------------------------------------------------------------------

fn gate_create(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(
        map,
        &[
            "gateId",
            "runId",
            "payerAgentId",
            "payeeAgentId",
            "amountCents",
            "currency",
            "toolId",
            "providerId",
            "agreementId",
            "agentPassport",
        ],
    )?;
    required(
        map,
        &["gateId", "runId", "payerAgentId", "payeeAgentId", "amountCents", "currency", "toolId"],
    )?;
    let input: CreateGateInput = parse(body)?;
    let gate = kernel
        .engine()
        .create_gate(tenant_id, input, now_ms)
        .map_err(api_settlement)?;
    Ok(json!({ "gate": gate }))
}

fn gate_authorize(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["gateId", "sponsorDecisionToken"])?;
    required(map, &["gateId"])?;
    let gate_id = str_field(map, "gateId")?;
    let gate = kernel.engine().gate(tenant_id, &gate_id).map_err(api_settlement)?;

    kernel
        .gatekeeper()
        .check_authorization(
            tenant_id,
            &gate.payer_agent_id,
            gate.amount_cents,
            &gate.currency,
            &gate.tool_id,
            gate.provider_id.as_deref(),
            gate.agent_passport.as_ref().and_then(|p| p.delegation_depth),
            now_ms,
        )
        .map_err(api_policy)?;

    let gate = kernel
        .engine()
        .authorize_payment(tenant_id, &gate_id, map.get("sponsorDecisionToken"), now_ms)
        .map_err(api_settlement)?;
    kernel
        .gatekeeper()
        .commit_authorization(tenant_id, &gate.payer_agent_id, gate.amount_cents, now_ms);
    Ok(json!({ "gate": gate }))
}

fn gate_verify(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(
        map,
        &[
            "gateId",
            "verificationStatus",
            "policy",
            "verificationMethod",
            "evidenceRefs",
            "providerResponse",
            "providerSignature",
            "providerQuotePayload",
            "quoteSha256",
            "providerQuoteSignature",
            "operatorReleaseRatePct",
        ],
    )?;
    required(map, &["gateId", "verificationStatus", "policy"])?;
    let gate_id = str_field(map, "gateId")?;
    let input: VerifyInput = parse(body)?;

    let gate = kernel.engine().gate(tenant_id, &gate_id).map_err(api_settlement)?;
    let wallet_policy = kernel.gatekeeper().policy_for(tenant_id, &gate.payer_agent_id);
    if wallet_policy.require_quote && input.provider_quote_payload.is_none() {
        return Err(api_policy(PolicyError::QuoteRequired));
    }
    if wallet_policy.require_strict_request_binding
        && evidence_request_hashes(&input.evidence_refs).is_empty()
    {
        return Err(api_policy(PolicyError::StrictBindingRequired));
    }

    // Hard billing limits reject before the transition; actual counters
    // commit after it succeeds.
    if kernel.config().billing_enforced {
        kernel
            .gatekeeper()
            .check_billable(tenant_id, now_ms, BillableCounter::VerifiedRun)
            .map_err(api_policy)?;
        kernel
            .gatekeeper()
            .check_billable(tenant_id, now_ms, BillableCounter::SettledVolume(gate.amount_cents))
            .map_err(api_policy)?;
    }

    let outcome = kernel
        .engine()
        .verify(tenant_id, &gate_id, input, now_ms)
        .map_err(api_settlement)?;

    if kernel.config().billing_enforced && outcome.receipt.is_some() {
        kernel
            .gatekeeper()
            .record_billable(tenant_id, now_ms, BillableCounter::VerifiedRun)
            .map_err(api_policy)?;
        kernel
            .gatekeeper()
            .record_billable(
                tenant_id,
                now_ms,
                BillableCounter::SettledVolume(outcome.gate.released_cents),
            )
            .map_err(api_policy)?;
    }
    Ok(json!({ "gate": outcome.gate, "receipt": outcome.receipt }))
}

fn gate_reversal(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["command", "evidenceRefs", "providerDecision"])?;
    required(map, &["command"])?;
    let request: ReversalRequest = parse(body)?;
    let outcome = kernel
        .processor()
        .process(tenant_id, &request, now_ms, now_ms)
        .map_err(api_reversal)?;
    Ok(outcome)
}

fn reversal_events(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    required(map, &["gateId"])?;
    let events = kernel
        .processor()
        .list_events(tenant_id, &str_field(map, "gateId")?);
    Ok(json!({ "events": events }))
}

fn reversal_event(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    required(map, &["gateId", "eventId"])?;
    let event = kernel
        .processor()
        .get_event(tenant_id, &str_field(map, "gateId")?, &str_field(map, "eventId")?)
        .map_err(api_reversal)?;
    Ok(json!({ "event": event }))
}

// ---------------------------------------------------------------------
// dispute surface
// ---------------------------------------------------------------------

fn dispute_open(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(
        map,
        &[
            "runId",
            "openedBy",
            "settlementGateId",
            "evidenceRefs",
            "disputeType",
            "disputePriority",
            "disputeChannel",
            "escalationLevel",
        ],
    )?;
    required(map, &["runId", "openedBy"])?;
    let run_id = str_field(map, "runId")?;
    let input: OpenDisputeInput = parse(body)?;
    let dispute = kernel
        .desk()
        .open_dispute(tenant_id, &run_id, input, now_ms)
        .map_err(api_reversal)?;
    Ok(json!({ "dispute": dispute }))
}

fn dispute_close(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["disputeId", "evidenceRefs"])?;
    required(map, &["disputeId"])?;
    let evidence = string_list(map, "evidenceRefs");
    let dispute = kernel
        .desk()
        .close_dispute(tenant_id, &str_field(map, "disputeId")?, &evidence, now_ms)
        .map_err(api_reversal)?;
    Ok(json!({ "dispute": dispute }))
}

fn arbitration_open(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["disputeId", "arbiterAgentId"])?;
    required(map, &["disputeId", "arbiterAgentId"])?;

    if kernel.config().billing_enforced {
        kernel
            .gatekeeper()
            .check_billable(tenant_id, now_ms, BillableCounter::ArbitrationCase)
            .map_err(api_policy)?;
    }
    let case = kernel
        .desk()
        .open_case(
            tenant_id,
            &str_field(map, "disputeId")?,
            &str_field(map, "arbiterAgentId")?,
            now_ms,
        )
        .map_err(api_reversal)?;
    if kernel.config().billing_enforced {
        kernel
            .gatekeeper()
            .record_billable(tenant_id, now_ms, BillableCounter::ArbitrationCase)
            .map_err(api_policy)?;
    }
    Ok(json!({ "case": case }))
}

fn arbitration_verdict(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["caseId", "verdict"])?;
    required(map, &["caseId", "verdict"])?;
    let verdict = map.get("verdict").cloned().unwrap_or(Value::Null);
    let case = kernel
        .desk()
        .issue_verdict(tenant_id, &str_field(map, "caseId")?, &verdict, now_ms)
        .map_err(api_reversal)?;
    Ok(json!({ "case": case }))
}

fn arbitration_close(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["caseId"])?;
    required(map, &["caseId"])?;
    let case = kernel
        .desk()
        .close_case(tenant_id, &str_field(map, "caseId")?, now_ms)
        .map_err(api_reversal)?;
    Ok(json!({ "case": case }))
}

fn arbitration_appeal(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
    now_ms: u64,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["parentCaseId", "arbiterAgentId", "evidenceRefs"])?;
    required(map, &["parentCaseId", "arbiterAgentId"])?;
    let evidence = string_list(map, "evidenceRefs");
    let case = kernel
        .desk()
        .open_appeal(
            tenant_id,
            &str_field(map, "parentCaseId")?,
            &str_field(map, "arbiterAgentId")?,
            &evidence,
            now_ms,
        )
        .map_err(api_reversal)?;
    Ok(json!({ "case": case }))
}

fn workspace_case_view(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    required(map, &["caseId"])?;
    let view = kernel
        .desk()
        .case_view(tenant_id, &str_field(map, "caseId")?)
        .map_err(api_reversal)?;
    Ok(serde_json::to_value(view).unwrap_or(Value::Null))
}

// ---------------------------------------------------------------------
// finance surface
// ---------------------------------------------------------------------

fn receipts_list(
    kernel: &SettlementKernel,
    tenant_id: &str,
    body: &Value,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(
        map,
        &["toolId", "runId", "agreementId", "receiptId", "cursor", "limit"],
    )?;
    let limit = map
        .get("limit")
        .and_then(Value::as_u64)
        .unwrap_or(50)
        .min(200) as usize;
    let cursor = match map.get("cursor").and_then(Value::as_str) {
        Some(raw) => Some(
            PageCursor::decode(raw)
                .map_err(|_| ApiError::schema_invalid("/cursor", "invalid cursor"))?,
        ),
        None => None,
    };
    let tool_id = map.get("toolId").and_then(Value::as_str);
    let run_id = map.get("runId").and_then(Value::as_str);
    let agreement_id = map.get("agreementId").and_then(Value::as_str);
    let receipt_id = map.get("receiptId").and_then(Value::as_str);

    let mut matched = kernel
        .engine()
        .receipt_index(tenant_id)
        .into_iter()
        .filter(|entry| {
            tool_id.map_or(true, |t| entry.tool_id == t)
                && run_id.map_or(true, |r| entry.run_id == r)
                && agreement_id.map_or(true, |a| entry.agreement_id.as_deref() == Some(a))
                && receipt_id.map_or(true, |r| entry.receipt_id == r)
        })
        .collect::<Vec<_>>();
    if let Some(cursor) = &cursor {
        matched.retain(|entry| {
            (entry.issued_at_ms, entry.receipt_id.as_str())
                > (cursor.issued_at_ms, cursor.id.as_str())
        });
    }
    let has_more = matched.len() > limit;
    matched.truncate(limit);

    let next_cursor = if has_more {
        matched.last().map(|entry| {
            PageCursor {
                issued_at_ms: entry.issued_at_ms,
                id: entry.receipt_id.clone(),
            }
            .encode()
        })
    } else {
        None
    };
    let receipts = matched
        .iter()
        .map(|entry| {
            kernel
                .engine()
                .receipt_envelope(tenant_id, &entry.receipt_id)
                .map_err(api_settlement)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "receipts": receipts, "nextCursor": next_cursor }))
}

fn receipts_export(kernel: &SettlementKernel, tenant_id: &str) -> Result<Value, ApiError> {
    let mut lines = String::new();
    let index = kernel.engine().receipt_index(tenant_id);
    for entry in &index {
        let envelope = kernel
            .engine()
            .receipt_envelope(tenant_id, &entry.receipt_id)
            .map_err(api_settlement)?;
        let line = canonical_string(&envelope)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        lines.push_str(&line);
        lines.push('\n');
    }
    Ok(json!({ "ndjson": lines, "count": index.len() }))
}

// ---------------------------------------------------------------------
// federation surface
// ---------------------------------------------------------------------

fn federation(
    kernel: &SettlementKernel,
    body: &Value,
    kind: FederationEnvelopeKind,
) -> Result<Value, ApiError> {
    let map = obj(body)?;
    allowed(map, &["envelope"])?;
    required(map, &["envelope"])?;
    let envelope = map.get("envelope").cloned().unwrap_or(Value::Null);
    let core = kernel
        .trust()
        .verify_envelope(&envelope, kind)
        .map_err(api_artifact)?;
    Ok(json!({ "verified": true, "kind": kind, "core": core }))
}

// ---------------------------------------------------------------------
// body helpers
// ---------------------------------------------------------------------

fn obj(body: &Value) -> Result<&Map<String, Value>, ApiError> {
    body.as_object()
        .ok_or_else(|| ApiError::schema_invalid("", "body must be an object"))
}

fn allowed(map: &Map<String, Value>, keys: &[&str]) -> Result<(), ApiError> {
    check_allowed_keys(map, keys, "").map_err(api_canonical)
}

fn required(map: &Map<String, Value>, keys: &[&str]) -> Result<(), ApiError> {
    require_keys(map, keys, "").map_err(api_canonical)
}

fn str_field(map: &Map<String, Value>, key: &str) -> Result<String, ApiError> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::schema_invalid(&format!("/{key}"), "expected a string"))
}

fn u64_field(map: &Map<String, Value>, key: &str) -> Result<u64, ApiError> {
    map.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| ApiError::schema_invalid(&format!("/{key}"), "expected a non-negative integer"))
}

fn string_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse<T: serde::de::DeserializeOwned>(body: &Value) -> Result<T, ApiError> {
    serde_json::from_value(body.clone())
        .map_err(|e| ApiError::schema_invalid("", e.to_string()))
}

// ---------------------------------------------------------------------
// error mapping
// ---------------------------------------------------------------------

fn api_canonical(e: sk_01_canonical::CanonicalError) -> ApiError {
    ApiError::new(400, e.code(), e.to_string()).with_details(json!({ "path": e.path() }))
}

fn api_ledger(e: sk_03_event_ledger::LedgerError) -> ApiError {
    ApiError::new(e.http_status(), e.code(), e.to_string())
}

fn api_wallet(e: sk_04_wallet::WalletError) -> ApiError {
    ApiError::new(e.http_status(), e.code(), e.to_string())
}

fn api_settlement(e: sk_05_settlement::SettlementError) -> ApiError {
    ApiError::new(e.http_status(), e.code(), e.to_string())
}

fn api_reversal(e: sk_06_reversal::ReversalError) -> ApiError {
    ApiError::new(e.http_status(), e.code(), e.to_string())
}

fn api_policy(e: PolicyError) -> ApiError {
    ApiError::new(e.http_status(), e.code(), e.to_string())
}

fn api_artifact(e: sk_07_artifacts::ArtifactError) -> ApiError {
    ApiError::new(e.http_status(), e.code(), e.to_string())
}
