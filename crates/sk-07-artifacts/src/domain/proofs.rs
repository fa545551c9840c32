//! Proof and pack builders.
//!
//! Every builder takes `generated_at` from the caller: pinned inputs give
//! byte-identical artifacts across reruns.

use crate::domain::errors::ArtifactError;
use serde_json::{json, Value};
use sk_02_envelope::seal;
use sk_03_event_ledger::LedgerEvent;
use sk_crypto::SigningPair;

/// Builds signed artifacts with a governance or server key.
pub struct ArtifactBuilder {
    key: SigningPair,
}

impl ArtifactBuilder {
    /// Create a builder signing with `key`.
    pub fn new(key: SigningPair) -> Self {
        Self { key }
    }

    /// Key id the builder signs with.
    pub fn key_id(&self) -> String {
        self.key.key_id()
    }

    /// `JobProof.v1`: binds a run's chain tail and its receipts.
    pub fn job_proof(
        &self,
        tenant_id: &str,
        run_id: &str,
        last_chain_hash: &str,
        event_count: usize,
        receipt_ids: &[String],
        generated_at: &str,
    ) -> Result<Value, ArtifactError> {
        let core = json!({
            "schemaVersion": "JobProof.v1",
            "tenantId": tenant_id,
            "runId": run_id,
            "lastChainHash": last_chain_hash,
            "eventCount": event_count,
            "receiptIds": receipt_ids,
            "generatedAt": generated_at,
        });
        Ok(seal(&core, "proofHash", &self.key)?)
    }

    /// `MonthProof.v1`: aggregate settlement figures for one month.
    #[allow(clippy::too_many_arguments)]
    pub fn month_proof(
        &self,
        tenant_id: &str,
        month: &str,
        receipt_count: u64,
        settled_volume_cents: u64,
        refunded_cents: u64,
        overage_milli_cents: u64,
        generated_at: &str,
    ) -> Result<Value, ArtifactError> {
        let core = json!({
            "schemaVersion": "MonthProof.v1",
            "tenantId": tenant_id,
            "month": month,
            "receiptCount": receipt_count,
            "settledVolumeCents": settled_volume_cents,
            "refundedCents": refunded_cents,
            "overageMilliCents": overage_milli_cents,
            "generatedAt": generated_at,
        });
        Ok(seal(&core, "proofHash", &self.key)?)
    }

    /// `FinancePack.v1`: the month proof plus its receipt envelopes.
    pub fn finance_pack(
        &self,
        tenant_id: &str,
        month: &str,
        receipts: &[Value],
        journal_entry_count: u64,
        generated_at: &str,
    ) -> Result<Value, ArtifactError> {
        let core = json!({
            "schemaVersion": "FinancePack.v1",
            "tenantId": tenant_id,
            "month": month,
            "receipts": receipts,
            "journalEntryCount": journal_entry_count,
            "generatedAt": generated_at,
        });
        Ok(seal(&core, "packHash", &self.key)?)
    }

    /// `SessionTranscript.v1`: a subject's full event chain.
    pub fn session_transcript(
        &self,
        tenant_id: &str,
        session: &str,
        events: &[LedgerEvent],
        generated_at: &str,
    ) -> Result<Value, ArtifactError> {
        let core = json!({
            "schemaVersion": "SessionTranscript.v1",
            "tenantId": tenant_id,
            "session": session,
            "events": events,
            "verification": {
                "chainVerified": true,
                "eventCount": events.len(),
            },
            "generatedAt": generated_at,
        });
        Ok(seal(&core, "transcriptHash", &self.key)?)
    }

    /// `SessionReplayPack.v1`: a transcript plus the retry trail of a
    /// forwarded invocation.
    pub fn session_replay_pack(
        &self,
        tenant_id: &str,
        session: &str,
        events: &[LedgerEvent],
        attempts: &[Value],
        generated_at: &str,
    ) -> Result<Value, ArtifactError> {
        let core = json!({
            "schemaVersion": "SessionReplayPack.v1",
            "tenantId": tenant_id,
            "session": session,
            "events": events,
            "attempts": attempts,
            "verification": {
                "chainVerified": true,
                "eventCount": events.len(),
            },
            "generatedAt": generated_at,
        });
        Ok(seal(&core, "packHash", &self.key)?)
    }
}
