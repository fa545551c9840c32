//! # Settlement Kernel Service
//!
//! Wires every subsystem and runs the request pipeline. One instance per
//! process; all state lives behind the subsystem services.

use crate::config::KernelConfig;
use crate::directory::AgentDirectory;
use crate::request::OperationRequest;
use crate::router;
use crate::tokens::{required_scope, OpsTokenRegistry};
use dashmap::DashMap;
use serde_json::{json, Value};
use sk_01_canonical::{hash_canonical, normalize};
use sk_02_envelope::{AgentKeyDirectory, InMemoryKeyRegistry, KeyRegistry};
use sk_03_event_ledger::{EventLedger, IdempotencyProbe, IdempotencyStore, InMemoryEventStore};
use sk_04_wallet::WalletLedger;
use sk_05_settlement::SettlementEngine;
use sk_06_reversal::{ArbitrationDesk, ReversalProcessor};
use sk_07_artifacts::{AdapterConfig, ArtifactBuilder, TrustRegistry};
use sk_08_policy::PolicyGatekeeper;
use sk_crypto::SigningPair;
use sk_types::ApiError;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, Semaphore};
use tracing::info;

/// The orchestrator.
pub struct SettlementKernel {
    config: KernelConfig,
    registry: Arc<InMemoryKeyRegistry>,
    directory: Arc<AgentDirectory>,
    wallets: Arc<WalletLedger>,
    ledger: Arc<EventLedger>,
    engine: Arc<SettlementEngine>,
    processor: Arc<ReversalProcessor>,
    desk: Arc<ArbitrationDesk>,
    gatekeeper: Arc<PolicyGatekeeper>,
    trust: Arc<TrustRegistry>,
    artifacts: Arc<ArtifactBuilder>,
    tokens: Arc<OpsTokenRegistry>,
    idempotency: Arc<IdempotencyStore>,
    tenant_permits: DashMap<String, Arc<Semaphore>>,
    subject_locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl SettlementKernel {
    /// Wire a kernel with a fresh server signing key.
    pub fn new(config: KernelConfig) -> Result<Self, ApiError> {
        config
            .validate()
            .map_err(|reason| ApiError::new(500, "CONFIG_INVALID", reason))?;

        let registry = Arc::new(InMemoryKeyRegistry::new());
        let directory = Arc::new(AgentDirectory::new(Arc::clone(&registry)));
        let wallets = Arc::new(WalletLedger::new());
        let ledger = Arc::new(EventLedger::new(Arc::new(InMemoryEventStore::new())));
        let gatekeeper = Arc::new(PolicyGatekeeper::new());

        let engine = Arc::new(SettlementEngine::new(
            Arc::clone(&wallets),
            Arc::clone(&ledger),
            registry.clone() as Arc<dyn KeyRegistry>,
            registry.clone() as Arc<dyn AgentKeyDirectory>,
            SigningPair::generate(),
        ));
        let processor = Arc::new(ReversalProcessor::new(
            Arc::clone(&engine),
            Arc::clone(&ledger),
            registry.clone() as Arc<dyn KeyRegistry>,
            registry.clone() as Arc<dyn AgentKeyDirectory>,
            Arc::clone(&gatekeeper),
        ));
        let desk = Arc::new(ArbitrationDesk::new(
            Arc::clone(&engine),
            Arc::clone(&ledger),
            registry.clone() as Arc<dyn KeyRegistry>,
            registry.clone() as Arc<dyn AgentKeyDirectory>,
        ));

        Ok(Self {
            config,
            registry,
            directory,
            wallets,
            ledger,
            engine,
            processor,
            desk,
            gatekeeper,
            trust: Arc::new(TrustRegistry::new()),
            artifacts: Arc::new(ArtifactBuilder::new(SigningPair::generate())),
            tokens: Arc::new(OpsTokenRegistry::new()),
            idempotency: Arc::new(IdempotencyStore::new()),
            tenant_permits: DashMap::new(),
            subject_locks: DashMap::new(),
        })
    }

    /// Handle one operation at the current wall-clock time.
    pub async fn handle(&self, request: OperationRequest) -> Result<Value, ApiError> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.handle_at(request, now_ms).await
    }

    /// Handle one operation with an injected clock (tests pin this).
    pub async fn handle_at(
        &self,
        request: OperationRequest,
        now_ms: u64,
    ) -> Result<Value, ApiError> {
        // 1. Tenant.
        let tenant_id = request
            .headers
            .tenant_id
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::new(400, "TENANT_REQUIRED", "missing x-proxy-tenant-id"))?;

        // 2. Schema normalization.
        let body = normalize(&request.body)
            .map_err(|e| ApiError::new(400, e.code(), e.to_string())
                .with_details(json!({ "path": e.path() })))?;
        let request_hash = hash_canonical(&json!({ "op": request.op, "body": body }))
            .map_err(|e| ApiError::internal(e.to_string()))?;

        // 3. Idempotency probe.
        if let Some(key) = &request.headers.idempotency_key {
            match self.idempotency.probe(&tenant_id, key, &request_hash) {
                IdempotencyProbe::Replay(stored) => {
                    info!(tenant_id = %tenant_id, op = %request.op, idempotency_key = %key, "idempotent replay");
                    return Ok(stored);
                }
                IdempotencyProbe::Conflict => {
                    return Err(ApiError::new(
                        409,
                        "IDEMPOTENCY_BODY_MISMATCH",
                        "idempotency key reused with a different request body",
                    ));
                }
                IdempotencyProbe::Miss => {}
            }
        } else if router::is_mutation(&request.op) {
            return Err(ApiError::new(
                400,
                "IDEMPOTENCY_KEY_REQUIRED",
                "mutating operations require x-idempotency-key",
            ));
        }

        // 4. Ops-token scopes.
        if let Some(scope) = required_scope(&request.op) {
            let token = request.headers.ops_token.as_deref().ok_or_else(|| {
                ApiError::new(401, "OPS_TOKEN_REQUIRED", "missing x-proxy-ops-token")
            })?;
            if !self.tokens.is_known(&tenant_id, token) {
                return Err(ApiError::new(401, "OPS_TOKEN_REQUIRED", "unknown ops token"));
            }
            if !self.tokens.has_scope(&tenant_id, token, scope) {
                return Err(ApiError::new(
                    403,
                    "OPS_SCOPE_DENIED",
                    format!("token lacks scope {}", scope.as_str()),
                ));
            }
        }

        // 5. Per-tenant concurrency permit.
        let permits = self
            .tenant_permits
            .entry(tenant_id.clone())
            .or_insert_with(|| {
                Arc::new(Semaphore::new(self.config.max_concurrent_per_tenant))
            })
            .clone();
        let _permit = permits.try_acquire().map_err(|_| {
            ApiError::new(
                503,
                "TENANT_CONCURRENCY_LIMIT",
                "tenant concurrency limit exceeded",
            )
        })?;

        // 6. Per-subject exclusive lock.
        let subject = router::subject_of(&request.op, &body);
        let _subject_guard = match &subject {
            Some(subject) => {
                let lock = self
                    .subject_locks
                    .entry((tenant_id.clone(), subject.clone()))
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone();
                Some(lock.lock_owned().await)
            }
            None => None,
        };

        let chain_before = subject
            .as_deref()
            .map(|s| self.ledger.last_chain_hash(&tenant_id, s));

        // 7. Dispatch.
        let result = router::route(self, &tenant_id, &request, &body, now_ms).await;

        let chain_after = subject
            .as_deref()
            .map(|s| self.ledger.last_chain_hash(&tenant_id, s));
        let result_code = match &result {
            Ok(_) => "OK".to_string(),
            Err(e) => e.code.clone(),
        };
        info!(
            tenant_id = %tenant_id,
            op = %request.op,
            idempotency_key = request.headers.idempotency_key.as_deref().unwrap_or(""),
            subject = subject.as_deref().unwrap_or(""),
            result_code = %result_code,
            chain_hash_before = chain_before.as_deref().unwrap_or(""),
            chain_hash_after = chain_after.as_deref().unwrap_or(""),
            "operation handled"
        );

        // 8. Persist the idempotent response on success only; a failed
        // operation leaves the key free for a corrected retry.
        let response = result?;
        if let Some(key) = &request.headers.idempotency_key {
            self.idempotency
                .store(&tenant_id, key, request_hash, response.clone(), now_ms);
        }
        Ok(response)
    }

    // ------------------------------------------------------------------
    // wiring accessors (router + operators + tests)
    // ------------------------------------------------------------------

    /// Kernel configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Key registry.
    pub fn registry(&self) -> &Arc<InMemoryKeyRegistry> {
        &self.registry
    }

    /// Agent directory.
    pub fn directory(&self) -> &Arc<AgentDirectory> {
        &self.directory
    }

    /// Wallet ledger.
    pub fn wallets(&self) -> &Arc<WalletLedger> {
        &self.wallets
    }

    /// Event ledger.
    pub fn ledger(&self) -> &Arc<EventLedger> {
        &self.ledger
    }

    /// Settlement engine.
    pub fn engine(&self) -> &Arc<SettlementEngine> {
        &self.engine
    }

    /// Reversal processor.
    pub fn processor(&self) -> &Arc<ReversalProcessor> {
        &self.processor
    }

    /// Arbitration desk.
    pub fn desk(&self) -> &Arc<ArbitrationDesk> {
        &self.desk
    }

    /// Policy gatekeeper.
    pub fn gatekeeper(&self) -> &Arc<PolicyGatekeeper> {
        &self.gatekeeper
    }

    /// Federation trust registry.
    pub fn trust(&self) -> &Arc<TrustRegistry> {
        &self.trust
    }

    /// Artifact builder (proofs, packs).
    pub fn artifacts(&self) -> &Arc<ArtifactBuilder> {
        &self.artifacts
    }

    /// Ops-token registry.
    pub fn tokens(&self) -> &Arc<OpsTokenRegistry> {
        &self.tokens
    }

    // ------------------------------------------------------------------
    // transport-facing helpers
    // ------------------------------------------------------------------

    /// Verify an inbound webhook signature with the configured tolerance.
    pub fn verify_webhook(
        &self,
        secret: &[u8],
        ts: u64,
        body: &str,
        signature_hex: &str,
        now: u64,
    ) -> Result<(), ApiError> {
        sk_crypto::verify_webhook(
            secret,
            ts,
            body,
            signature_hex,
            now,
            self.config.webhook_tolerance_seconds,
        )
        .map_err(|e| ApiError::new(401, "WEBHOOK_SIGNATURE_INVALID", e.to_string()))
    }

    /// Adapter launch configuration carrying the kernel's deadline.
    pub fn adapter_config(&self, program: &str, args: Vec<String>) -> AdapterConfig {
        let mut config = AdapterConfig::new(program, args);
        config.timeout_ms = self.config.adapter_timeout_ms;
        config
    }
}
