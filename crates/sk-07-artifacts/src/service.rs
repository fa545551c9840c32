//! # Conformance Harness
//!
//! Runs each vector through an adapter subprocess twice with the same
//! stdin, compares canonical outputs (determinism check), compares against
//! the expected shape, and seals a `ConformanceRunReport.v1` plus its
//! `ConformanceCertBundle.v1`.

use crate::adapters::subprocess::{run_adapter, AdapterConfig};
use crate::domain::conformance::{cert_core, report_core, CaseResult, ConformanceCase};
use crate::domain::errors::ArtifactError;
use serde_json::Value;
use sk_01_canonical::{encode, hash_canonical};
use sk_02_envelope::seal;
use sk_crypto::SigningPair;
use tracing::info;

/// Conformance pack runner.
pub struct ConformanceHarness {
    signing_key: SigningPair,
}

impl ConformanceHarness {
    /// Create a harness signing reports with `signing_key`.
    pub fn new(signing_key: SigningPair) -> Self {
        Self { signing_key }
    }

    /// Load vectors from a JSON array value.
    pub fn load_cases(value: &Value) -> Result<Vec<ConformanceCase>, ArtifactError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            ArtifactError::FederationEnvelopeInvalid {
                reason: format!("invalid conformance cases: {e}"),
            }
        })
    }

    /// Run one case: adapter twice, determinism check, expected check.
    pub async fn run_case(&self, config: &AdapterConfig, case: &ConformanceCase) -> CaseResult {
        let stdin = match encode(&case.request) {
            Ok(bytes) => bytes,
            Err(e) => {
                return CaseResult {
                    case_id: case.case_id.clone(),
                    invariant_ids: case.invariant_ids.clone(),
                    passed: false,
                    deterministic: false,
                    output_sha256: None,
                    diagnostics: vec![format!("request failed canonicalization: {e}")],
                }
            }
        };

        let mut diagnostics = Vec::new();
        let mut outputs: Vec<Option<Vec<u8>>> = Vec::new();
        for attempt in 0..2 {
            match run_adapter(config, &stdin).await {
                Ok(run) => match serde_json::from_slice::<Value>(&run.stdout) {
                    Ok(parsed) => match encode(&parsed) {
                        Ok(canonical) => outputs.push(Some(canonical)),
                        Err(e) => {
                            diagnostics
                                .push(format!("attempt {attempt}: output not canonicalizable: {e}"));
                            outputs.push(None);
                        }
                    },
                    Err(e) => {
                        diagnostics.push(format!("attempt {attempt}: output not JSON: {e}"));
                        outputs.push(None);
                    }
                },
                Err(e) => {
                    diagnostics.push(format!("attempt {attempt}: {}: {e}", e.code()));
                    outputs.push(None);
                }
            }
        }

        let deterministic = match (&outputs[0], &outputs[1]) {
            (Some(a), Some(b)) if a == b => true,
            (Some(_), Some(_)) => {
                diagnostics.push("two runs over the same stdin diverged".to_string());
                false
            }
            _ => false,
        };

        let (passed, output_sha256) = match &outputs[0] {
            Some(canonical) => {
                let output_hash = sk_crypto::sha256_hex(canonical);
                let expected = encode(&case.expected).ok();
                let matches = expected.as_deref() == Some(canonical.as_slice());
                if !matches {
                    diagnostics.push("output does not match the expected shape".to_string());
                }
                (matches && deterministic, Some(output_hash))
            }
            None => (false, None),
        };

        CaseResult {
            case_id: case.case_id.clone(),
            invariant_ids: case.invariant_ids.clone(),
            passed,
            deterministic,
            output_sha256,
            diagnostics,
        }
    }

    /// Run a whole pack and seal the report. `generated_at` is pinned by
    /// the caller so reruns are byte-equal.
    pub async fn run_pack(
        &self,
        pack: &str,
        cases_schema_version: &str,
        cases: &[ConformanceCase],
        config: &AdapterConfig,
        generated_at: &str,
    ) -> Result<Value, ArtifactError> {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            results.push(self.run_case(config, case).await);
        }
        let core = report_core(pack, cases_schema_version, &results, generated_at);
        let envelope = seal(&core, "reportHash", &self.signing_key)?;
        info!(
            pack,
            total = results.len(),
            report_hash = %envelope["reportHash"].as_str().unwrap_or_default(),
            "conformance report sealed"
        );
        Ok(envelope)
    }

    /// Seal the cert bundle cross-referencing a sealed report.
    pub fn issue_cert(
        &self,
        report_envelope: &Value,
        generated_at: &str,
    ) -> Result<Value, ArtifactError> {
        let core = cert_core(report_envelope, generated_at)?;
        Ok(seal(&core, "certHash", &self.signing_key)?)
    }

    /// Canonical hash of any artifact's core (diagnostic helper).
    pub fn core_hash(value: &Value) -> Result<String, ArtifactError> {
        Ok(hash_canonical(value)?)
    }
}
