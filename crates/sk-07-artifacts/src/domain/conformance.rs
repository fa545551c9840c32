//! Conformance report and cert-bundle records.

use crate::domain::errors::ArtifactError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sk_01_canonical::encode;

/// Schema tag for run reports.
pub const REPORT_SCHEMA_VERSION: &str = "ConformanceRunReport.v1";
/// Schema tag for cert bundles.
pub const CERT_SCHEMA_VERSION: &str = "ConformanceCertBundle.v1";

/// One vector of a conformance pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceCase {
    /// Case identifier.
    pub case_id: String,
    /// Invariants this case exercises.
    pub invariant_ids: Vec<String>,
    /// Bytes fed to the adapter on stdin (as a JSON value).
    pub request: Value,
    /// Expected canonical output.
    pub expected: Value,
}

/// Outcome of one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    /// Case identifier.
    pub case_id: String,
    /// Invariants the case exercises.
    pub invariant_ids: Vec<String>,
    /// Expected-output comparison passed.
    pub passed: bool,
    /// Two runs over the same stdin produced byte-equal canonical output.
    pub deterministic: bool,
    /// Canonical hash of the first run's output, when it parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_sha256: Option<String>,
    /// Failure diagnostics, empty on pass.
    pub diagnostics: Vec<String>,
}

/// Aggregate pass/fail figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Cases run.
    pub total: usize,
    /// Cases that passed both checks.
    pub passed: usize,
    /// Cases that failed either check.
    pub failed: usize,
}

/// Build the report core for sealing under `reportHash`.
pub fn report_core(
    pack: &str,
    cases_schema_version: &str,
    results: &[CaseResult],
    generated_at: &str,
) -> Value {
    let passed = results.iter().filter(|r| r.passed && r.deterministic).count();
    let summary = ReportSummary {
        total: results.len(),
        passed,
        failed: results.len() - passed,
    };
    json!({
        "schemaVersion": REPORT_SCHEMA_VERSION,
        "generatedAt": generated_at,
        "reportCore": {
            "pack": pack,
            "casesSchemaVersion": cases_schema_version,
            "summary": summary,
            "results": results,
        },
    })
}

/// Build the cert core for sealing under `certHash`; it embeds the report's
/// hash, schema version and core byte-for-byte.
pub fn cert_core(report_envelope: &Value, generated_at: &str) -> Result<Value, ArtifactError> {
    let report_hash = report_envelope
        .get("reportHash")
        .and_then(Value::as_str)
        .ok_or_else(|| ArtifactError::FederationEnvelopeInvalid {
            reason: "report envelope missing reportHash".to_string(),
        })?;
    let report_core = report_envelope.get("reportCore").cloned().ok_or_else(|| {
        ArtifactError::FederationEnvelopeInvalid {
            reason: "report envelope missing reportCore".to_string(),
        }
    })?;
    let report_schema_version = report_envelope
        .get("schemaVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(json!({
        "schemaVersion": CERT_SCHEMA_VERSION,
        "generatedAt": generated_at,
        "certCore": {
            "reportSchemaVersion": report_schema_version,
            "reportHash": report_hash,
            "reportCore": report_core,
        },
    }))
}

/// Strict cross-validation of a report/cert pair.
///
/// Recomputes both envelope hashes and checks every pairing; all broken
/// pairings are enumerated in the error.
pub fn validate_cert_pairing(
    report_envelope: &Value,
    cert_envelope: &Value,
) -> Result<(), ArtifactError> {
    let mut diagnostics = Vec::new();

    check_envelope_hash(report_envelope, "reportHash", &mut diagnostics);
    check_envelope_hash(cert_envelope, "certHash", &mut diagnostics);

    let report_hash = report_envelope.get("reportHash").and_then(Value::as_str);
    let cert_core = cert_envelope.get("certCore");

    match cert_core {
        None => diagnostics.push("cert envelope missing certCore".to_string()),
        Some(cert_core) => {
            let cert_report_hash = cert_core.get("reportHash").and_then(Value::as_str);
            if cert_report_hash != report_hash {
                diagnostics.push(format!(
                    "certCore.reportHash {cert_report_hash:?} != report.reportHash {report_hash:?}"
                ));
            }

            let report_core = report_envelope.get("reportCore");
            let cert_report_core = cert_core.get("reportCore");
            match (report_core, cert_report_core) {
                (Some(a), Some(b)) => {
                    let a_bytes = encode(a);
                    let b_bytes = encode(b);
                    match (a_bytes, b_bytes) {
                        (Ok(a_bytes), Ok(b_bytes)) if a_bytes == b_bytes => {}
                        (Ok(_), Ok(_)) => diagnostics
                            .push("certCore.reportCore differs from report.reportCore".to_string()),
                        _ => diagnostics.push("reportCore failed canonical encoding".to_string()),
                    }
                }
                _ => diagnostics.push("reportCore missing on one side".to_string()),
            }

            let report_schema = report_envelope.get("schemaVersion").and_then(Value::as_str);
            let cert_report_schema = cert_core.get("reportSchemaVersion").and_then(Value::as_str);
            if report_schema != cert_report_schema {
                diagnostics.push(format!(
                    "certCore.reportSchemaVersion {cert_report_schema:?} != report.schemaVersion {report_schema:?}"
                ));
            }
        }
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(ArtifactError::CertPairingInvalid { diagnostics })
    }
}

/// Recompute the canonical hash of an envelope minus its hash field and
/// signature; record a diagnostic on mismatch.
fn check_envelope_hash(envelope: &Value, hash_field: &str, diagnostics: &mut Vec<String>) {
    let Some(map) = envelope.as_object() else {
        diagnostics.push(format!("{hash_field} envelope is not an object"));
        return;
    };
    let Some(embedded) = map.get(hash_field).and_then(Value::as_str) else {
        diagnostics.push(format!("envelope missing {hash_field}"));
        return;
    };
    let mut core = map.clone();
    core.remove(hash_field);
    core.remove("signature");
    match sk_01_canonical::hash_canonical(&Value::Object(core)) {
        Ok(recomputed) if recomputed == embedded => {}
        Ok(recomputed) => diagnostics.push(format!(
            "{hash_field} mismatch: embedded {embedded}, recomputed {recomputed}"
        )),
        Err(e) => diagnostics.push(format!("{hash_field} core failed canonicalization: {e}")),
    }
}
