//! Offline report/cert validator.
//!
//! ```text
//! sk-conformance <report.json> <cert.json>
//! ```
//!
//! Exit codes: 0 the pairing validates, 1 the pairing is broken, 2 usage
//! error.

use anyhow::Context;
use kernel_telemetry::{init_telemetry, TelemetryConfig};
use sk_07_artifacts::{validate_cert_pairing, ArtifactError};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let _ = init_telemetry(&TelemetryConfig::from_env());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [report_path, cert_path] = args.as_slice() else {
        eprintln!("usage: sk-conformance <report.json> <cert.json>");
        return ExitCode::from(2);
    };

    match run(report_path, cert_path) {
        Ok(()) => {
            println!("cert pairing OK");
            ExitCode::SUCCESS
        }
        Err(RunError::Usage(e)) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
        Err(RunError::Invalid(diagnostics)) => {
            for diagnostic in &diagnostics {
                error!(%diagnostic, "cert pairing broken");
                eprintln!("FAIL: {diagnostic}");
            }
            ExitCode::from(1)
        }
    }
}

enum RunError {
    Usage(anyhow::Error),
    Invalid(Vec<String>),
}

fn run(report_path: &str, cert_path: &str) -> Result<(), RunError> {
    let report = load(report_path).map_err(RunError::Usage)?;
    let cert = load(cert_path).map_err(RunError::Usage)?;
    match validate_cert_pairing(&report, &cert) {
        Ok(()) => Ok(()),
        Err(ArtifactError::CertPairingInvalid { diagnostics }) => {
            Err(RunError::Invalid(diagnostics))
        }
        Err(e) => Err(RunError::Invalid(vec![e.to_string()])),
    }
}

fn load(path: &str) -> anyhow::Result<serde_json::Value> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {path}"))
}
