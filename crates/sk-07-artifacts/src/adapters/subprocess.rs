//! Opaque pipe transport for conformance adapters.
//!
//! Adapters read a request on stdin and print their output on stdout.
//! Output is bounded, the process is killed at the deadline, and a non-zero
//! exit translates to a deterministic diagnostic.

use crate::domain::errors::ArtifactError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::warn;

/// Default adapter deadline.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
/// Default stdout/stderr cap.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 2 * 1024 * 1024;

/// How to launch an adapter.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Program to execute.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Kill deadline in milliseconds.
    pub timeout_ms: u64,
    /// stdout/stderr byte cap.
    pub max_output_bytes: usize,
}

impl AdapterConfig {
    /// Config with default deadline and output cap.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Captured adapter output.
#[derive(Debug, Clone)]
pub struct AdapterRun {
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

/// Run the adapter once, feeding `stdin_bytes`, enforcing the deadline and
/// output caps.
pub async fn run_adapter(
    config: &AdapterConfig,
    stdin_bytes: &[u8],
) -> Result<AdapterRun, ArtifactError> {
    let mut child = Command::new(&config.program)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ArtifactError::AdapterExecFailed {
            detail: format!("spawn failed: {e}"),
        })?;

    let mut stdin = child.stdin.take().ok_or_else(|| ArtifactError::AdapterExecFailed {
        detail: "stdin unavailable".to_string(),
    })?;
    let mut stdout = child.stdout.take().ok_or_else(|| ArtifactError::AdapterExecFailed {
        detail: "stdout unavailable".to_string(),
    })?;
    let mut stderr = child.stderr.take().ok_or_else(|| ArtifactError::AdapterExecFailed {
        detail: "stderr unavailable".to_string(),
    })?;

    let input = stdin_bytes.to_vec();
    let writer = tokio::spawn(async move {
        let _ = stdin.write_all(&input).await;
        // Dropping stdin closes the pipe so the adapter sees EOF.
        drop(stdin);
    });

    let max = config.max_output_bytes;
    let run = async {
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let out_read = read_bounded(&mut stdout, &mut out_buf, max);
        let err_read = read_bounded(&mut stderr, &mut err_buf, max);
        let (out_ok, err_ok) = tokio::join!(out_read, err_read);
        let status = child.wait().await.map_err(|e| ArtifactError::AdapterExecFailed {
            detail: format!("wait failed: {e}"),
        })?;
        out_ok?;
        err_ok?;
        if !status.success() {
            return Err(ArtifactError::AdapterExecFailed {
                detail: format!(
                    "exit status {:?}: {}",
                    status.code(),
                    String::from_utf8_lossy(&err_buf)
                ),
            });
        }
        Ok(AdapterRun {
            stdout: out_buf,
            stderr: err_buf,
        })
    };

    let result = match tokio::time::timeout(Duration::from_millis(config.timeout_ms), run).await {
        Ok(result) => result,
        Err(_) => {
            warn!(program = %config.program, timeout_ms = config.timeout_ms, "adapter killed at deadline");
            // SIGKILL via the tokio child handle.
            return Err(ArtifactError::AdapterTimeout {
                timeout_ms: config.timeout_ms,
            });
        }
    };
    writer.abort();
    result
}

async fn read_bounded<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<(), ArtifactError> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| ArtifactError::AdapterExecFailed {
                detail: format!("read failed: {e}"),
            })?;
        if n == 0 {
            return Ok(());
        }
        if buf.len() + n > max_bytes {
            return Err(ArtifactError::AdapterOutputTooLarge { max_bytes });
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> AdapterConfig {
        AdapterConfig::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn echo_adapter_round_trips() {
        let run = run_adapter(&sh("cat"), b"{\"a\":1}").await.unwrap();
        assert_eq!(run.stdout, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn nonzero_exit_is_exec_failed() {
        let err = run_adapter(&sh("echo boom >&2; exit 3"), b"").await.unwrap_err();
        assert_eq!(err.code(), "ADAPTER_EXEC_FAILED");
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn deadline_kills_the_adapter() {
        let mut config = sh("sleep 5");
        config.timeout_ms = 100;
        let err = run_adapter(&config, b"").await.unwrap_err();
        assert_eq!(err.code(), "ADAPTER_TIMEOUT");
    }

    #[tokio::test]
    async fn output_cap_enforced() {
        let mut config = sh("head -c 4096 /dev/zero");
        config.max_output_bytes = 1024;
        let err = run_adapter(&config, b"").await.unwrap_err();
        assert_eq!(err.code(), "ADAPTER_OUTPUT_TOO_LARGE");
    }
}
