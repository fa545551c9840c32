//! Telemetry configuration.

/// Subscriber configuration, sourced from the environment.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive (e.g. `info`, `sk_09_gateway=debug`).
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `SK_LOG_LEVEL` and `SK_LOG_JSON`.
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("SK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            json_output: std::env::var("SK_LOG_JSON").is_ok(),
        }
    }
}
