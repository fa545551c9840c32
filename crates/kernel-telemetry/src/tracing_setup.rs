//! Subscriber installation.

use crate::config::TelemetryConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Returns `Err` when a subscriber is already installed (tests install
/// their own); callers may ignore that case.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), String> {
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.json_output {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
    result.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_init_reports_instead_of_panicking() {
        let config = TelemetryConfig::default();
        let first = init_telemetry(&config);
        let second = init_telemetry(&config);
        // Whichever install wins, the second must fail gracefully.
        assert!(first.is_ok() || second.is_err());
    }
}
