use crate::config::ServingConfig;
use common::TelemetryGuard;

/// Installs the global subscriber. When an OTLP endpoint is configured the
/// returned guard keeps trace and metric export alive.
pub fn setup_logging(config: &ServingConfig) -> anyhow::Result<Option<TelemetryGuard>> {
    match &config.otel_endpoint {
        Some(endpoint) => Ok(Some(TelemetryGuard::init(
            "serving",
            endpoint,
            config.environment,
        )?)),
        None => {
            common::setup_logging(config.environment);
            Ok(None)
        }
    }
}
