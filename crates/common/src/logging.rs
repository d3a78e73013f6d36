use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Identity, Layered, SubscriberExt},
    util::SubscriberInitExt,
};

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// Uses RUST_LOG environment variable for filtering (defaults to "info" if not set).
/// Use [`crate::TelemetryGuard::init`] instead when spans should also be exported.
pub fn setup_logging(environment: Environment) {
    init_subscriber(environment, Identity::new());
}

/// Installs the global subscriber: env filter, `extra` (e.g. an OpenTelemetry
/// layer), then the formatter picked by `environment`.
pub(crate) fn init_subscriber<L>(environment: Environment, extra: L)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter).with(extra);

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}
