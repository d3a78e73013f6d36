use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

pub use common::Environment;

pub const DEFAULT_MODEL_DIR: &str = "/opt/ml/model";
pub const DEFAULT_PORT: u16 = 8080;
/// 5 MiB
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServingConfig {
    pub environment: Environment,
    pub multi_model: bool,
    pub model_dir: PathBuf,
    pub bind_address: IpAddr,
    pub port: u16,
    pub max_request_size: usize,
    pub default_accept: String,
    pub otel_endpoint: Option<String>,
}

impl ServingConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let multi_model = common::env_flag("SAGEMAKER_MULTI_MODEL");

        let model_dir = env::var("SAGEMAKER_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_DIR));

        let port = env::var("SAGEMAKER_BIND_TO_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let max_request_size = env::var("SAGEMAKER_MAX_REQUEST_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_REQUEST_SIZE);

        let default_accept = env::var("SAGEMAKER_DEFAULT_INVOCATIONS_ACCEPT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| codec::content_types::JSON.to_string());

        let otel_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            environment,
            multi_model,
            model_dir,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            max_request_size,
            default_accept,
            otel_endpoint,
        })
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            multi_model: false,
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            default_accept: codec::content_types::JSON.to_string(),
            otel_endpoint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "SAGEMAKER_MULTI_MODEL",
        "SAGEMAKER_MODEL_DIR",
        "SAGEMAKER_BIND_TO_PORT",
        "SAGEMAKER_MAX_REQUEST_SIZE",
        "SAGEMAKER_DEFAULT_INVOCATIONS_ACCEPT",
        "OTEL_EXPORTER_OTLP_ENDPOINT",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = ServingConfig::from_env().unwrap();
        assert!(!config.multi_model);
        assert_eq!(config.model_dir, PathBuf::from("/opt/ml/model"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_request_size, 5 * 1024 * 1024);
        assert_eq!(config.default_accept, "application/json");
        assert!(config.otel_endpoint.is_none());
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        unsafe {
            env::set_var("SAGEMAKER_MULTI_MODEL", "true");
            env::set_var("SAGEMAKER_MODEL_DIR", "/models/iris");
            env::set_var("SAGEMAKER_BIND_TO_PORT", "9090");
            env::set_var("SAGEMAKER_MAX_REQUEST_SIZE", "1024");
            env::set_var("SAGEMAKER_DEFAULT_INVOCATIONS_ACCEPT", "text/csv");
            env::set_var("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317");
        }

        let config = ServingConfig::from_env().unwrap();
        assert!(config.multi_model);
        assert_eq!(config.model_dir, PathBuf::from("/models/iris"));
        assert_eq!(config.port, 9090);
        assert_eq!(config.max_request_size, 1024);
        assert_eq!(config.default_accept, "text/csv");
        assert_eq!(config.otel_endpoint.as_deref(), Some("http://collector:4317"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_numbers_fall_back() {
        clear_env();
        unsafe {
            env::set_var("SAGEMAKER_BIND_TO_PORT", "not-a-port");
            env::set_var("SAGEMAKER_MAX_REQUEST_SIZE", "-1");
            env::set_var("SAGEMAKER_MULTI_MODEL", "false");
        }

        let config = ServingConfig::from_env().unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_request_size, DEFAULT_MAX_REQUEST_SIZE);
        assert!(!config.multi_model);

        clear_env();
    }
}
