use serving::{CodecRegistry, HandlerService, ServingConfig, logging::setup_logging, start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServingConfig::from_env()?;

    let _telemetry = setup_logging(&config)?;

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    let handlers = HandlerService::new(CodecRegistry::with_defaults());
    start_server(config, handlers).await
}
