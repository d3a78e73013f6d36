use crate::config::ServingConfig;
use crate::errors::{InvocationError, StoreError};
use crate::handler::HandlerService;
use crate::models::{DEFAULT_MODEL_NAME, LoadedModel, ModelStore};
use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use codec::{CodecRegistry, content_types, normalize_media_type};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct InvocationMetrics {
    duration: Histogram<f64>,
    invocations: Counter<u64>,
    errors: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> InvocationMetrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
    ];
    InvocationMetrics {
        duration: meter
            .f64_histogram("serving_invocation_duration_seconds")
            .with_description("Time to decode, predict and encode one request")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build(),
        invocations: meter
            .u64_counter("serving_invocations_total")
            .with_description("Total invocation requests")
            .build(),
        errors: meter
            .u64_counter("serving_invocation_errors_total")
            .with_description("Invocation requests that failed")
            .build(),
    }
}

#[derive(Clone)]
pub struct AppState {
    handlers: Arc<HandlerService>,
    models: Arc<ModelStore>,
    default_accept: Arc<str>,
    metrics: InvocationMetrics,
}

impl AppState {
    pub fn new(
        handlers: Arc<HandlerService>,
        models: Arc<ModelStore>,
        default_accept: &str,
    ) -> Self {
        Self {
            handlers,
            models,
            default_accept: Arc::from(default_accept),
            metrics: init_metrics("serving"),
        }
    }
}

impl InvocationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            InvocationError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            InvocationError::Decode(_) => StatusCode::BAD_REQUEST,
            InvocationError::Prediction(_) | InvocationError::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for InvocationError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

impl StoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::AlreadyLoaded(_) => StatusCode::CONFLICT,
            StoreError::Load(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            StoreError::Load(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Picks the response media type.
///
/// No header or `*/*` selects `default_accept`. For a list, the first
/// registered entry wins. A single registered value is echoed unchanged.
pub fn negotiate_accept(
    codecs: &CodecRegistry,
    accept: Option<&str>,
    default_accept: &str,
) -> Result<String, InvocationError> {
    let Some(accept) = accept.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(default_accept.to_string());
    };

    let single = !accept.contains(',');
    for candidate in accept.split(',') {
        let media_type = normalize_media_type(candidate);
        if media_type == content_types::ANY {
            return Ok(default_accept.to_string());
        }
        if codecs.supports(&media_type) {
            return Ok(if single { accept.to_string() } else { media_type });
        }
    }
    Err(InvocationError::UnsupportedMediaType(accept.to_string()))
}

/// Routes for the selected serving mode.
pub fn router(state: AppState, multi_model: bool, max_request_size: usize) -> Router {
    let routes = Router::new().route("/ping", get(ping));

    let routes = if multi_model {
        routes
            .route("/models", get(list_models).post(load_model))
            .route("/models/:name", get(describe_model).delete(unload_model))
            .route("/models/:name/invoke", post(invoke_model))
    } else {
        routes.route("/invocations", post(invocations))
    };

    routes
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ping() -> StatusCode {
    StatusCode::OK
}

async fn invocations(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match state.models.get(DEFAULT_MODEL_NAME) {
        Ok(loaded) => invoke(state, loaded, &headers, body).await,
        Err(e) => e.into_response(),
    }
}

async fn invoke_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state.models.get(&name) {
        Ok(loaded) => invoke(state, loaded, &headers, body).await,
        Err(e) => e.into_response(),
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn invoke(
    state: AppState,
    loaded: LoadedModel,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let content_type = header_str(headers, header::CONTENT_TYPE)
        .unwrap_or_default()
        .to_string();

    let result = match negotiate_accept(
        state.handlers.codecs(),
        header_str(headers, header::ACCEPT),
        &state.default_accept,
    ) {
        Ok(accept) => {
            let handlers = Arc::clone(&state.handlers);
            let model = Arc::clone(&loaded.model);
            let request_type = content_type.clone();
            tokio::task::spawn_blocking(move || {
                handlers.transform(model.as_ref(), &body, &request_type, &accept)
            })
            .await
            .unwrap_or_else(|e| {
                Err(InvocationError::Prediction(anyhow::anyhow!(
                    "Invocation task failed: {}",
                    e
                )))
            })
        }
        Err(e) => Err(e),
    };

    let elapsed = start.elapsed().as_secs_f64();
    let model_attr = [KeyValue::new("model", loaded.name.clone())];
    state.metrics.duration.record(elapsed, &model_attr);
    state.metrics.invocations.add(1, &model_attr);

    match result {
        Ok((body, response_type)) => {
            tracing::debug!(
                model = %loaded.name,
                content_type = %content_type,
                accept = %response_type,
                bytes = body.len(),
                elapsed_ms = elapsed * 1000.0,
                "Invocation complete"
            );
            ([(header::CONTENT_TYPE, response_type)], body).into_response()
        }
        Err(e) => {
            state.metrics.errors.add(1, &model_attr);
            let status = e.status_code();
            if status.is_server_error() {
                tracing::error!(model = %loaded.name, error = %e, "Invocation failed");
            } else {
                tracing::warn!(
                    model = %loaded.name,
                    status = status.as_u16(),
                    error = %e,
                    "Invocation rejected"
                );
            }
            e.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoadModelRequest {
    pub model_name: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescription {
    pub model_name: String,
    pub model_url: String,
}

impl From<&LoadedModel> for ModelDescription {
    fn from(loaded: &LoadedModel) -> Self {
        Self {
            model_name: loaded.name.clone(),
            model_url: loaded.url.display().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelList {
    pub models: Vec<ModelDescription>,
}

async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList {
        models: state.models.list().iter().map(ModelDescription::from).collect(),
    })
}

async fn describe_model(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.models.get(&name) {
        Ok(loaded) => Json(ModelDescription::from(&loaded)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn load_model(
    State(state): State<AppState>,
    Json(request): Json<LoadModelRequest>,
) -> Response {
    let LoadModelRequest { model_name, url } = request;
    if state.models.contains(&model_name) {
        return StoreError::AlreadyLoaded(model_name).into_response();
    }

    let handlers = Arc::clone(&state.handlers);
    let model_dir = PathBuf::from(&url);
    let loaded = tokio::task::spawn_blocking(move || handlers.load_model(&model_dir)).await;

    let result = match loaded {
        Ok(Ok(model)) => state.models.insert(&model_name, PathBuf::from(&url), model),
        Ok(Err(e)) => Err(StoreError::Load(e)),
        Err(e) => {
            tracing::error!(model = %model_name, error = %e, "Model load task failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    match result {
        Ok(()) => {
            tracing::info!(model = %model_name, url = %url, "Model loaded");
            (StatusCode::OK, format!("Model {} loaded", model_name)).into_response()
        }
        Err(e) => {
            tracing::warn!(model = %model_name, url = %url, error = %e, "Model load failed");
            e.into_response()
        }
    }
}

async fn unload_model(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.models.remove(&name) {
        Ok(_) => {
            tracing::info!(model = %name, "Model unloaded");
            (StatusCode::OK, format!("Model {} unloaded", name)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Builds the application state for `config`, loading the model up front in
/// single-model mode.
pub async fn build_state(
    config: &ServingConfig,
    handlers: HandlerService,
) -> anyhow::Result<AppState> {
    if !handlers.codecs().supports(&config.default_accept) {
        anyhow::bail!(
            "Default accept {:?} is not a registered content type (registered: {:?})",
            config.default_accept,
            handlers.codecs().content_types()
        );
    }

    let handlers = Arc::new(handlers);
    let models = Arc::new(ModelStore::new());

    if config.multi_model {
        tracing::info!("Multi-model mode enabled, models are loaded on request");
    } else {
        let loader = Arc::clone(&handlers);
        let model_dir = config.model_dir.clone();
        let model = tokio::task::spawn_blocking(move || loader.load_model(&model_dir))
            .await?
            .with_context(|| format!("Failed to load model from {}", config.model_dir.display()))?;
        models.insert(DEFAULT_MODEL_NAME, config.model_dir.clone(), model)?;
        tracing::info!(model_dir = %config.model_dir.display(), "Model loaded");
    }

    Ok(AppState::new(handlers, models, &config.default_accept))
}

/// Starts the model server and serves until SIGINT or SIGTERM.
///
/// Model load and bind failures are returned as errors; the caller treats
/// them as fatal.
pub async fn start_server(config: ServingConfig, handlers: HandlerService) -> anyhow::Result<()> {
    let state = build_state(&config, handlers).await?;
    let app = router(state, config.multi_model, config.max_request_size);

    let listener = TcpListener::bind((config.bind_address, config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.bind_address, config.port))?;

    tracing::info!(
        address = %listener.local_addr()?,
        multi_model = config.multi_model,
        max_request_size = config.max_request_size,
        "Model server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Model server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ModelLoadError;

    #[test]
    fn test_negotiate_accept_defaults() {
        let codecs = CodecRegistry::with_defaults();
        assert_eq!(
            negotiate_accept(&codecs, None, "application/json").unwrap(),
            "application/json"
        );
        assert_eq!(
            negotiate_accept(&codecs, Some("*/*"), "text/csv").unwrap(),
            "text/csv"
        );
        assert_eq!(
            negotiate_accept(&codecs, Some("  "), "application/json").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_negotiate_accept_echoes_single_value() {
        let codecs = CodecRegistry::with_defaults();
        assert_eq!(
            negotiate_accept(&codecs, Some("text/csv"), "application/json").unwrap(),
            "text/csv"
        );
        assert_eq!(
            negotiate_accept(&codecs, Some("application/x-npy"), "application/json").unwrap(),
            "application/x-npy"
        );
    }

    #[test]
    fn test_negotiate_accept_list() {
        let codecs = CodecRegistry::with_defaults();
        assert_eq!(
            negotiate_accept(
                &codecs,
                Some("image/png, text/csv;q=0.8, application/json"),
                "application/json"
            )
            .unwrap(),
            "text/csv"
        );
        assert_eq!(
            negotiate_accept(&codecs, Some("image/png, */*"), "application/json").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_negotiate_accept_unsupported() {
        let codecs = CodecRegistry::with_defaults();
        let err = negotiate_accept(&codecs, Some("image/png"), "application/json").unwrap_err();
        assert!(matches!(err, InvocationError::UnsupportedMediaType(_)));
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            InvocationError::Decode(codec::CodecError::EmptyPayload).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InvocationError::from(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            StoreError::AlreadyLoaded("a".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            StoreError::Load(ModelLoadError::ArtifactNotFound(PathBuf::from("/m"))).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            StoreError::Load(ModelLoadError::Deserialize {
                path: PathBuf::from("/m/model.json"),
                reason: "bad".into()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
