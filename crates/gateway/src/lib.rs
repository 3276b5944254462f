//! HTTP API gateway for Dirflow.
//!
//! Exposes the chat exchange plus read-only status endpoints:
//! - `POST /api/chat` runs one exchange through the orchestrator
//! - `GET /health` liveness probe
//! - `GET /api/llm-providers` provider availability and models
//! - `GET /api/validator-stats` the validator's rules
//! - `GET /api/conversation-status` history limits and context defaults
//! - `GET /api/health-status` aggregate service status
//!
//! Built on Axum; every request is traced and the body size is capped.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use dirflow_config::{AppConfig, ProviderStatus};
use dirflow_core::context::ChatRequest;
use dirflow_core::provider::ProviderKind;
use dirflow_pipeline::{OrchestrationResult, Orchestrator};
use dirflow_security::ValidatorStats;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

/// Shared application state for the gateway.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            started_at: Utc::now(),
        }
    }
}

type SharedState = Arc<AppState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, config: &AppConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/llm-providers", get(providers_handler))
        .route("/api/validator-stats", get(validator_stats_handler))
        .route("/api/conversation-status", get(conversation_status_handler))
        .route("/api/health-status", get(health_status_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.gateway.body_limit_bytes))
        .layer(cors_layer(&config.gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS restricted to the configured origins; none configured means same-origin only.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let orchestrator = Orchestrator::from_config(&config)?;
    let state = Arc::new(AppState::new(orchestrator));
    let app = build_router(state, &config);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

// --- Errors ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: &'static str,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error_type: &'static str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            error_type,
        }),
    )
}

impl From<dirflow_core::Error> for ErrorResponse {
    fn from(err: dirflow_core::Error) -> Self {
        let error_type = match &err {
            dirflow_core::Error::Config { .. } => "configuration-error",
            dirflow_core::Error::InvalidRequest(_) => "invalid-request",
            dirflow_core::Error::Cancelled => "cancelled",
            _ => "internal-error",
        };
        Self {
            error: err.to_string(),
            error_type,
        }
    }
}

fn status_for(err: &dirflow_core::Error) -> StatusCode {
    match err {
        dirflow_core::Error::Config { .. } | dirflow_core::Error::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<OrchestrationResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Malformed chat request");
        api_error(rejection.status(), "invalid-request", rejection.body_text())
    })?;

    info!(
        provider = request.provider.as_deref().unwrap_or("default"),
        message_len = request.message.len(),
        "Chat request received"
    );

    match state.orchestrator.process(request).await {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            let status = status_for(&err);
            if status.is_server_error() {
                error!(error = %err, "Exchange failed");
            } else {
                warn!(error = %err, "Chat request rejected");
            }
            Err((status, Json(ErrorResponse::from(err))))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvidersResponse {
    default_provider: &'static str,
    providers: BTreeMap<&'static str, ProviderStatus>,
}

async fn providers_handler(State(state): State<SharedState>) -> Json<ProvidersResponse> {
    let registry = state.orchestrator.registry();
    let providers = ProviderKind::ALL
        .into_iter()
        .zip(registry.status())
        .map(|(kind, status)| (kind.as_str(), status))
        .collect();

    Json(ProvidersResponse {
        default_provider: registry.default_provider().as_str(),
        providers,
    })
}

async fn validator_stats_handler(State(state): State<SharedState>) -> Json<ValidatorStats> {
    Json(state.orchestrator.validator().stats())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationStatusResponse {
    max_history_items: usize,
    max_history_chars: usize,
    max_file_list: usize,
    default_path: String,
    context_switch_detection: bool,
}

async fn conversation_status_handler(
    State(state): State<SharedState>,
) -> Json<ConversationStatusResponse> {
    let preparer = state.orchestrator.preparer();
    let limits = preparer.limits();
    Json(ConversationStatusResponse {
        max_history_items: limits.max_items,
        max_history_chars: limits.max_chars,
        max_file_list: preparer.max_file_list(),
        default_path: preparer.default_path().to_string(),
        context_switch_detection: true,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatusResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
    providers: BTreeMap<&'static str, bool>,
    search_backend: bool,
    routing_enabled: bool,
}

async fn health_status_handler(State(state): State<SharedState>) -> Json<HealthStatusResponse> {
    let registry = state.orchestrator.registry();
    let providers: BTreeMap<_, _> = ProviderKind::ALL
        .into_iter()
        .filter_map(|kind| registry.get(kind).map(|e| (kind.as_str(), e.is_available())))
        .collect();

    let status = if providers.values().any(|available| *available) {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthStatusResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        providers,
        search_backend: state.orchestrator.has_search_backend(),
        routing_enabled: state.orchestrator.router().is_enabled(),
    })
}
