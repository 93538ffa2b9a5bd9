//! HTTP server assembly and top-level route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ai::{AiError, GeminiModel, PaperComposer};
use crate::config::Config;
use crate::export::{ExportError, ExportOutcome, Exporter, HttpRenderer, PaperRenderer};
use crate::persist::JsonFileStore;
use crate::service::{PaperService, ServiceError, StatusSnapshot};
use crate::store::PaperStore;

use super::papers;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub papers: Arc<PaperService>,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let persistence = Arc::new(JsonFileStore::new(config.storage_path.clone()));
    let store = PaperStore::new(persistence);

    let model = Arc::new(GeminiModel::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));
    let composer = PaperComposer::new(model);

    let renderer: Option<Arc<dyn PaperRenderer>> = config
        .renderer_url
        .clone()
        .map(|url| Arc::new(HttpRenderer::new(url)) as Arc<dyn PaperRenderer>);
    if renderer.is_none() {
        tracing::info!("No RENDERER_URL configured, image export disabled");
    }
    let exporter = Exporter::new(renderer, config.export_dir.clone());

    let service = Arc::new(PaperService::new(store, composer, exporter));
    service.hydrate().await;

    let state = Arc::new(AppState {
        config: config.clone(),
        papers: service,
    });

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/export", post(export_all))
        .nest("/api/papers", papers::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Map a controller error onto an HTTP response.
///
/// Validation problems are the client's fault; AI and export failures are
/// upstream collaborators misbehaving; busy concerns are conflicts.
pub fn error_response(err: ServiceError) -> (StatusCode, String) {
    let status = match &err {
        ServiceError::EmptyTheme | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Busy(_) => StatusCode::CONFLICT,
        ServiceError::Ai(AiError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
        ServiceError::Ai(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Export(ExportError::TargetNotFound(_)) => StatusCode::NOT_FOUND,
        ServiceError::Export(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}

/// Response for the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ai_configured: bool,
    pub export_configured: bool,
}

/// GET /api/health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ai_configured: !state.config.gemini_api_key.trim().is_empty()
            && state.config.gemini_api_key != crate::ai::PLACEHOLDER_API_KEY,
        export_configured: state.config.renderer_url.is_some(),
    })
}

/// GET /api/status
/// Snapshot of the generation, augmentation and export status slots.
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.papers.status().await)
}

/// POST /api/export
/// Export every paper sequentially; per-item outcomes, partial success.
async fn export_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ExportOutcome>>, (StatusCode, String)> {
    state
        .papers
        .export_all()
        .await
        .map(Json)
        .map_err(error_response)
}
