// Main entry point for the journal-to-comic generation service

use comic_weaver::{
    core::{config::Config, errors::GenerationError, types::GenerationOptions},
    middleware::CollaboratorHealth,
    orchestration::GenerationOrchestrator,
    services::collaborator::GeminiCollaborator,
    services::collaborator::{PanelIllustrator, ScenePlanner},
    utils::{image_ops::to_data_url, Metrics},
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<GenerationOrchestrator>,
    health: CollaboratorHealth,
    metrics: Metrics,
    remote_configured: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::new(format!(
        "comic_weaver={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== COMIC WEAVER ===");
    info!(
        "Config: panel={}px page={}x{} layout={:?} remote={}",
        config.generation.panel_size,
        config.generation.page_width,
        config.generation.page_height,
        config.generation.layout_style,
        config.collaborator.remote_enabled,
    );

    let metrics = Metrics::new();
    let health = CollaboratorHealth::new();

    // A single Gemini client serves both collaborator roles when a key is set
    let remote = if config.collaborator.remote_enabled && config.collaborator.api_key.is_some() {
        let client = Arc::new(GeminiCollaborator::new(
            config.clone(),
            health.clone(),
            Some(metrics.clone()),
        )?);
        Some(client)
    } else {
        info!("No API key configured; running with the local pipeline only");
        None
    };

    let planner: Option<Arc<dyn ScenePlanner>> =
        remote.clone().map(|c| c as Arc<dyn ScenePlanner>);
    let illustrator: Option<Arc<dyn PanelIllustrator>> =
        remote.map(|c| c as Arc<dyn PanelIllustrator>);

    let orchestrator = Arc::new(GenerationOrchestrator::new(
        config.clone(),
        planner,
        illustrator,
        health.clone(),
        metrics.clone(),
    )?);

    let remote_configured = config.collaborator.api_key.is_some();
    let state = AppState {
        orchestrator,
        health,
        metrics,
        remote_configured,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/generate", post(generate))
        .route("/cancel", post(cancel))
        .with_state(state)
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /          - Root endpoint");
    info!("  GET  /health    - Health check");
    info!("  GET  /metrics   - Prometheus metrics");
    info!("  GET  /stats     - Detailed statistics");
    info!("  POST /generate  - Generate a comic from a journal story");
    info!("  POST /cancel    - Cancel the active job");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Comic Weaver - Journal-to-Comic Generation Service"
}

async fn health_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/health");
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "remote_configured": state.remote_configured,
        "collaborator_state": format!("{:?}", state.health.state()),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state.metrics.record_endpoint_request("/stats");
    let snapshot = state.metrics.snapshot();
    let job = state.orchestrator.active_snapshot();
    serde_json::to_value(serde_json::json!({
        "metrics": snapshot,
        "active_job": job,
    }))
    .map(Json)
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize stats: {}", e),
        )
    })
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    story: String,
    #[serde(default)]
    options: GenerationOptions,
}

/// Generate a comic from a journal story.
///
/// # Request Format:
/// - JSON: `{"story": "...", "options": {"layout_style": "grid", "title": "...", "force_local": false}}`
///
/// # Response:
/// - Pages as base64 PNG data URLs plus job statistics
async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state.metrics.record_endpoint_request("/generate");
    let start_time = std::time::Instant::now();

    if request.story.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Empty story".to_string()));
    }

    info!("Received generate request ({} chars)", request.story.len());

    let outcome = state
        .orchestrator
        .generate(&request.story, &request.options)
        .await
        .map_err(|e| {
            error!("Generation failed: {:?}", e);
            let status = match e {
                GenerationError::NotSupported => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, format!("Generation failed: {}", e))
        })?;

    let pages: Vec<serde_json::Value> = outcome
        .pages
        .iter()
        .map(|page| {
            serde_json::json!({
                "page_number": page.page_number,
                "image": to_data_url(&page.image_bytes),
            })
        })
        .collect();

    info!(
        "Request completed in {:.2}s: {} pages, {}/{} panels",
        start_time.elapsed().as_secs_f64(),
        pages.len(),
        outcome.panels_rendered,
        outcome.panels_attempted,
    );

    Ok(Json(serde_json::json!({
        "phase": outcome.phase,
        "pages": pages,
        "panels_attempted": outcome.panels_attempted,
        "panels_rendered": outcome.panels_rendered,
        "used_remote": outcome.used_remote,
    })))
}

/// Cancel the active job, if one is running
async fn cancel(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/cancel");
    let cancelled = state.orchestrator.cancel_active();
    Json(serde_json::json!({ "cancelled": cancelled }))
}
