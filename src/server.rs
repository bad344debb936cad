//! HTTP trigger and dashboard read API.
//!
//! Exposes the triage pipeline over a small JSON API: a trigger endpoint
//! that starts a run and returns immediately, the projected dashboard view,
//! and the latest report.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/runs` | Trigger a pipeline run; returns `202` with a run id |
//! | `GET`  | `/dashboard` | Full projected dashboard view model |
//! | `GET`  | `/reports/latest` | Most recent triage report |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use:
//!
//! ```json
//! { "error": { "code": "internal", "message": "..." } }
//! ```
//!
//! Dashboard failures are retryable 500s and never return partially
//! populated state. Duplicate concurrent runs are allowed: the trigger
//! endpoint performs no dedup or locking.
//!
//! # Scheduling
//!
//! With `[schedule] enabled = true`, the server also triggers a run every
//! `interval_hours` (default 24), implementing the "daily triage run".

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::dashboard;
use crate::db;
use crate::pipeline;
use crate::report;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Starts the triage HTTP server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated. Also spawns the scheduled-run loop when the
/// schedule is enabled.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    if config.schedule.enabled {
        let sched_config = config.clone();
        tokio::spawn(async move {
            run_schedule(sched_config).await;
        });
    }

    let state = AppState { config };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/runs", post(handle_trigger_run))
        .route("/dashboard", get(handle_dashboard))
        .route("/reports/latest", get(handle_latest_report))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Triage server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Scheduled-run loop: one pipeline run per interval.
async fn run_schedule(config: Arc<Config>) {
    let period = Duration::from_secs(config.schedule.interval_hours * 3600);
    let mut interval = tokio::time::interval(period);
    // The first tick fires immediately; skip it so startup doesn't
    // double-run alongside a manual trigger.
    interval.tick().await;

    loop {
        interval.tick().await;
        tracing::info!("scheduled triage run starting");
        if let Err(e) = pipeline::run_triage(&config, None, false, true).await {
            tracing::error!(error = %e, "scheduled triage run failed");
        }
    }
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"not_found"`, `"internal"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Constructs a retryable 500 error.
fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /runs ============

#[derive(Debug, Default, Deserialize)]
struct RunRequest {
    /// Number of items to generate; defaults to `[generator].count`.
    count: Option<usize>,
}

#[derive(Serialize)]
struct RunResponse {
    run_id: String,
}

/// Handler for `POST /runs`.
///
/// Returns a run identifier immediately; the pipeline executes to
/// completion in a spawned task. Failures are logged, not returned — the
/// caller polls `/reports/latest` or `/dashboard` for the outcome.
async fn handle_trigger_run(
    State(state): State<AppState>,
    body: Option<Json<RunRequest>>,
) -> (StatusCode, Json<RunResponse>) {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let run_id = Uuid::new_v4().to_string();

    let config = state.config.clone();
    let task_run_id = run_id.clone();
    tokio::spawn(async move {
        tracing::info!(run_id = %task_run_id, "triggered triage run starting");
        match pipeline::run_triage(&config, request.count, false, true).await {
            Ok(summary) => tracing::info!(
                run_id = %task_run_id,
                items = summary.items,
                clusters = summary.clusters,
                escalated = summary.escalated,
                "triage run complete"
            ),
            Err(e) => {
                tracing::error!(run_id = %task_run_id, error = %e, "triage run failed")
            }
        }
    });

    (StatusCode::ACCEPTED, Json(RunResponse { run_id }))
}

// ============ GET /dashboard ============

/// Handler for `GET /dashboard`.
///
/// Projects the full view model from current persisted state. Safe to call
/// while a run is in flight; the projection has no write side effects.
async fn handle_dashboard(
    State(state): State<AppState>,
) -> Result<Json<dashboard::DashboardView>, AppError> {
    let pool = db::connect(&state.config)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let view = dashboard::project_dashboard(&pool, state.config.triage.activity_window)
        .await
        .map_err(|e| internal(e.to_string()));

    pool.close().await;
    Ok(Json(view?))
}

// ============ GET /reports/latest ============

/// Handler for `GET /reports/latest`.
async fn handle_latest_report(
    State(state): State<AppState>,
) -> Result<Json<crate::models::ReportRecord>, AppError> {
    let pool = db::connect(&state.config)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let result = report::latest_report(&pool)
        .await
        .map_err(|e| internal(e.to_string()));

    pool.close().await;

    match result? {
        Some(record) => Ok(Json(record)),
        None => Err(not_found("no reports generated yet")),
    }
}
