//! Yachai HTTP API
//!
//! Axum-based HTTP server for citizen submissions and operator moderation.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum dispatch
//! machinery.
//!
//! Endpoints:
//! - GET  /health                         : store health
//! - GET  /version                        : server version info
//! - POST /claims                         : submit a claim for scoring
//! - GET  /admin/reports[?pending=true]   : list reports (newest first)
//! - GET  /admin/reports/:id              : one report
//! - POST /admin/reports/:id/verdict      : record the final verdict
//! - POST /admin/reports/:id/alert        : manual escalation alert
//! - GET  /admin/settings, PUT /admin/settings: alert threshold / auto-send
//! - POST /admin/cache/clear              : drop the report cache
//! - GET  /admin/export                   : JSON-lines backup
//!
//! Every `/admin` route requires the `x-admin-password` header.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use yachai_core::{
    ClaimClassifier, FinalVerdict, GeminiClassifier, Notifier, ReportStore, TelegramNotifier,
    YachaiConfig, YachaiError,
};

use crate::subsystems::moderate::{self, AlertSettings, ModerationError, SettingsUpdate};
use crate::subsystems::submit::{self, SubmitError};

pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub config: YachaiConfig,
    pub store: Arc<dyn ReportStore>,
    pub classifier: Option<Arc<dyn ClaimClassifier>>,
    pub notifier: Arc<dyn Notifier>,
    pub alerts: RwLock<AlertSettings>,
}

impl HttpState {
    pub fn new(
        config: YachaiConfig,
        store: Arc<dyn ReportStore>,
        classifier: Option<Arc<dyn ClaimClassifier>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let alerts = RwLock::new(AlertSettings::from(&config.alerts));
        Self {
            config,
            store,
            classifier,
            notifier,
            alerts,
        }
    }

    /// Open the store and build the external clients from configuration.
    ///
    /// A missing AI key is not fatal: the server starts and every submission
    /// reports the AI service as unavailable.
    pub async fn from_config(config: YachaiConfig) -> Result<Self, YachaiError> {
        let store = yachai_core::open_store(&config.database).await?;

        let classifier: Option<Arc<dyn ClaimClassifier>> = match GeminiClassifier::new(&config.ai) {
            Ok(c) => {
                tracing::info!(models = ?c.models(), "Gemini classifier ready");
                Some(Arc::new(c))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Gemini classifier unavailable; submissions will be refused");
                None
            }
        };

        let notifier = TelegramNotifier::from_config(&config.telegram)?;
        if !notifier.is_configured() {
            tracing::warn!("Telegram not configured; escalation alerts will fail");
        }

        Ok(Self::new(config, store, classifier, Arc::new(notifier)))
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/claims", post(submit_handler))
        .route("/admin/reports", get(list_reports_handler))
        .route("/admin/reports/:id", get(get_report_handler))
        .route("/admin/reports/:id/verdict", post(resolve_handler))
        .route("/admin/reports/:id/alert", post(alert_handler))
        .route("/admin/settings", get(get_settings_handler).put(update_settings_handler))
        .route("/admin/cache/clear", post(clear_cache_handler))
        .route("/admin/export", get(export_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Yachai HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub final_verdict: String,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

fn error_body(status: StatusCode, msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    let body = serde_json::to_value(ErrorResponse::new(msg)).unwrap_or_default();
    (status, body)
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Plain equality against the configured password. An unset password locks
/// the operator interface.
pub fn authorize(config: &YachaiConfig, headers: &HeaderMap) -> Result<(), (StatusCode, serde_json::Value)> {
    let supplied = headers
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !config.admin.password.is_empty() && supplied == config.admin.password {
        return Ok(());
    }
    if !supplied.is_empty() {
        tracing::warn!("Rejected operator request: wrong password");
    }
    Err(error_body(StatusCode::UNAUTHORIZED, "ভুল পাসওয়ার্ড!"))
}

pub async fn health_inner(store: &dyn ReportStore) -> (StatusCode, serde_json::Value) {
    match store.health().await {
        Ok(detail) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": detail,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "yachai",
    })
}

pub async fn submit_inner(state: &HttpState, req: SubmitRequest) -> (StatusCode, serde_json::Value) {
    let text = req.text.unwrap_or_default();
    let outcome = submit::submit_claim(
        &text,
        state.config.submission.max_input_length,
        state.classifier.as_deref(),
        state.store.as_ref(),
    )
    .await;

    match outcome {
        Ok(submission) => (
            StatusCode::OK,
            serde_json::to_value(&submission).unwrap_or_default(),
        ),
        Err(e) => {
            let status = match e {
                SubmitError::Rejected(_) => StatusCode::BAD_REQUEST,
                SubmitError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                SubmitError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_body(status, e.user_message())
        }
    }
}

fn moderation_error(e: ModerationError) -> (StatusCode, serde_json::Value) {
    let status = match e {
        ModerationError::NotFound(_) => StatusCode::NOT_FOUND,
        ModerationError::NotEligible(_) => StatusCode::CONFLICT,
        ModerationError::InvalidThreshold(_) => StatusCode::BAD_REQUEST,
        ModerationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ModerationError::Notify(_) => StatusCode::BAD_GATEWAY,
    };
    error_body(status, e.to_string())
}

pub async fn list_reports_inner(state: &HttpState, query: ListQuery) -> (StatusCode, serde_json::Value) {
    let reports = if query.pending {
        moderate::pending(state.store.as_ref()).await
    } else {
        state.store.list_all().await.map_err(ModerationError::from)
    };

    match reports {
        Ok(reports) => (
            StatusCode::OK,
            serde_json::json!({
                "count": reports.len(),
                "reports": reports,
            }),
        ),
        Err(e) => moderation_error(e),
    }
}

pub async fn get_report_inner(state: &HttpState, id: i64) -> (StatusCode, serde_json::Value) {
    match state.store.get(id).await {
        Ok(Some(report)) => (StatusCode::OK, serde_json::to_value(report).unwrap_or_default()),
        Ok(None) => moderation_error(ModerationError::NotFound(id)),
        Err(e) => moderation_error(e.into()),
    }
}

pub async fn resolve_inner(
    state: &HttpState,
    id: i64,
    req: ResolveRequest,
) -> (StatusCode, serde_json::Value) {
    let verdict: FinalVerdict = match req.final_verdict.parse() {
        Ok(v) => v,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, format!("{}", e)),
    };

    let settings = *state.alerts.read().await;
    match moderate::resolve(state.store.as_ref(), state.notifier.as_ref(), settings, id, verdict).await {
        Ok(resolution) => (
            StatusCode::OK,
            serde_json::json!({
                "report": resolution.report,
                "alert": resolution.alert,
                "delivered": resolution.alert.delivered(),
            }),
        ),
        Err(e) => moderation_error(e),
    }
}

pub async fn alert_inner(state: &HttpState, id: i64) -> (StatusCode, serde_json::Value) {
    match moderate::send_manual_alert(state.store.as_ref(), state.notifier.as_ref(), id).await {
        Ok(report) => (
            StatusCode::OK,
            serde_json::json!({ "delivered": true, "id": report.id }),
        ),
        Err(e) => moderation_error(e),
    }
}

pub async fn get_settings_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let settings = *state.alerts.read().await;
    (StatusCode::OK, serde_json::to_value(settings).unwrap_or_default())
}

pub async fn update_settings_inner(
    state: &HttpState,
    update: SettingsUpdate,
) -> (StatusCode, serde_json::Value) {
    let mut settings = state.alerts.write().await;
    match settings.apply(&update) {
        Ok(()) => {
            tracing::info!(threshold = settings.threshold, auto_send = settings.auto_send, "Alert settings updated");
            (StatusCode::OK, serde_json::to_value(*settings).unwrap_or_default())
        }
        Err(e) => moderation_error(e),
    }
}

pub async fn clear_cache_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    state.store.clear_cache().await;
    (StatusCode::OK, serde_json::json!({ "cleared": true }))
}

/// All reports as JSON lines, oldest first, for backup.
pub async fn export_inner(state: &HttpState) -> Result<String, (StatusCode, serde_json::Value)> {
    let mut reports = state
        .store
        .list_all()
        .await
        .map_err(|e| moderation_error(e.into()))?;
    reports.reverse();

    let mut out = String::new();
    for report in &reports {
        let line = serde_json::to_string(report)
            .map_err(|e| error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    tracing::info!(count = reports.len(), "Exported reports");
    Ok(out)
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.store.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn submit_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<SubmitRequest>,
) -> impl IntoResponse {
    let (status, body) = submit_inner(&state, req).await;
    (status, Json(body))
}

pub async fn list_reports_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let (status, body) = match authorize(&state.config, &headers) {
        Ok(()) => list_reports_inner(&state, query).await,
        Err(denied) => denied,
    };
    (status, Json(body))
}

pub async fn get_report_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = match authorize(&state.config, &headers) {
        Ok(()) => get_report_inner(&state, id).await,
        Err(denied) => denied,
    };
    (status, Json(body))
}

pub async fn resolve_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<ResolveRequest>,
) -> impl IntoResponse {
    let (status, body) = match authorize(&state.config, &headers) {
        Ok(()) => resolve_inner(&state, id, req).await,
        Err(denied) => denied,
    };
    (status, Json(body))
}

pub async fn alert_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = match authorize(&state.config, &headers) {
        Ok(()) => alert_inner(&state, id).await,
        Err(denied) => denied,
    };
    (status, Json(body))
}

pub async fn get_settings_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (status, body) = match authorize(&state.config, &headers) {
        Ok(()) => get_settings_inner(&state).await,
        Err(denied) => denied,
    };
    (status, Json(body))
}

pub async fn update_settings_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> impl IntoResponse {
    let (status, body) = match authorize(&state.config, &headers) {
        Ok(()) => update_settings_inner(&state, update).await,
        Err(denied) => denied,
    };
    (status, Json(body))
}

pub async fn clear_cache_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (status, body) = match authorize(&state.config, &headers) {
        Ok(()) => clear_cache_inner(&state).await,
        Err(denied) => denied,
    };
    (status, Json(body))
}

pub async fn export_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    if let Err((status, body)) = authorize(&state.config, &headers) {
        return (status, Json(body)).into_response();
    }
    match export_inner(&state).await {
        Ok(lines) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/x-ndjson")],
            lines,
        )
            .into_response(),
        Err((status, body)) => (status, Json(body)).into_response(),
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
