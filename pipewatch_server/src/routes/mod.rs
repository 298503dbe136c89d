//! Dashboard HTTP routes — ingest, builds, metrics, alerts.

pub mod api;
pub mod webhook;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;

use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::AsyncPgConnection;

use crate::config::DashConfig;
use crate::services::alert_dispatcher::AlertDispatcher;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<AsyncPgConnection>,
    pub config: DashConfig,
    pub dispatcher: Arc<AlertDispatcher>,
}

/// Build the dashboard's Axum router (nested at `/api`).
pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Ingest (webhook push or poller feed)
        .route("/ingest/{provider}", post(ingest_handler))
        // Build API
        .route("/builds", get(list_builds_handler))
        .route("/builds/{build_id}", get(get_build_handler))
        // Provider API
        .route("/providers", get(list_providers_handler))
        // Metrics API
        .route("/metrics/summary", get(metrics_summary_handler))
        // Alert API
        .route("/alerts", get(list_alerts_handler))
        .route("/alerts/test", post(alert_test_handler))
        .with_state(state)
}

// ── Ingest ──

async fn ingest_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<api::IngestResponse>) {
    webhook::handle_ingest(&state, &provider, &headers, body).await
}

// ── Build API ──

async fn list_builds_handler(
    State(state): State<AppState>,
    Query(query): Query<api::ListBuildsQuery>,
) -> Result<Json<api::BuildListResponse>, StatusCode> {
    let mut conn = state
        .pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    api::list_builds(&mut conn, query)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn get_build_handler(
    State(state): State<AppState>,
    Path(build_id): Path<i64>,
) -> Result<Json<crate::services::build_store::BuildRow>, StatusCode> {
    let mut conn = state
        .pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    crate::services::build_store::get_build(&mut conn, build_id)
        .await
        .map(Json)
        .map_err(|_| StatusCode::NOT_FOUND)
}

// ── Provider API ──

async fn list_providers_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::models::provider::Provider>>, StatusCode> {
    let mut conn = state
        .pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    crate::services::build_store::list_providers(&mut conn)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// ── Metrics API ──

#[derive(serde::Deserialize)]
pub struct MetricsQuery {
    pub days: Option<i32>,
}

async fn metrics_summary_handler(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<crate::dashboard::kpi::MetricsSummary>, StatusCode> {
    let mut conn = state
        .pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let days = query.days.unwrap_or(state.config.default_window_days).max(1);
    crate::dashboard::kpi::query_summary(&mut conn, days)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// ── Alert API ──

#[derive(serde::Deserialize)]
pub struct ListAlertsQuery {
    pub limit: Option<i64>,
}

async fn list_alerts_handler(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> Result<Json<Vec<crate::models::alert::AlertRecord>>, StatusCode> {
    let mut conn = state
        .pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    crate::services::alert_dispatcher::list_recent_alerts(&mut conn, limit)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn alert_test_handler(
    State(state): State<AppState>,
    Json(req): Json<api::AlertTestRequest>,
) -> Json<api::AlertTestResponse> {
    let result = state
        .dispatcher
        .send_test(req.channel, &req.message, req.severity)
        .await;

    match result {
        Ok(()) => Json(api::AlertTestResponse {
            success: true,
            detail: format!("{} alert delivered", req.channel),
        }),
        Err(e) => Json(api::AlertTestResponse {
            success: false,
            detail: e.to_string(),
        }),
    }
}
