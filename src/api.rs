use shuttle_axum::axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::digest::{Item, SummaryGroup};
use crate::ingest::types::FetchFailure;
use crate::notify::DeliveryOutcome;
use crate::pipeline::{self, AppState};
use crate::prefs::Prefs;

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    tracing::error!(target: "api", error = ?e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/prefs", get(get_prefs).post(post_prefs))
        .route("/api/collect", post(collect))
        .route("/api/summarize", get(summarize))
        .route("/api/send", post(send))
        .route("/api/cron", get(cron).post(cron))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn get_prefs(State(state): State<AppState>) -> Result<Json<Prefs>, ApiError> {
    state.prefs.read().map(Json).map_err(internal)
}

/// Any JSON object is accepted and sanitized; anything else is a 400.
async fn post_prefs(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Prefs>, ApiError> {
    let bad_request = || (StatusCode::BAD_REQUEST, "Bad Request".to_string());
    let value: serde_json::Value = serde_json::from_slice(&body).map_err(|_| bad_request())?;
    let prefs = Prefs::from_loose_json(&value).ok_or_else(bad_request)?;
    state.prefs.write(prefs).map(Json).map_err(internal)
}

#[derive(serde::Serialize)]
struct CollectResp {
    count: usize,
    items: Vec<Item>,
    failures: Vec<FetchFailure>,
}

async fn collect(State(state): State<AppState>) -> Result<Json<CollectResp>, ApiError> {
    let report = pipeline::collect(&state).await.map_err(internal)?;
    Ok(Json(CollectResp {
        count: report.items.len(),
        items: report.items,
        failures: report.failures,
    }))
}

async fn summarize(State(state): State<AppState>) -> Result<Json<Vec<SummaryGroup>>, ApiError> {
    state.digests.load().await.map(Json).map_err(internal)
}

#[derive(serde::Serialize)]
struct SendResp {
    ok: bool,
    deliveries: Vec<DeliveryOutcome>,
}

async fn send(State(state): State<AppState>) -> Result<Json<SendResp>, ApiError> {
    let deliveries = pipeline::send_latest(&state).await.map_err(internal)?;
    Ok(Json(SendResp {
        ok: true,
        deliveries,
    }))
}

#[derive(serde::Serialize)]
struct CronResp {
    ok: bool,
    items: usize,
    groups: usize,
    deliveries: Vec<DeliveryOutcome>,
    failures: Vec<FetchFailure>,
}

async fn cron(State(state): State<AppState>) -> Result<Json<CronResp>, ApiError> {
    let run = pipeline::run_digest(&state).await.map_err(internal)?;
    Ok(Json(CronResp {
        ok: true,
        items: run.items,
        groups: run.groups,
        deliveries: run.deliveries,
        failures: run.failures,
    }))
}
