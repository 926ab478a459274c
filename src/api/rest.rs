// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  The scanner is read-mostly: the only
// mutations are adding and removing watched symbols.
//
// CORS is configured permissively for development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::{AppState, SymbolSummary};
use crate::bybit::RateLimitSnapshot;
use crate::market_data::{Candle, KlineSource};
use crate::signals::{DivergencePreset, DivergenceSnapshot, PresetOverrides};
use crate::types::Interval;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router<S>(state: Arc<AppState<S>>) -> Router
where
    S: KlineSource + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health::<S>))
        .route("/api/v1/symbols", get(list_symbols::<S>).post(add_symbol::<S>))
        .route("/api/v1/symbols/:symbol", axum::routing::delete(remove_symbol::<S>))
        .route("/api/v1/symbols/:symbol/window", get(window::<S>))
        .route("/api/v1/symbols/:symbol/divergence", get(divergence::<S>))
        .layer(cors)
        .with_state(state)
}

fn not_watched(symbol: &str) -> Response {
    let body = serde_json::json!({ "error": format!("symbol {} is not watched", symbol.to_uppercase()) });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    uptime_secs: u64,
    interval: Interval,
    symbols: usize,
    rate_limit: Option<RateLimitSnapshot>,
}

async fn health<S>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse
where
    S: KlineSource + Send + Sync + 'static,
{
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        interval: state.interval(),
        symbols: state.symbols().len(),
        rate_limit: state.rate_limits().map(|t| t.snapshot()),
    })
}

// =============================================================================
// Symbol registry
// =============================================================================

async fn list_symbols<S>(State(state): State<Arc<AppState<S>>>) -> Json<Vec<SymbolSummary>>
where
    S: KlineSource + Send + Sync + 'static,
{
    Json(state.symbols())
}

#[derive(Deserialize)]
struct AddSymbolRequest {
    symbol: String,
}

async fn add_symbol<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AddSymbolRequest>,
) -> Response
where
    S: KlineSource + Send + Sync + 'static,
{
    let symbol = req.symbol.trim().to_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        let body = serde_json::json!({ "error": "symbol must be a non-empty alphanumeric string" });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    if state.watch(&symbol) {
        info!(symbol = %symbol, "symbol added via API");
        (StatusCode::CREATED, Json(serde_json::json!({ "symbol": symbol, "watching": true }))).into_response()
    } else {
        (StatusCode::OK, Json(serde_json::json!({ "symbol": symbol, "watching": true }))).into_response()
    }
}

async fn remove_symbol<S>(State(state): State<Arc<AppState<S>>>, Path(symbol): Path<String>) -> Response
where
    S: KlineSource + Send + Sync + 'static,
{
    if state.unwatch(&symbol) {
        info!(symbol = %symbol, "symbol removed via API");
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_watched(&symbol)
    }
}

// =============================================================================
// Window
// =============================================================================

#[derive(Serialize)]
struct WindowResponse {
    symbol: String,
    interval: Interval,
    capacity: usize,
    len: usize,
    /// Expected start of the next bucket after the last confirmed candle.
    next_start_ms: Option<i64>,
    candles: Vec<Candle>,
}

async fn window<S>(State(state): State<Arc<AppState<S>>>, Path(symbol): Path<String>) -> Response
where
    S: KlineSource + Send + Sync + 'static,
{
    let Some(w) = state.window(&symbol) else {
        return not_watched(&symbol);
    };

    let interval = state.interval();
    Json(WindowResponse {
        symbol: symbol.to_uppercase(),
        interval,
        capacity: w.capacity(),
        len: w.len(),
        next_start_ms: w.last().map(|c| c.start_time_ms + interval.duration_ms()),
        candles: w.to_vec(),
    })
    .into_response()
}

// =============================================================================
// Divergence
// =============================================================================

#[derive(Deserialize)]
struct IntervalQuery {
    interval: Option<Interval>,
}

#[derive(Serialize)]
struct DivergenceResponse {
    symbol: String,
    /// Interval of the analysed candle window.
    interval: Interval,
    /// Interval whose preset was applied.
    preset_interval: Interval,
    preset: DivergencePreset,
    #[serde(flatten)]
    snapshot: DivergenceSnapshot,
}

/// `?interval=` picks the preset (defaults to the scanner interval); every
/// other query parameter is a `PresetOverrides` field.
async fn divergence<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(symbol): Path<String>,
    Query(q): Query<IntervalQuery>,
    Query(overrides): Query<PresetOverrides>,
) -> Response
where
    S: KlineSource + Send + Sync + 'static,
{
    let preset_interval = q.interval.unwrap_or_else(|| state.interval());
    let preset = state.preset_for(preset_interval, &overrides);

    match state.divergence_snapshot(&symbol, &preset) {
        Some(snapshot) => Json(DivergenceResponse {
            symbol: symbol.to_uppercase(),
            interval: state.interval(),
            preset_interval,
            preset,
            snapshot,
        })
        .into_response(),
        None => not_watched(&symbol),
    }
}
