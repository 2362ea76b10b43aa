// =============================================================================
// REST API Endpoints — contract catalog queries and watch control
// =============================================================================
//
// Every route is public — spec.md's Non-goals explicitly exclude
// authentication, so (unlike the teacher) no `AuthBearer` extractor guards
// any of these. CORS and structured JSON error bodies are carried over as
// ambient concerns regardless (SPEC_FULL §6.3).
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::catalog::CatalogSort;
use crate::registry::{UnwatchOutcome, WatchOutcome};
use crate::types::Venue;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/contracts", get(list_contracts))
        .route("/contracts/new", get(new_listings))
        .route("/contracts/search", get(search_contracts))
        .route("/watch/:venue/:symbol", post(watch))
        .route("/watch/:venue/:symbol", delete(unwatch))
        .route("/watching", get(watching))
        .route("/refresh", post(refresh))
        .route("/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

fn parse_venue(raw: &str) -> Result<Venue, (StatusCode, Json<serde_json::Value>)> {
    Venue::parse(raw).ok_or_else(|| bad_request(format!("unknown venue '{raw}'")))
}

// =============================================================================
// GET /contracts
// =============================================================================

#[derive(Deserialize)]
struct ContractsQuery {
    venue: Option<String>,
    #[serde(default)]
    sort: Option<String>,
    limit: Option<usize>,
}

async fn list_contracts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContractsQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let venue_filter = query.venue.as_deref().map(parse_venue).transpose()?;
    let sort = CatalogSort::parse(query.sort.as_deref().unwrap_or("list_time"));

    let mut contracts = state.catalog.get_all(sort, venue_filter);
    if let Some(limit) = query.limit {
        contracts.truncate(limit);
    }
    Ok(Json(contracts))
}

// =============================================================================
// GET /contracts/new
// =============================================================================

#[derive(Deserialize)]
struct NewListingsQuery {
    #[serde(default = "default_days")]
    days: i64,
    limit: Option<usize>,
}

fn default_days() -> i64 {
    7
}

async fn new_listings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewListingsQuery>,
) -> impl IntoResponse {
    let mut contracts = state.catalog.get_new_listings(query.days);
    if let Some(limit) = query.limit {
        contracts.truncate(limit);
    }
    Json(contracts)
}

// =============================================================================
// GET /contracts/search
// =============================================================================

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

async fn search_contracts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    Json(state.catalog.search(&query.q))
}

// =============================================================================
// POST /watch/{venue}/{symbol}
// =============================================================================

async fn watch(
    State(state): State<Arc<AppState>>,
    Path((venue, symbol)): Path<(String, String)>,
) -> impl IntoResponse {
    let venue = match parse_venue(&venue) {
        Ok(v) => v,
        Err(resp) => return resp.into_response(),
    };

    let thresholds = state.config.read().alert_thresholds.clone();
    let result = state.registry.watch(
        venue,
        &symbol,
        &state.catalog,
        thresholds,
        state.hub.clone(),
        state.alert_log.clone(),
    );

    match result {
        Ok(WatchOutcome::Watching) => {
            info!(%venue, %symbol, "watch requested");
            Json(serde_json::json!({ "status": "watching" })).into_response()
        }
        Ok(WatchOutcome::AlreadyWatching) => {
            Json(serde_json::json!({ "status": "already_watching" })).into_response()
        }
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
        )
            .into_response(),
    }
}

// =============================================================================
// DELETE /watch/{venue}/{symbol}
// =============================================================================

async fn unwatch(
    State(state): State<Arc<AppState>>,
    Path((venue, symbol)): Path<(String, String)>,
) -> impl IntoResponse {
    let venue = match parse_venue(&venue) {
        Ok(v) => v,
        Err(resp) => return resp.into_response(),
    };

    match state.registry.unwatch(venue, &symbol) {
        UnwatchOutcome::Stopped => {
            info!(%venue, %symbol, "unwatch requested");
            Json(serde_json::json!({ "status": "stopped" })).into_response()
        }
        UnwatchOutcome::NotWatching => {
            Json(serde_json::json!({ "status": "not_watching" })).into_response()
        }
    }
}

// =============================================================================
// GET /watching
// =============================================================================

async fn watching(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.list())
}

// =============================================================================
// POST /refresh
// =============================================================================

async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    crate::catalog::refresh(&state.catalog, &state.http).await;
    warn!(total = state.catalog.len(), "catalog refresh forced via API");
    Json(serde_json::json!({ "status": "ok", "contract_count": state.catalog.len() }))
}
