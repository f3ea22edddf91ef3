//! HTTP route handlers for the JSON API

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use chrono::Local;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::AppState;
use crate::recommend::RecommendationKind;
use crate::session::{HistoryEntry, SessionSummary};
use crate::workflow::DEFAULT_CHALLENGE_TYPE;

/// Build the API router
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}/messages", get(session_messages))
        .route("/recommendations/{kind}", post(recommend))
        .route("/conflicts", post(detect_conflicts))
}

#[derive(Debug, Deserialize)]
struct RecommendationRequest {
    problem_statement: String,
    #[serde(default)]
    challenge_type: Option<String>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// GET /api/sessions
async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.list().await)
}

/// GET /api/sessions/{id}/messages - full transcript
async fn session_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, StatusCode> {
    debug!(%session_id, "session_messages: called");
    let session = state.registry.get(&session_id).await.ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(session.history()))
}

/// POST /api/recommendations/{kind}
async fn recommend(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    debug!(%kind, "recommend: called");
    let kind: RecommendationKind = kind.parse().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let challenge_type = request.challenge_type.as_deref().unwrap_or(DEFAULT_CHALLENGE_TYPE);
    let today = Local::now().date_naive();

    let value = state
        .recommender
        .recommend(kind, &request.problem_statement, challenge_type, today)
        .await;
    Ok(Json(value))
}

/// POST /api/conflicts
async fn detect_conflicts(State(state): State<AppState>, Json(data): Json<Value>) -> Json<Map<String, Value>> {
    Json(state.recommender.detect_conflicts(&data).await)
}
