//! REST route handlers.
//!
//! Handlers only parse requests and forward them into the engine. Successful
//! responses carry `"status": "success"`. Registry errors and body or query
//! rejections both become `{"status": "error", "detail": ...}` with the
//! matching HTTP status code.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use nexus_core::leaderboard::{self, LeaderboardEntry, DEFAULT_LIMIT};
use nexus_core::mission::{AgentRole, DifficultyMode, ObjectiveDefinition};
use nexus_core::scoring::PerformanceInputs;
use nexus_core::session::{SessionStart, SessionStatus, SessionUpdate};
use nexus_core::{RegistryError, SessionKey};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::SharedState;

const DEFAULT_TEAM_NAME: &str = "Unknown Team";
const DEFAULT_AGENT_COLOR: &str = "#FF1744";

/// Error response: a status code plus a human-readable detail.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match &err {
            RegistryError::DuplicateKey(_) => StatusCode::CONFLICT,
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "status": "error", "detail": self.detail })),
        )
            .into_response()
    }
}

type ApiResult<T = Value> = Result<Json<T>, ApiError>;

/// JSON body extractor that rejects with [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor that rejects with [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

fn session_key(raw: Option<String>) -> Result<SessionKey, ApiError> {
    match raw {
        Some(id) if !id.trim().is_empty() => Ok(SessionKey::new(id)),
        _ => Err(ApiError::bad_request("Session ID required")),
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub session_id: Option<String>,
    pub team_name: Option<String>,
    pub selected_agent: Option<AgentRole>,
    pub agent_color: Option<String>,
    pub difficulty_mode: Option<DifficultyMode>,
}

/// Handler for POST /api/session/start
pub async fn start_session(
    State(state): State<Arc<SharedState>>,
    ApiJson(request): ApiJson<StartRequest>,
) -> ApiResult {
    let key = session_key(request.session_id)?;
    let session = state.context.registry.start(SessionStart {
        key,
        team_name: request
            .team_name
            .unwrap_or_else(|| DEFAULT_TEAM_NAME.to_string()),
        role: request.selected_agent.unwrap_or_default(),
        agent_color: request
            .agent_color
            .unwrap_or_else(|| DEFAULT_AGENT_COLOR.to_string()),
        difficulty: request.difficulty_mode.unwrap_or_default(),
    })?;

    Ok(Json(json!({
        "status": "success",
        "session_id": session.session_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub update: SessionUpdate,
}

/// Handler for PUT /api/session/update
pub async fn update_session(
    State(state): State<Arc<SharedState>>,
    ApiJson(request): ApiJson<UpdateRequest>,
) -> ApiResult {
    let key = session_key(request.session_id)?;
    let outcome = state.context.registry.update(&key, &request.update)?;
    Ok(Json(json!({
        "status": "success",
        "alerts": outcome.alerts,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    /// Accepted here as well as in the query string.
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub inputs: PerformanceInputs,
}

/// Handler for POST /api/session/complete
pub async fn complete_session(
    State(state): State<Arc<SharedState>>,
    ApiQuery(query): ApiQuery<CompleteQuery>,
    ApiJson(request): ApiJson<CompleteRequest>,
) -> ApiResult {
    let key = session_key(query.session_id.or(request.session_id))?;
    let performance = state.context.registry.complete(&key, &request.inputs)?;
    Ok(Json(json!({
        "status": "success",
        "performance": performance,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
    pub difficulty: Option<DifficultyMode>,
}

/// Handler for GET /api/leaderboard
pub async fn get_leaderboard(
    State(state): State<Arc<SharedState>>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> ApiResult<Vec<LeaderboardEntry>> {
    let history = state.context.registry.history();
    Ok(Json(leaderboard::rank(
        &history,
        query.limit.unwrap_or(DEFAULT_LIMIT),
        query.difficulty,
    )))
}

/// Handler for GET /api/analytics
///
/// Serves the aggregator's cached snapshot plus live counters.
pub async fn get_analytics(State(state): State<Arc<SharedState>>) -> ApiResult {
    let registry = &state.context.registry;
    Ok(Json(json!({
        "overview": state.context.analytics.get(),
        "active_sessions": registry.active_count(),
        "total_completed": registry.completed_count(),
        "websocket_connections": state.websocket_connections(),
    })))
}

/// Handler for GET /api/session/{id}
pub async fn get_session(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let key = SessionKey::new(id);
    let body = match state.context.registry.lookup(&key)? {
        SessionStatus::Active { data } => {
            let objectives: BTreeMap<u32, &ObjectiveDefinition> = data
                .objectives_completed
                .iter()
                .filter_map(|id| state.context.catalog.get(*id).map(|def| (*id, def)))
                .collect();
            json!({
                "status": "active",
                "data": data,
                "objectives": objectives,
            })
        }
        completed @ SessionStatus::Completed { .. } => {
            serde_json::to_value(completed).map_err(|e| ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: e.to_string(),
            })?
        }
    };
    Ok(Json(body))
}

/// Handler for GET /api/objectives
pub async fn get_objectives(State(state): State<Arc<SharedState>>) -> ApiResult<BTreeMap<u32, ObjectiveDefinition>> {
    Ok(Json(
        state
            .context
            .catalog
            .iter()
            .map(|def| (def.id, def.clone()))
            .collect(),
    ))
}

/// Handler for GET /api/health
pub async fn health(State(state): State<Arc<SharedState>>) -> Json<Value> {
    Json(json!({
        "status": "operational",
        "active_sessions": state.context.registry.active_count(),
        "websocket_connections": state.websocket_connections(),
        "timestamp": state.context.registry.now().to_rfc3339(),
    }))
}

// ============================================================================
// TESTS
// ============================================================================
