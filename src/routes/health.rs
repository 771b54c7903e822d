use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::dto::session_dto::{AdminQuery, Diagnostics, StatusResponse, MISSING_KEY_NOTICE};
use crate::AppState;

#[axum::debug_handler]
pub async fn health() -> impl IntoResponse {
    let body = json!({
        "status": "ok",
    });
    (StatusCode::OK, Json(body))
}

pub(crate) fn diagnostics(state: &AppState, query: &AdminQuery) -> Option<Diagnostics> {
    query.is_admin().then(|| Diagnostics {
        api_key_configured: state.quiz_service.generation_enabled(),
        model: state
            .quiz_service
            .model_name()
            .unwrap_or_else(|| state.config.gemini_model.clone()),
        active_sessions: state.sessions.len(),
    })
}

#[axum::debug_handler]
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Json<StatusResponse> {
    let generation_enabled = state.quiz_service.generation_enabled();
    let notices = if generation_enabled {
        vec![]
    } else {
        vec![MISSING_KEY_NOTICE.to_string()]
    };

    Json(StatusResponse {
        status: "ok".to_string(),
        generation_enabled,
        notices,
        diagnostics: diagnostics(&state, &query),
    })
}
