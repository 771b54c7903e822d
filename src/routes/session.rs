use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::session_dto::{
    AdminQuery, GenerateQuizRequest, GenerateQuizResponse, SaveAnswerRequest,
    SaveAnswerResponse, ScoreResponse, SessionView, SetTextMaterialRequest,
    DEFAULT_NUM_QUESTIONS,
};
use crate::error::{Error, Result};
use crate::models::session::SessionState;
use crate::routes::health::diagnostics;
use crate::AppState;

fn view(state: &AppState, session: SessionState, query: &AdminQuery) -> SessionView {
    SessionView::new(
        session,
        state.quiz_service.generation_enabled(),
        diagnostics(state, query),
    )
}

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Response> {
    let session = state.sessions.create()?;
    Ok((StatusCode::CREATED, Json(view(&state, session, &query))).into_response())
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<SessionView>> {
    let session = state.sessions.get(id)?;
    Ok(Json(view(&state, session, &query)))
}

#[axum::debug_handler]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.sessions.remove(id)?;
    tracing::info!(session_id = %id, "Session removed");
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn set_text_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetTextMaterialRequest>,
) -> Result<Json<SessionView>> {
    req.validate()?;
    let material = state.quiz_service.content().pasted_text(&req.text)?;
    let session = state.sessions.provide_material(id, material)?;
    Ok(Json(view(&state, session, &AdminQuery::default())))
}

#[axum::debug_handler]
pub async fn upload_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>> {
    // Fail fast on unknown sessions before reading the upload.
    state.sessions.get(id)?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;

        tracing::info!(
            session_id = %id,
            file_name = ?file_name,
            content_type = ?content_type,
            bytes = data.len(),
            "Material uploaded"
        );
        let material = state.quiz_service.content().material_from_upload(
            file_name.as_deref(),
            content_type.as_deref(),
            data,
        )?;
        let session = state.sessions.provide_material(id, material)?;
        return Ok(Json(view(&state, session, &AdminQuery::default())));
    }

    Err(Error::BadRequest("Multipart body has no 'file' field".to_string()))
}

#[axum::debug_handler]
pub async fn clear_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    let session = state.sessions.clear_material(id)?;
    Ok(Json(view(&state, session, &AdminQuery::default())))
}

#[axum::debug_handler]
pub async fn generate_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<GenerateQuizRequest>,
) -> Result<Json<GenerateQuizResponse>> {
    req.validate()?;
    let num_questions = req.num_questions.unwrap_or(DEFAULT_NUM_QUESTIONS);

    let output = state
        .quiz_service
        .generate(&state.sessions, id, req.subject, num_questions)
        .await?;
    let phase = state.sessions.get(id)?.phase;

    Ok(Json(GenerateQuizResponse {
        session_id: id,
        phase,
        quiz: output.quiz,
        allocation: output.allocation,
        logs: output.logs,
    }))
}

#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<Json<SaveAnswerResponse>> {
    req.validate()?;
    let question_index = req.question_index;
    let session = state.sessions.record_answer(id, question_index, req.answer)?;

    Ok(Json(SaveAnswerResponse {
        saved: true,
        question_index,
        phase: session.phase,
        answered: session.answers.len(),
        total_questions: session.quiz.as_ref().map(|q| q.len()).unwrap_or(0),
    }))
}

#[axum::debug_handler]
pub async fn get_score(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScoreResponse>> {
    let (summary, feedback) = state.sessions.score(id)?;
    tracing::info!(
        session_id = %id,
        correct = summary.correct,
        total_graded = summary.total_graded,
        "Quiz scored"
    );
    Ok(Json(ScoreResponse::new(id, summary, feedback)))
}
