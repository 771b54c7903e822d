use axum::{extract::State, Json};

use crate::dto::session_dto::{MixShare, SubjectInfo, SubjectsResponse, DEFAULT_NUM_QUESTIONS};
use crate::models::subject::Subject;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_subjects(State(state): State<AppState>) -> Json<SubjectsResponse> {
    let subjects = Subject::ALL
        .into_iter()
        .map(|subject| SubjectInfo {
            subject,
            label: subject.label().to_string(),
            type_mix: subject
                .type_mix()
                .into_iter()
                .filter(|(_, percent)| *percent > 0)
                .map(|(question_type, percent)| MixShare {
                    question_type,
                    percent,
                })
                .collect(),
        })
        .collect();

    let max_questions = state.quiz_service.prompts().max_questions();
    Json(SubjectsResponse {
        subjects,
        min_questions: 1,
        max_questions,
        default_questions: DEFAULT_NUM_QUESTIONS.min(max_questions),
        min_text_chars: state.quiz_service.content().min_text_chars(),
        input_methods: vec![
            "pasted_text".to_string(),
            "text_file".to_string(),
            "image".to_string(),
        ],
        accepted_uploads: vec![
            "text/plain".to_string(),
            "image/jpeg".to_string(),
            "image/png".to_string(),
        ],
    })
}
