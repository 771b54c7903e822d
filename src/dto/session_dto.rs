use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{QuestionType, Quiz};
use crate::models::score::{QuestionFeedback, ScoreSummary};
use crate::models::session::{AnswerRecord, Material, SessionPhase, SessionState};
use crate::models::subject::Subject;
use crate::services::prompt_service::TypeAllocation;

pub const DEFAULT_NUM_QUESTIONS: usize = 5;
pub const MISSING_KEY_NOTICE: &str =
    "Quiz generation is unavailable: the AI API key has not been configured.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminQuery {
    pub admin: Option<String>,
}

impl AdminQuery {
    /// Gates visibility of diagnostics only.
    pub fn is_admin(&self) -> bool {
        self.admin.as_deref() == Some("true")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetTextMaterialRequest {
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateQuizRequest {
    #[serde(default)]
    pub subject: Subject,
    #[validate(range(min = 1))]
    pub num_questions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveAnswerRequest {
    pub question_index: usize,
    #[validate(length(max = 10000, message = "answer is too long"))]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSummary {
    pub kind: String,
    pub file_name: Option<String>,
    pub characters: Option<usize>,
    pub mime_type: Option<String>,
    pub bytes: Option<usize>,
}

impl From<&Material> for MaterialSummary {
    fn from(material: &Material) -> Self {
        let (characters, mime_type, bytes) = match material {
            Material::Text { body, .. } => (Some(body.chars().count()), None, None),
            Material::Image {
                mime_type, data, ..
            } => (None, Some(mime_type.clone()), Some(data.len())),
        };
        Self {
            kind: material.kind().to_string(),
            file_name: material.file_name().map(str::to_string),
            characters,
            mime_type,
            bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub api_key_configured: bool,
    pub model: String,
    pub active_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub material: Option<MaterialSummary>,
    pub quiz: Option<Quiz>,
    pub answers: AnswerRecord,
    pub generation_enabled: bool,
    pub notices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionView {
    pub fn new(
        session: SessionState,
        generation_enabled: bool,
        diagnostics: Option<Diagnostics>,
    ) -> Self {
        let notices = if generation_enabled {
            vec![]
        } else {
            vec![MISSING_KEY_NOTICE.to_string()]
        };
        Self {
            id: session.id,
            phase: session.phase,
            material: session.material.as_ref().map(MaterialSummary::from),
            quiz: session.quiz,
            answers: session.answers,
            generation_enabled,
            notices,
            diagnostics,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQuizResponse {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub quiz: Quiz,
    pub allocation: Vec<TypeAllocation>,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAnswerResponse {
    pub saved: bool,
    pub question_index: usize,
    pub phase: SessionPhase,
    pub answered: usize,
    pub total_questions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub session_id: Uuid,
    pub correct: usize,
    pub total_graded: usize,
    pub auto_graded: bool,
    pub percentage: Option<f64>,
    pub message: String,
    pub feedback: Vec<QuestionFeedback>,
}

impl ScoreResponse {
    pub fn new(session_id: Uuid, summary: ScoreSummary, feedback: Vec<QuestionFeedback>) -> Self {
        let message = if summary.is_gradable() {
            format!(
                "{} of {} multiple-choice questions correct",
                summary.correct, summary.total_graded
            )
        } else {
            "No automatic score: this quiz has no multiple-choice questions. Compare your answers with the model answers."
                .to_string()
        };
        Self {
            session_id,
            correct: summary.correct,
            total_graded: summary.total_graded,
            auto_graded: summary.is_gradable(),
            percentage: summary.percentage(),
            message,
            feedback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub generation_enabled: bool,
    pub notices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixShare {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub subject: Subject,
    pub label: String,
    pub type_mix: Vec<MixShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectsResponse {
    pub subjects: Vec<SubjectInfo>,
    pub min_questions: usize,
    pub max_questions: usize,
    pub default_questions: usize,
    pub min_text_chars: usize,
    pub input_methods: Vec<String>,
    pub accepted_uploads: Vec<String>,
}
