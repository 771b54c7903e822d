use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::question::{
    AnswerKey, FieldWarning, QuestionOption, QuestionType, Quiz, QuizQuestion,
};
use crate::models::session::GenerationTicket;
use crate::models::subject::Subject;
use crate::services::ai_service::AiGateway;
use crate::services::content_service::{ContentPart, ContentService};
use crate::services::extract_service::{ExtractService, ExtractionError};
use crate::services::prompt_service::{PromptService, TypeAllocation};
use crate::services::session_service::SessionStore;

pub const MISSING_QUESTION: &str = "question text missing";
pub const MISSING_ANSWER: &str = "no answer data";
pub const MISSING_OPTION: &str = "option text missing";
pub const MISSING_EXPLANATION: &str = "no explanation provided";

#[derive(Clone, Debug, Serialize)]
pub struct GenerationOutput {
    pub quiz: Quiz,
    pub allocation: Vec<TypeAllocation>,
    pub logs: Vec<String>,
}

#[derive(Clone)]
pub struct QuizService {
    gateway: Option<Arc<dyn AiGateway>>,
    prompts: PromptService,
    content: ContentService,
}

impl QuizService {
    pub fn new(
        gateway: Option<Arc<dyn AiGateway>>,
        prompts: PromptService,
        content: ContentService,
    ) -> Self {
        Self {
            gateway,
            prompts,
            content,
        }
    }

    pub fn generation_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    pub fn model_name(&self) -> Option<String> {
        self.gateway.as_ref().map(|g| g.model_name())
    }

    pub fn prompts(&self) -> &PromptService {
        &self.prompts
    }

    pub fn content(&self) -> &ContentService {
        &self.content
    }

    /// Runs one Generate action for a session. On any failure the session goes
    /// back to `MaterialProvided` with no quiz.
    pub async fn generate(
        &self,
        sessions: &SessionStore,
        session_id: Uuid,
        subject: Subject,
        num_questions: usize,
    ) -> Result<GenerationOutput> {
        let gateway = self.gateway.as_ref().ok_or_else(|| {
            Error::Config("Quiz generation is disabled: no API key is configured".to_string())
        })?;
        let prompt = self.prompts.build(subject, num_questions)?;

        let ticket = sessions.begin_generation(session_id)?;
        let mut pending = PendingGeneration::new(sessions, session_id, ticket);
        let mut logs: Vec<String> = vec![format!(
            "Requesting {} {} questions from {}.",
            num_questions,
            subject,
            gateway.model_name()
        )];

        let parts = self.content.assemble(&prompt.instruction, &pending.ticket.material);
        let attempt = request_quiz(gateway.as_ref(), &parts, &mut logs).await;

        let quiz = match attempt {
            Ok(quiz) => quiz,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Quiz generation failed");
                return Err(e);
            }
        };

        let warnings: usize = quiz.questions.iter().map(|q| q.warnings.len()).sum();
        logs.push(format!(
            "Parsed {} questions with {} missing fields.",
            quiz.len(),
            warnings
        ));

        let accepted = sessions.complete_generation(session_id, &pending.ticket, quiz.clone())?;
        pending.disarm();
        if !accepted {
            tracing::info!(session_id = %session_id, "Material changed during generation; quiz discarded");
            return Err(Error::Conflict(
                "Study material changed while the quiz was generated; generate again".to_string(),
            ));
        }

        tracing::info!(
            session_id = %session_id,
            questions = quiz.len(),
            warnings,
            "Quiz ready"
        );

        Ok(GenerationOutput {
            quiz,
            allocation: prompt.allocation,
            logs,
        })
    }
}

/// Releases the session's `Generating` phase if generation ends without
/// completing, including when the request future is dropped mid-call.
struct PendingGeneration {
    sessions: SessionStore,
    session_id: Uuid,
    ticket: GenerationTicket,
    armed: bool,
}

impl PendingGeneration {
    fn new(sessions: &SessionStore, session_id: Uuid, ticket: GenerationTicket) -> Self {
        Self {
            sessions: sessions.clone(),
            session_id,
            ticket,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGeneration {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!(session_id = %self.session_id, "Releasing unfinished generation");
        if let Err(e) = self.sessions.fail_generation(self.session_id, &self.ticket) {
            tracing::debug!(session_id = %self.session_id, error = %e, "Session gone before release");
        }
    }
}

async fn request_quiz(
    gateway: &dyn AiGateway,
    parts: &[ContentPart],
    logs: &mut Vec<String>,
) -> Result<Quiz> {
    let raw_text = gateway.generate(parts).await?;
    logs.push(format!("Reply received ({} characters).", raw_text.chars().count()));

    let value = ExtractService::extract(&raw_text)?;
    let quiz = parse_quiz(&value);
    if quiz.is_empty() {
        return Err(ExtractionError::EmptyQuiz { raw_text }.into());
    }
    Ok(quiz)
}

/// Builds a quiz from decoded model output. Missing fields get placeholder text
/// and a warning; one malformed entry never drops the rest.
pub fn parse_quiz(raw: &JsonValue) -> Quiz {
    let entries = if let Some(arr) = raw.get("questions").and_then(|a| a.as_array()) {
        arr.as_slice()
    } else if let Some(arr) = raw.as_array() {
        arr.as_slice()
    } else {
        &[]
    };

    let questions = entries
        .iter()
        .enumerate()
        .map(|(idx, v)| coerce_question(idx, v))
        .collect();
    Quiz::new(questions)
}

fn coerce_question(idx: usize, v: &JsonValue) -> QuizQuestion {
    let mut warnings = Vec::new();

    let question_type = match v.get("type").and_then(|t| t.as_str()) {
        Some(raw) => QuestionType::parse(raw).unwrap_or_else(|| {
            warnings.push(FieldWarning::UnrecognisedType);
            QuestionType::Unknown
        }),
        None => {
            warnings.push(FieldWarning::MissingType);
            QuestionType::Unknown
        }
    };

    let question = non_empty_str(v, "question").unwrap_or_else(|| {
        warnings.push(FieldWarning::MissingQuestion);
        MISSING_QUESTION.to_string()
    });

    let answer_key = if question_type == QuestionType::MultipleChoice {
        AnswerKey::Options {
            options: coerce_options(v, &mut warnings),
        }
    } else {
        let correct_answer = answer_text(v).unwrap_or_else(|| {
            warnings.push(FieldWarning::MissingCorrectAnswer);
            MISSING_ANSWER.to_string()
        });
        AnswerKey::Text { correct_answer }
    };

    let explanation = non_empty_str(v, "explanation").unwrap_or_else(|| {
        warnings.push(FieldWarning::MissingExplanation);
        MISSING_EXPLANATION.to_string()
    });

    let id = v
        .get("id")
        .and_then(|i| i.as_i64())
        .unwrap_or((idx as i64) + 1);

    if !warnings.is_empty() {
        tracing::warn!(question = idx + 1, ?warnings, "Question has missing fields");
    }

    QuizQuestion {
        id,
        question_type,
        question,
        answer_key,
        explanation,
        warnings,
    }
}

fn coerce_options(v: &JsonValue, warnings: &mut Vec<FieldWarning>) -> Vec<QuestionOption> {
    let Some(raw_options) = v.get("options").and_then(|o| o.as_array()) else {
        warnings.push(FieldWarning::MissingOptions);
        return Vec::new();
    };
    if raw_options.is_empty() {
        warnings.push(FieldWarning::MissingOptions);
    }

    let mut missing_text = false;
    let options: Vec<QuestionOption> = raw_options
        .iter()
        .map(|o| {
            // Some replies use bare strings for options.
            let text = o
                .get("text")
                .and_then(|t| t.as_str())
                .or_else(|| o.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty());
            let text = match text {
                Some(t) => t.to_string(),
                None => {
                    missing_text = true;
                    MISSING_OPTION.to_string()
                }
            };
            QuestionOption {
                text,
                is_correct: o.get("is_correct").and_then(|c| c.as_bool()).unwrap_or(false),
            }
        })
        .collect();

    if missing_text {
        warnings.push(FieldWarning::MissingOptionText);
    }
    if !options.is_empty() && !options.iter().any(|o| o.is_correct) {
        warnings.push(FieldWarning::NoCorrectOption);
    }
    options
}

fn non_empty_str(v: &JsonValue, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|s| s.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Models sometimes answer with a number or a list instead of a string.
fn answer_text(v: &JsonValue) -> Option<String> {
    match v.get("correct_answer")? {
        JsonValue::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Array(items) => {
            let joined: Vec<String> = items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string).or_else(|| {
                    i.is_number().then(|| i.to_string())
                }))
                .collect();
            (!joined.is_empty()).then(|| joined.join(", "))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::{Material, SessionPhase};
    use crate::services::ai_service::MockAiGateway;
    use serde_json::json;

    fn long_text() -> String {
        "The water cycle moves water between oceans, air and land. ".repeat(3)
    }

    fn service_with(gateway: MockAiGateway) -> QuizService {
        QuizService::new(
            Some(Arc::new(gateway)),
            PromptService::new("Japanese".into(), 20),
            ContentService::new(100),
        )
    }

    fn session_with_material(store: &SessionStore) -> Uuid {
        let session = store.create().unwrap();
        store
            .provide_material(session.id, Material::Text { body: long_text(), file_name: None })
            .unwrap();
        session.id
    }

    fn mcq_json(id: i64) -> JsonValue {
        json!({
            "id": id,
            "type": "multiple_choice",
            "question": "Where does most evaporation happen?",
            "options": [
                {"text": "Oceans", "is_correct": true},
                {"text": "Glaciers", "is_correct": false},
                {"text": "Deserts", "is_correct": false},
                {"text": "Caves", "is_correct": false}
            ],
            "explanation": "Oceans cover most of the surface."
        })
    }

    fn descriptive_json(id: i64) -> JsonValue {
        json!({
            "id": id,
            "type": "descriptive",
            "question": "Describe condensation.",
            "correct_answer": "Vapour cooling into droplets.",
            "explanation": "See paragraph two."
        })
    }

    #[test]
    fn missing_fields_get_placeholders() {
        let quiz = parse_quiz(&json!({
            "questions": [
                {"type": "meaning"},
                {"question": "Untyped?", "correct_answer": "yes", "explanation": "e"},
                {"type": "multiple_choice", "question": "No options", "explanation": "e"}
            ]
        }));

        assert_eq!(quiz.len(), 3);

        let first = &quiz.questions[0];
        assert_eq!(first.question, MISSING_QUESTION);
        assert_eq!(first.expected_answer(), Some(MISSING_ANSWER));
        assert_eq!(first.explanation, MISSING_EXPLANATION);
        assert_eq!(first.id, 1);
        assert!(first.warnings.contains(&FieldWarning::MissingCorrectAnswer));

        let second = &quiz.questions[1];
        assert_eq!(second.question_type, QuestionType::Unknown);
        assert_eq!(second.warnings, vec![FieldWarning::MissingType]);

        let third = &quiz.questions[2];
        assert!(third.options().is_empty());
        assert!(third.warnings.contains(&FieldWarning::MissingOptions));
    }

    #[test]
    fn bare_string_options_and_numeric_answers_are_accepted() {
        let quiz = parse_quiz(&json!([
            {"type": "multiple_choice", "question": "q", "options": ["a", "b"], "explanation": "e"},
            {"type": "fill_in_the_blank", "question": "2 + 2 = ____", "correct_answer": 4, "explanation": "e"}
        ]));

        assert_eq!(quiz.questions[0].options()[0].text, "a");
        assert!(quiz.questions[0].warnings.contains(&FieldWarning::NoCorrectOption));
        assert_eq!(quiz.questions[1].expected_answer(), Some("4"));
    }

    #[test]
    fn non_object_reply_yields_empty_quiz() {
        assert!(parse_quiz(&json!({"quiz": "nope"})).is_empty());
        assert!(parse_quiz(&json!({"questions": "nope"})).is_empty());
    }

    #[tokio::test]
    async fn science_reply_becomes_ready_quiz() {
        let reply = json!({
            "questions": [mcq_json(1), mcq_json(2), mcq_json(3), descriptive_json(4), descriptive_json(5)]
        })
        .to_string();

        let mut gateway = MockAiGateway::new();
        gateway.expect_model_name().return_const("mock-model".to_string());
        gateway
            .expect_generate()
            .withf(|parts| parts.len() == 3)
            .times(1)
            .returning(move |_| Ok(format!("Here you go:\n{}", reply)));

        let store = SessionStore::new();
        let id = session_with_material(&store);
        let output = service_with(gateway)
            .generate(&store, id, Subject::Science, 5)
            .await
            .unwrap();

        assert_eq!(output.quiz.len(), 5);
        assert_eq!(output.quiz.count_of(QuestionType::MultipleChoice), 3);
        assert_eq!(output.quiz.count_of(QuestionType::Descriptive), 2);

        let session = store.get(id).unwrap();
        assert_eq!(session.phase, SessionPhase::Ready);
        assert_eq!(session.quiz.as_ref().map(|q| q.len()), Some(5));
    }

    #[tokio::test]
    async fn truncated_reply_leaves_quiz_unset() {
        let mut gateway = MockAiGateway::new();
        gateway.expect_model_name().return_const("mock-model".to_string());
        gateway
            .expect_generate()
            .returning(|_| Ok(r#"{"questions": [{"id": 1, "type": "meaning""#.to_string()));

        let store = SessionStore::new();
        let id = session_with_material(&store);
        let err = service_with(gateway)
            .generate(&store, id, Subject::General, 4)
            .await
            .unwrap_err();

        match err {
            Error::Extraction(e) => assert!(e.raw_text().starts_with("{\"questions\"")),
            other => panic!("unexpected {other:?}"),
        }
        let session = store.get(id).unwrap();
        assert!(session.quiz.is_none());
        assert_eq!(session.phase, SessionPhase::MaterialProvided);
    }

    #[tokio::test]
    async fn gateway_error_is_surfaced_verbatim() {
        let mut gateway = MockAiGateway::new();
        gateway.expect_model_name().return_const("mock-model".to_string());
        gateway
            .expect_generate()
            .returning(|_| Err(Error::Gateway("quota exceeded".to_string())));

        let store = SessionStore::new();
        let id = session_with_material(&store);
        let err = service_with(gateway)
            .generate(&store, id, Subject::Math, 3)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Gateway(ref m) if m == "quota exceeded"));
        assert_eq!(store.get(id).unwrap().phase, SessionPhase::MaterialProvided);
    }

    #[tokio::test]
    async fn empty_question_list_is_an_extraction_error() {
        let mut gateway = MockAiGateway::new();
        gateway.expect_model_name().return_const("mock-model".to_string());
        gateway
            .expect_generate()
            .returning(|_| Ok(r#"{"questions": []}"#.to_string()));

        let store = SessionStore::new();
        let id = session_with_material(&store);
        let err = service_with(gateway)
            .generate(&store, id, Subject::English, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(ExtractionError::EmptyQuiz { .. })));
    }

    #[test]
    fn missing_gateway_is_a_configuration_error() {
        let service = QuizService::new(
            None,
            PromptService::new("Japanese".into(), 20),
            ContentService::new(100),
        );
        let store = SessionStore::new();
        let id = session_with_material(&store);

        let err = tokio_test::block_on(service.generate(&store, id, Subject::General, 5))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(store.get(id).unwrap().phase, SessionPhase::MaterialProvided);
    }

    struct StalledGateway;

    #[async_trait::async_trait]
    impl AiGateway for StalledGateway {
        async fn generate(&self, _parts: &[ContentPart]) -> Result<String> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }

        fn model_name(&self) -> String {
            "stalled-model".to_string()
        }
    }

    #[tokio::test]
    async fn dropped_request_releases_the_session() {
        let service = QuizService::new(
            Some(Arc::new(StalledGateway)),
            PromptService::new("Japanese".into(), 20),
            ContentService::new(100),
        );
        let store = SessionStore::new();
        let id = session_with_material(&store);

        let attempt = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            service.generate(&store, id, Subject::Science, 5),
        )
        .await;
        assert!(attempt.is_err());

        let session = store.get(id).unwrap();
        assert_eq!(session.phase, SessionPhase::MaterialProvided);
        assert!(session.quiz.is_none());
        assert!(store.begin_generation(id).is_ok());
    }

    #[tokio::test]
    async fn invalid_count_never_reaches_gateway() {
        let mut gateway = MockAiGateway::new();
        gateway.expect_generate().times(0);

        let store = SessionStore::new();
        let id = session_with_material(&store);
        let err = service_with(gateway)
            .generate(&store, id, Subject::General, 50)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
