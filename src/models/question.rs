use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    Descriptive,
    FillInTheBlank,
    Meaning,
    Unknown,
}

impl QuestionType {
    /// Types the model is asked to produce, in type-mix column order.
    pub const GENERATED: [QuestionType; 4] = [
        QuestionType::MultipleChoice,
        QuestionType::Descriptive,
        QuestionType::FillInTheBlank,
        QuestionType::Meaning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Descriptive => "descriptive",
            QuestionType::FillInTheBlank => "fill_in_the_blank",
            QuestionType::Meaning => "meaning",
            QuestionType::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "multiple_choice" => Some(QuestionType::MultipleChoice),
            "descriptive" => Some(QuestionType::Descriptive),
            "fill_in_the_blank" => Some(QuestionType::FillInTheBlank),
            "meaning" => Some(QuestionType::Meaning),
            _ => None,
        }
    }

    pub fn is_auto_graded(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Multiple-choice questions carry options; every other type carries a model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerKey {
    Options { options: Vec<QuestionOption> },
    Text { correct_answer: String },
}

/// A field the model left out, substituted with placeholder text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldWarning {
    MissingType,
    UnrecognisedType,
    MissingQuestion,
    MissingOptions,
    MissingOptionText,
    NoCorrectOption,
    MissingCorrectAnswer,
    MissingExplanation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    #[serde(flatten)]
    pub answer_key: AnswerKey,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FieldWarning>,
}

impl QuizQuestion {
    pub fn options(&self) -> &[QuestionOption] {
        match &self.answer_key {
            AnswerKey::Options { options } => options,
            AnswerKey::Text { .. } => &[],
        }
    }

    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.options().iter().find(|o| o.is_correct)
    }

    /// The answer shown to the user after they respond.
    pub fn expected_answer(&self) -> Option<&str> {
        match &self.answer_key {
            AnswerKey::Options { .. } => self.correct_option().map(|o| o.text.as_str()),
            AnswerKey::Text { correct_answer } => Some(correct_answer.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QuizQuestion> {
        self.questions.get(index)
    }

    pub fn count_of(&self, question_type: QuestionType) -> usize {
        self.questions
            .iter()
            .filter(|q| q.question_type == question_type)
            .count()
    }
}
