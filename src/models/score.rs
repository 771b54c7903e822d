use serde::{Deserialize, Serialize};

use crate::models::question::QuestionType;

/// Tally over multiple-choice questions only. `total_graded == 0` means the quiz
/// has nothing to grade automatically, which is not the same as scoring zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub correct: usize,
    pub total_graded: usize,
}

impl ScoreSummary {
    pub fn is_gradable(&self) -> bool {
        self.total_graded > 0
    }

    pub fn percentage(&self) -> Option<f64> {
        self.is_gradable()
            .then(|| self.correct as f64 * 100.0 / self.total_graded as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionFeedback {
    pub index: usize,
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    pub answered: bool,
    pub user_answer: Option<String>,
    /// `None` for types that are self-checked against the model answer.
    pub is_correct: Option<bool>,
    pub correct_answer: Option<String>,
    pub explanation: String,
}
