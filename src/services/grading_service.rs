use crate::models::question::{QuestionType, Quiz};
use crate::models::score::{QuestionFeedback, ScoreSummary};
use crate::models::session::AnswerRecord;

pub struct GradingService;

impl GradingService {
    /// Exact string match of the recorded answer against the option flagged
    /// `is_correct`. A multiple-choice question without a correct option still
    /// counts towards `total_graded`.
    pub fn score(quiz: &Quiz, answers: &AnswerRecord) -> ScoreSummary {
        let mut correct = 0;
        let mut total_graded = 0;

        for (idx, q) in quiz.questions.iter().enumerate() {
            if q.question_type != QuestionType::MultipleChoice {
                continue;
            }
            total_graded += 1;

            let expected = q.correct_option().map(|o| o.text.as_str());
            let given = answers.get(&idx).map(String::as_str);
            if expected.is_some() && expected == given {
                correct += 1;
            }
        }

        ScoreSummary {
            correct,
            total_graded,
        }
    }

    pub fn feedback(quiz: &Quiz, answers: &AnswerRecord) -> Vec<QuestionFeedback> {
        quiz.questions
            .iter()
            .enumerate()
            .map(|(idx, q)| {
                let user_answer = answers.get(&idx).cloned();
                let correct_answer = q.expected_answer().map(str::to_string);
                let is_correct = if q.question_type.is_auto_graded() {
                    Some(user_answer.is_some() && user_answer == correct_answer)
                } else {
                    None
                };

                QuestionFeedback {
                    index: idx,
                    id: q.id,
                    question_type: q.question_type,
                    question: q.question.clone(),
                    answered: user_answer.is_some(),
                    user_answer,
                    is_correct,
                    correct_answer,
                    explanation: q.explanation.clone(),
                }
            })
            .collect()
    }
}
