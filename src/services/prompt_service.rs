use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::models::question::QuestionType;
use crate::models::subject::{Subject, TypeMix};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAllocation {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub percent: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    pub subject: Subject,
    pub num_questions: usize,
    pub allocation: Vec<TypeAllocation>,
    pub instruction: String,
}

#[derive(Clone, Debug)]
pub struct PromptService {
    language: String,
    max_questions: usize,
}

impl PromptService {
    pub fn new(language: String, max_questions: usize) -> Self {
        Self {
            language,
            max_questions: max_questions.max(1),
        }
    }

    pub fn max_questions(&self) -> usize {
        self.max_questions
    }

    pub fn build(&self, subject: Subject, num_questions: usize) -> Result<Prompt> {
        if num_questions == 0 || num_questions > self.max_questions {
            return Err(Error::BadRequest(format!(
                "Question count must be between 1 and {}, got {}",
                self.max_questions, num_questions
            )));
        }

        let allocation = allocate(&subject.type_mix(), num_questions);
        let instruction = self.render_instruction(subject, num_questions, &allocation);

        Ok(Prompt {
            subject,
            num_questions,
            allocation,
            instruction,
        })
    }

    fn render_instruction(
        &self,
        subject: Subject,
        num_questions: usize,
        allocation: &[TypeAllocation],
    ) -> String {
        let mix_lines: Vec<String> = allocation
            .iter()
            .filter(|a| a.count > 0)
            .map(|a| {
                format!(
                    "- {}: {}% ({} question{})",
                    a.question_type.as_str(),
                    a.percent,
                    a.count,
                    if a.count == 1 { "" } else { "s" }
                )
            })
            .collect();

        let schema_value = response_schema();
        let schema = serde_json::to_string_pretty(&schema_value)
            .unwrap_or_else(|_| schema_value.to_string());

        format!(
            r#"You are an experienced school teacher writing a comprehension quiz for a student.
Read the study material that follows these instructions (pasted text or a photo of a textbook page) and write exactly {num_questions} questions about it.
Write every question, option, answer and explanation in {language}.

Subject: {label}
Question type mix for this subject:
{mix}

Question types:
- multiple_choice: exactly 4 options in "options", exactly one of them with "is_correct": true. Do not include "correct_answer".
- descriptive: asks the student to explain something in a few sentences. Put a model answer in "correct_answer".
- fill_in_the_blank: a sentence from the material with the key words replaced by "____". Put the missing words in "correct_answer".
- meaning: asks what a key term or phrase from the material means. Put the meaning in "correct_answer".
Every question must include an "explanation" that points back to the material.
Number the questions with "id" starting at 1.

Reply with a single JSON object that follows this schema exactly:
{schema}

Output only the JSON object. Do not write any other text, markdown or code fences."#,
            num_questions = num_questions,
            language = self.language,
            label = subject.label(),
            mix = mix_lines.join("\n"),
            schema = schema,
        )
    }
}

/// Splits `n` questions across the mix: floor each share, then hand out the rest
/// by largest remainder. Ties go to the smaller share, then to column order.
pub fn allocate(mix: &TypeMix, n: usize) -> Vec<TypeAllocation> {
    let mut allocation: Vec<TypeAllocation> = mix
        .iter()
        .filter(|(_, pct)| *pct > 0)
        .map(|(question_type, pct)| TypeAllocation {
            question_type: *question_type,
            percent: *pct,
            count: n * (*pct as usize) / 100,
        })
        .collect();

    let assigned: usize = allocation.iter().map(|a| a.count).sum();
    let mut left = n.saturating_sub(assigned);

    let mut order: Vec<usize> = (0..allocation.len()).collect();
    order.sort_by(|&a, &b| {
        let rem_a = (n * allocation[a].percent as usize) % 100;
        let rem_b = (n * allocation[b].percent as usize) % 100;
        rem_b
            .cmp(&rem_a)
            .then(allocation[a].percent.cmp(&allocation[b].percent))
            .then(a.cmp(&b))
    });

    for idx in order {
        if left == 0 {
            break;
        }
        allocation[idx].count += 1;
        left -= 1;
    }

    allocation
}

/// The reply shape the model is told to produce.
pub fn response_schema() -> JsonValue {
    serde_json::json!({
        "questions": [
            {
                "id": 1,
                "type": "multiple_choice",
                "question": "string",
                "options": [
                    {"text": "string", "is_correct": true},
                    {"text": "string", "is_correct": false},
                    {"text": "string", "is_correct": false},
                    {"text": "string", "is_correct": false}
                ],
                "explanation": "string"
            },
            {
                "id": 2,
                "type": "descriptive | fill_in_the_blank | meaning",
                "question": "string",
                "correct_answer": "string",
                "explanation": "string"
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(allocation: &[TypeAllocation]) -> Vec<(QuestionType, usize)> {
        allocation.iter().map(|a| (a.question_type, a.count)).collect()
    }

    #[test]
    fn science_five_questions_split_three_two() {
        let prompt = PromptService::new("Japanese".into(), 20)
            .build(Subject::Science, 5)
            .unwrap();
        assert_eq!(
            counts(&prompt.allocation),
            vec![(QuestionType::MultipleChoice, 3), (QuestionType::Descriptive, 2)]
        );
        assert!(prompt.instruction.contains("multiple_choice: 70%"));
        assert!(prompt.instruction.contains("descriptive: 30%"));
        assert!(!prompt
            .instruction
            .lines()
            .any(|l| l.starts_with("- fill_in_the_blank:") && l.contains('%')));
    }

    #[test]
    fn allocation_always_sums_to_requested_count() {
        for subject in Subject::ALL {
            for n in 1..=20 {
                let allocation = allocate(&subject.type_mix(), n);
                let total: usize = allocation.iter().map(|a| a.count).sum();
                assert_eq!(total, n, "{subject} with {n} questions");
                assert!(allocation.iter().all(|a| a.percent > 0));
            }
        }
    }

    #[test]
    fn instruction_requests_exact_count() {
        let service = PromptService::new("Japanese".into(), 20);
        for n in 1..=20 {
            let prompt = service.build(Subject::History, n).unwrap();
            let expected = format!("write exactly {n} questions");
            assert!(prompt.instruction.contains(&expected), "missing count {n}");
        }
    }

    #[test]
    fn instruction_embeds_schema_and_forbids_prose() {
        let prompt = PromptService::new("English".into(), 20)
            .build(Subject::General, 4)
            .unwrap();
        assert!(prompt.instruction.contains("\"is_correct\""));
        assert!(prompt.instruction.contains("\"correct_answer\""));
        assert!(prompt.instruction.contains("Output only the JSON object"));
        assert!(prompt.instruction.contains("in English"));
    }

    #[test]
    fn even_mix_for_four_questions_is_one_each() {
        let allocation = allocate(&Subject::General.type_mix(), 4);
        assert!(allocation.iter().all(|a| a.count == 1));
    }

    #[test]
    fn out_of_range_counts_are_rejected() {
        let service = PromptService::new("Japanese".into(), 20);
        assert!(matches!(service.build(Subject::Math, 0), Err(Error::BadRequest(_))));
        assert!(matches!(service.build(Subject::Math, 21), Err(Error::BadRequest(_))));
    }
}
