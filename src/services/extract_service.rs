use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("The AI reply contained no JSON object")]
    NoJsonObject { raw_text: String },

    #[error("The AI reply contained malformed JSON: {reason}")]
    InvalidJson { reason: String, raw_text: String },

    #[error("The AI reply contained no questions")]
    EmptyQuiz { raw_text: String },
}

impl ExtractionError {
    pub fn raw_text(&self) -> &str {
        match self {
            ExtractionError::NoJsonObject { raw_text }
            | ExtractionError::InvalidJson { raw_text, .. }
            | ExtractionError::EmptyQuiz { raw_text } => raw_text,
        }
    }
}

/// First `{` through last `}`, greedy and non-recursive. Braces are not balanced:
/// two separate objects in one reply yield one span that fails to parse.
fn json_span() -> &'static Regex {
    static JSON_SPAN: OnceLock<Regex> = OnceLock::new();
    JSON_SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static pattern compiles"))
}

pub struct ExtractService;

impl ExtractService {
    pub fn extract(raw_text: &str) -> Result<JsonValue, ExtractionError> {
        let span = json_span()
            .find(raw_text)
            .ok_or_else(|| ExtractionError::NoJsonObject {
                raw_text: raw_text.to_string(),
            })?;

        serde_json::from_str(span.as_str()).map_err(|e| ExtractionError::InvalidJson {
            reason: e.to_string(),
            raw_text: raw_text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_json_round_trips() {
        let value = json!({"questions": [{"id": 1, "type": "meaning", "question": "q"}]});
        let text = value.to_string();
        assert_eq!(ExtractService::extract(&text).unwrap(), value);
    }

    #[test]
    fn surrounding_prose_and_fences_are_ignored() {
        let text = "Sure! Here is your quiz:\n```json\n{\"questions\": []}\n```\nGood luck.";
        assert_eq!(ExtractService::extract(text).unwrap(), json!({"questions": []}));
    }

    #[test]
    fn nested_objects_survive_greedy_match() {
        let text = r#"{"questions":[{"options":[{"text":"a","is_correct":true}]}]}"#;
        let value = ExtractService::extract(text).unwrap();
        assert_eq!(value["questions"][0]["options"][0]["is_correct"], true);
    }

    #[test]
    fn text_without_braces_is_an_extraction_error() {
        let err = ExtractService::extract("I cannot read this image.").unwrap_err();
        assert!(matches!(err, ExtractionError::NoJsonObject { .. }));
        assert_eq!(err.raw_text(), "I cannot read this image.");
    }

    #[test]
    fn truncated_json_keeps_raw_text() {
        let text = r#"{"questions": [{"id": 1, "question": "What is"#;
        let err = ExtractService::extract(text).unwrap_err();
        assert!(matches!(err, ExtractionError::NoJsonObject { .. }));

        let text = r#"{"questions": [{"id": 1}, {"id": 2}"#.to_string() + "}";
        let err = ExtractService::extract(&text).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson { .. }));
        assert_eq!(err.raw_text(), text);
    }

    #[test]
    fn two_objects_are_not_split() {
        let text = r#"{"a": 1} and then {"b": 2}"#;
        assert!(matches!(
            ExtractService::extract(text),
            Err(ExtractionError::InvalidJson { .. })
        ));
    }
}
