use serde::{Deserialize, Serialize};

use crate::models::question::QuestionType;

/// School subjects a quiz can be tailored to. Anything unrecognised is `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Subject {
    #[default]
    General,
    Japanese,
    Math,
    Science,
    History,
    Geography,
    English,
}

/// Percentage share of each generated question type, in `QuestionType::GENERATED` order.
pub type TypeMix = [(QuestionType, u32); 4];

impl Subject {
    pub const ALL: [Subject; 7] = [
        Subject::General,
        Subject::Japanese,
        Subject::Math,
        Subject::Science,
        Subject::History,
        Subject::Geography,
        Subject::English,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::General => "general",
            Subject::Japanese => "japanese",
            Subject::Math => "math",
            Subject::Science => "science",
            Subject::History => "history",
            Subject::Geography => "geography",
            Subject::English => "english",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Subject::General => "General / any subject",
            Subject::Japanese => "Japanese language arts",
            Subject::Math => "Mathematics",
            Subject::Science => "Science",
            Subject::History => "History",
            Subject::Geography => "Geography",
            Subject::English => "English",
        }
    }

    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == normalized)
            .unwrap_or_default()
    }

    pub fn type_mix(&self) -> TypeMix {
        use QuestionType::{Descriptive, FillInTheBlank, Meaning, MultipleChoice};
        let shares = match self {
            Subject::General => [25, 25, 25, 25],
            Subject::Japanese => [10, 30, 20, 40],
            Subject::Math => [60, 20, 20, 0],
            Subject::Science => [70, 30, 0, 0],
            Subject::History | Subject::Geography => [0, 30, 50, 20],
            Subject::English => [30, 0, 30, 40],
        };
        [
            (MultipleChoice, shares[0]),
            (Descriptive, shares[1]),
            (FillInTheBlank, shares[2]),
            (Meaning, shares[3]),
        ]
    }
}

impl From<String> for Subject {
    fn from(raw: String) -> Self {
        Subject::parse(&raw)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_mix_sums_to_one_hundred() {
        for subject in Subject::ALL {
            let total: u32 = subject.type_mix().iter().map(|(_, pct)| pct).sum();
            assert_eq!(total, 100, "{subject} mix sums to {total}");
        }
    }

    #[test]
    fn history_and_geography_share_a_mix() {
        let mix = Subject::History.type_mix();
        assert_eq!(mix, Subject::Geography.type_mix());
        assert_eq!(mix[2], (QuestionType::FillInTheBlank, 50));
        assert_eq!(mix[1], (QuestionType::Descriptive, 30));
        assert_eq!(mix[3], (QuestionType::Meaning, 20));
    }

    #[test]
    fn unknown_subject_falls_back_to_even_mix() {
        let subject = Subject::parse("astrology");
        assert_eq!(subject, Subject::General);
        assert!(subject.type_mix().iter().all(|(_, pct)| *pct == 25));

        let parsed: Subject = serde_json::from_str("\"Science\"").unwrap();
        assert_eq!(parsed, Subject::Science);
        assert_eq!(serde_json::to_string(&Subject::Math).unwrap(), "\"math\"");
    }
}
