use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::question::Quiz;

/// Question index to the user's submitted answer.
pub type AnswerRecord = BTreeMap<usize, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    MaterialProvided,
    Generating,
    Ready,
    Answering,
    Scored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Material {
    Text {
        body: String,
        file_name: Option<String>,
    },
    Image {
        mime_type: String,
        data: Bytes,
        file_name: Option<String>,
    },
}

impl Material {
    pub fn kind(&self) -> &'static str {
        match self {
            Material::Text { file_name: None, .. } => "pasted_text",
            Material::Text { file_name: Some(_), .. } => "text_file",
            Material::Image { .. } => "image",
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            Material::Text { file_name, .. } | Material::Image { file_name, .. } => {
                file_name.as_deref()
            }
        }
    }
}

/// Issued when a generation starts; completion is only accepted if the
/// material has not been replaced in the meantime.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub revision: u64,
    pub material: Material,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub material: Option<Material>,
    pub material_revision: u64,
    pub quiz: Option<Quiz>,
    pub answers: AnswerRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            phase: SessionPhase::Idle,
            material: None,
            material_revision: 0,
            quiz: None,
            answers: AnswerRecord::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn reset_quiz(&mut self) {
        self.quiz = None;
        self.answers.clear();
        self.material_revision += 1;
        self.updated_at = Utc::now();
    }

    pub fn provide_material(&mut self, material: Material) {
        self.material = Some(material);
        self.reset_quiz();
        self.phase = SessionPhase::MaterialProvided;
    }

    pub fn clear_material(&mut self) {
        self.material = None;
        self.reset_quiz();
        self.phase = SessionPhase::Idle;
    }

    fn ensure_not_generating(&self) -> Result<()> {
        if self.phase == SessionPhase::Generating {
            return Err(Error::Conflict(
                "A quiz is already being generated for this session".to_string(),
            ));
        }
        Ok(())
    }

    /// The previous quiz and its answers are dropped here, so a failed or
    /// abandoned generation always leaves the session without a quiz.
    pub fn begin_generation(&mut self) -> Result<GenerationTicket> {
        self.ensure_not_generating()?;
        let material = self.material.clone().ok_or_else(|| {
            Error::BadRequest("Provide study material before generating a quiz".to_string())
        })?;

        self.quiz = None;
        self.answers.clear();
        self.phase = SessionPhase::Generating;
        self.updated_at = Utc::now();
        Ok(GenerationTicket {
            revision: self.material_revision,
            material,
        })
    }

    /// Returns false when the ticket is stale and the quiz was discarded.
    pub fn complete_generation(&mut self, ticket: &GenerationTicket, quiz: Quiz) -> bool {
        if ticket.revision != self.material_revision {
            return false;
        }
        self.quiz = Some(quiz);
        self.answers.clear();
        self.phase = SessionPhase::Ready;
        self.updated_at = Utc::now();
        true
    }

    pub fn fail_generation(&mut self, ticket: &GenerationTicket) {
        if ticket.revision != self.material_revision || self.phase != SessionPhase::Generating {
            return;
        }
        self.quiz = None;
        self.answers.clear();
        self.phase = SessionPhase::MaterialProvided;
        self.updated_at = Utc::now();
    }

    pub fn record_answer(&mut self, index: usize, answer: String) -> Result<()> {
        self.ensure_not_generating()?;
        let quiz = self
            .quiz
            .as_ref()
            .ok_or_else(|| Error::BadRequest("No quiz has been generated yet".to_string()))?;
        if index >= quiz.len() {
            return Err(Error::BadRequest(format!(
                "Question index {} is out of range (quiz has {} questions)",
                index,
                quiz.len()
            )));
        }

        self.answers.insert(index, answer);
        self.phase = SessionPhase::Answering;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_scored(&mut self) -> Result<&Quiz> {
        self.ensure_not_generating()?;
        let quiz = self
            .quiz
            .as_ref()
            .ok_or_else(|| Error::BadRequest("No quiz has been generated yet".to_string()))?;
        self.phase = SessionPhase::Scored;
        self.updated_at = Utc::now();
        Ok(quiz)
    }
}
