use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::services::content_service::ContentPart;

/// The hosted model behind quiz generation. One call per Generate action, no retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Sends the assembled parts and returns the raw text of the model's reply.
    async fn generate(&self, parts: &[ContentPart]) -> Result<String>;

    fn model_name(&self) -> String;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: &'a [ContentPart],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Clone)]
pub struct GeminiGateway {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiGateway {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
        client: Client,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl AiGateway for GeminiGateway {
    async fn generate(&self, parts: &[ContentPart]) -> Result<String> {
        let payload = GenerateContentRequest {
            contents: vec![RequestContent { role: "user", parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        tracing::info!(model = %self.model, parts = parts.len(), "Sending generateContent request");
        let res = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("Request to Gemini failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            tracing::error!(%status, %message, "Gemini API returned an error");
            return Err(Error::Gateway(format!("Gemini API error {}: {}", status, message)));
        }

        let body: GenerateContentResponse = res
            .json()
            .await
            .map_err(|e| Error::Gateway(format!("Unreadable Gemini response: {}", e)))?;
        reply_text(body)
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

fn reply_text(body: GenerateContentResponse) -> Result<String> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::Gateway("Gemini returned no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(Error::Gateway(format!(
            "Gemini returned an empty reply (finish reason: {})",
            reason
        )));
    }
    Ok(text)
}
