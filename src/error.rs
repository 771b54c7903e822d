use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::services::extract_service::ExtractionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("AI gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, kind, error_message, raw_text) = match self {
            Error::Config(msg) => (StatusCode::SERVICE_UNAVAILABLE, "configuration", msg, None),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg, None),
            Error::Validation(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input", err.to_string(), None)
            }
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            Error::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            Error::Gateway(msg) => (StatusCode::BAD_GATEWAY, "gateway", msg, None),
            Error::Extraction(err) => {
                let raw = err.raw_text().to_string();
                (StatusCode::UNPROCESSABLE_ENTITY, "extraction", err.to_string(), Some(raw))
            }
            Error::Multipart(err) => {
                (StatusCode::BAD_REQUEST, "invalid_input", err.to_string(), None)
            }
            Error::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "An unexpected error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({ "error": kind, "message": error_message });
        if let Some(raw) = raw_text {
            body["raw_text"] = json!(raw);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value as JsonValue;

    async fn render(err: Error) -> (StatusCode, JsonValue) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn gateway_errors_keep_the_provider_message() {
        let (status, body) = render(Error::Gateway("Request to Gemini failed: timed out".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "gateway");
        assert_eq!(body["message"], "Request to Gemini failed: timed out");
        assert!(body.get("raw_text").is_none());
    }

    #[tokio::test]
    async fn extraction_errors_carry_raw_text() {
        let err = Error::from(ExtractionError::NoJsonObject { raw_text: "sorry, no quiz".into() });
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "extraction");
        assert_eq!(body["raw_text"], "sorry, no quiz");
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let (status, body) = render(Error::Internal("session store mutex poisoned".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An unexpected error occurred");
    }
}
