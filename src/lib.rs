pub mod config;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use reqwest::Client;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::{
    ai_service::{AiGateway, GeminiGateway},
    content_service::ContentService,
    prompt_service::PromptService,
    quiz_service::QuizService,
    session_service::SessionStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub quiz_service: QuizService,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let gateway: Option<Arc<dyn AiGateway>> = match config.gemini_api_key.clone() {
            Some(api_key) => {
                let http_client = Client::builder()
                    .connect_timeout(Duration::from_secs(10))
                    .build()
                    .map_err(|e| Error::Config(format!("Cannot build HTTP client: {}", e)))?;
                Some(Arc::new(GeminiGateway::new(
                    api_key,
                    config.gemini_base_url.clone(),
                    config.gemini_model.clone(),
                    Duration::from_secs(config.gemini_timeout_secs),
                    http_client,
                )))
            }
            None => {
                tracing::warn!("GEMINI_API_KEY is not set; quiz generation is disabled");
                None
            }
        };
        Ok(Self::with_gateway(config, gateway))
    }

    pub fn with_gateway(config: Config, gateway: Option<Arc<dyn AiGateway>>) -> Self {
        let quiz_service = QuizService::new(
            gateway,
            PromptService::new(config.quiz_language.clone(), config.max_questions),
            ContentService::new(config.min_text_chars),
        );

        let sessions = SessionStore::with_ttl_secs(config.session_ttl_secs);

        Self {
            config: Arc::new(config),
            sessions,
            quiz_service,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    let api = Router::new()
        .route("/api/status", get(routes::health::status))
        .route("/api/subjects", get(routes::subjects::list_subjects))
        .route("/api/sessions", post(routes::session::create_session))
        .route(
            "/api/sessions/:id",
            get(routes::session::get_session).delete(routes::session::delete_session),
        )
        .route(
            "/api/sessions/:id/material",
            put(routes::session::set_text_material).delete(routes::session::clear_material),
        )
        .route(
            "/api/sessions/:id/material/upload",
            post(routes::session::upload_material),
        )
        .route(
            "/api/sessions/:id/generate",
            post(routes::session::generate_quiz),
        )
        .route("/api/sessions/:id/answers", put(routes::session::save_answer))
        .route("/api/sessions/:id/score", get(routes::session::get_score));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}
