use crate::error::{Error, Result};
use crate::services::session_service::DEFAULT_SESSION_TTL_SECS;
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_timeout_secs: u64,
    pub max_questions: usize,
    pub min_text_chars: usize,
    pub quiz_language: String,
    pub max_upload_bytes: usize,
    pub session_ttl_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:8080"),
            gemini_api_key: resolve_api_key()?,
            gemini_model: get_env_or("GEMINI_MODEL", "gemini-2.5-flash"),
            gemini_base_url: get_env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            gemini_timeout_secs: get_env_parse_or("GEMINI_TIMEOUT_SECS", 120)?,
            max_questions: get_env_parse_or("MAX_QUESTIONS", 20)?,
            min_text_chars: get_env_parse_or("MIN_TEXT_CHARS", 100)?,
            quiz_language: get_env_or("QUIZ_LANGUAGE", "Japanese"),
            max_upload_bytes: get_env_parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            session_ttl_secs: get_env_parse_or("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:8080".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_timeout_secs: 120,
            max_questions: 20,
            min_text_chars: 100,
            quiz_language: "Japanese".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

/// The key comes from `GEMINI_API_KEY`, falling back to a mounted secret file
/// named by `GEMINI_API_KEY_FILE`. Blank values count as absent.
fn resolve_api_key() -> Result<Option<String>> {
    if let Some(key) = env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()) {
        return Ok(Some(key.trim().to_string()));
    }

    match env::var("GEMINI_API_KEY_FILE") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Cannot read GEMINI_API_KEY_FILE {}: {}", path, e))
            })?;
            let key = raw.trim().to_string();
            Ok((!key.is_empty()).then_some(key))
        }
        Err(_) => Ok(None),
    }
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
