// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Number of attempts made against the AI backend before giving up.
pub const AI_MAX_RETRIES: u32 = 3;

/// Fixed delay between AI attempts, in seconds.
pub const AI_RETRY_DELAY_SECS: u64 = 2;

/// Lower bound for a rate-limit wait parsed out of an error message, in seconds.
pub const AI_MIN_RATE_LIMIT_WAIT_SECS: u64 = 5;

/// Window within which two timestamps count as equal for cache validity.
pub const FRESHNESS_TOLERANCE_SECS: f64 = 1.0;

/// AI sections shorter than this are replaced by their placeholder.
pub const MIN_SECTION_LEN: usize = 10;

/// Report templates have table rows for this many questions.
pub const TEMPLATE_QUESTION_ROWS: usize = 19;

/// Upper bound for an uploaded template, in bytes.
pub const MAX_TEMPLATE_BYTES: usize = 10 * 1024 * 1024;

/// Default age for the maintenance cleanup, in hours.
pub const DEFAULT_CLEANUP_MAX_AGE_HOURS: u32 = 24;

const DEFAULT_AI_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_AI_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub ai_api_key: String,
    pub ai_base_url: String,
    pub ai_model: String,
    pub ai_temperature: f32,
    pub ai_max_tokens: u32,
    /// Shared secret for the maintenance endpoint. `None` leaves it open.
    pub cleanup_api_key: Option<String>,
    pub allowed_origins: Vec<String>,
    pub output_dir: String,
    pub port: u16,
    pub rust_log: String,
    pub default_teacher_name: String,
    pub default_subject: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let ai_api_key = env::var("AI_API_KEY")
            .expect("AI_API_KEY must be set");

        let ai_base_url = env::var("AI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_AI_BASE_URL.to_string());

        let ai_model = env::var("AI_MODEL")
            .unwrap_or_else(|_| DEFAULT_AI_MODEL.to_string());

        let ai_temperature = env::var("AI_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.7);

        let ai_max_tokens = env::var("AI_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2000);

        let cleanup_api_key = env::var("CLEANUP_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let allowed_origins = parse_origins(env::var("ALLOWED_ORIGINS").ok().as_deref());

        let output_dir = env::var("OUTPUT_DIR")
            .unwrap_or_else(|_| "generated".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8000);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let default_teacher_name = env::var("DEFAULT_TEACHER_NAME")
            .unwrap_or_else(|_| "Преподавател".to_string());

        let default_subject = env::var("DEFAULT_SUBJECT")
            .unwrap_or_else(|_| "Unknown Subject".to_string());

        Self {
            database_url,
            ai_api_key,
            ai_base_url,
            ai_model,
            ai_temperature,
            ai_max_tokens,
            cleanup_api_key,
            allowed_origins,
            output_dir,
            port,
            rust_log,
            default_teacher_name,
            default_subject,
        }
    }
}

fn default_origins() -> Vec<String> {
    [
        "http://localhost:5173",
        "http://localhost:5174",
        "http://localhost:5175",
        "http://localhost:5176",
        "http://localhost:3000",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Accepts a JSON array (`["a","b"]`) or a comma-separated list.
/// Anything empty falls back to the local development origins.
pub fn parse_origins(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default_origins();
    };

    if raw.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
            let origins: Vec<String> = list
                .into_iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            if !origins.is_empty() {
                return origins;
            }
        }
    }

    let origins: Vec<String> = raw
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if origins.is_empty() {
        default_origins()
    } else {
        origins
    }
}
