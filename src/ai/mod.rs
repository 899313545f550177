// src/ai/mod.rs

pub mod client;
pub mod parser;
pub mod prompt;

use async_trait::async_trait;

use crate::{error::AiError, models::settings::AiSettings};

pub use client::{ChatClient, RetryPolicy};
pub use parser::parse_ai_response;
pub use prompt::build_prompt;

/// Per-call sampling overrides. `None` keeps the backend's configured value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl From<&AiSettings> for GenerationOptions {
    fn from(settings: &AiSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_output_tokens,
        }
    }
}

/// Text generation backend. Implementations own their retry behaviour.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String, AiError>;

    /// Name reported to clients alongside generated analyses.
    fn provider(&self) -> &str {
        "ai"
    }
}
