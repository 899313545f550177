// src/ai/client.rs

use std::{future::Future, sync::LazyLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ai::{AiBackend, GenerationOptions, parser::coerce_text},
    config::{AI_MAX_RETRIES, AI_MIN_RATE_LIMIT_WAIT_SECS, AI_RETRY_DELAY_SECS, Config},
    error::AiError,
};

const SYSTEM_MESSAGE: &str =
    "Ти си опитен преподавател и образователен анализатор. Отговаряш на български език.";

static RETRY_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)retry.*?(\d+(?:\.\d+)?)\s*s").expect("valid regex"));

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

/// `content` is usually a string; some providers send a list of text parts.
#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<Value>,
}

impl ChatResponse {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| coerce_text(&content).trim().to_string())
            .unwrap_or_default()
    }
}

/// Bounded retry loop with a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: AI_MAX_RETRIES,
            delay: Duration::from_secs(AI_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Runs `attempt` until it succeeds or the attempts are used up.
    ///
    /// Rate-limited failures are returned straight away with their hint;
    /// generic failures are retried after `delay`.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> Result<String, AiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<String, AiError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for n in 1..=attempts {
            tracing::info!("Calling AI backend (attempt {}/{})", n, attempts);
            match attempt(n).await {
                Ok(text) => {
                    tracing::info!("Received AI response: {} characters", text.chars().count());
                    return Ok(text);
                }
                Err(e @ AiError::RateLimited { .. }) => {
                    tracing::warn!("AI backend rate limited on attempt {}: {}", n, e);
                    return Err(e);
                }
                Err(AiError::Generic(msg)) => {
                    tracing::warn!("Attempt {} failed: {}", n, msg);
                    last_error = msg;
                    if n < attempts {
                        tracing::info!("Retrying in {:?}", self.delay);
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        let mut message = format!("Неуспешно генериране на AI анализ след {} опита", attempts);
        if !last_error.is_empty() && last_error.chars().count() < 200 {
            message.push_str(": ");
            message.push_str(&last_error);
        }
        tracing::error!("{}", message);
        Err(AiError::Generic(message))
    }
}

fn is_rate_limit_text(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate_limit") || lower.contains("429") || lower.contains("quota")
}

/// Wait hint in seconds taken from a `retry ... N s` phrase, at least the minimum.
pub fn parse_retry_hint(message: &str) -> Option<u64> {
    RETRY_HINT
        .captures(message)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|secs| (secs as u64).max(AI_MIN_RATE_LIMIT_WAIT_SECS))
}

/// Classifies a failed call from its status, error text and `Retry-After` header.
pub fn classify_failure(
    status: Option<StatusCode>,
    message: &str,
    retry_after_header: Option<u64>,
) -> AiError {
    let rate_limited = status == Some(StatusCode::TOO_MANY_REQUESTS) || is_rate_limit_text(message);
    if !rate_limited {
        return AiError::Generic(message.to_string());
    }

    let hint = retry_after_header
        .map(|secs| secs.max(AI_MIN_RATE_LIMIT_WAIT_SECS))
        .or_else(|| parse_retry_hint(message));

    let mut user_message =
        "Квотата за AI услугата е изчерпана. Моля, проверете вашия план.".to_string();
    if let Some(secs) = hint {
        user_message.push_str(&format!(" Опитайте отново след {} секунди.", secs));
    }

    AiError::RateLimited {
        message: user_message,
        retry_after: Some(hint.unwrap_or(AI_RETRY_DELAY_SECS)),
    }
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl ChatClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            http: Client::new(),
            base_url: config.ai_base_url.trim_end_matches('/').to_string(),
            api_key: config.ai_api_key.clone(),
            model: config.ai_model.clone(),
            temperature: config.ai_temperature,
            max_tokens: config.ai_max_tokens,
            retry: RetryPolicy::default(),
        }
    }

    async fn complete_once(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: options.temperature.unwrap_or(self.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_failure(None, &e.to_string(), None))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_failure(
                Some(status),
                &format!("{}: {}", status, body),
                retry_after,
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Generic(format!("Invalid AI response: {}", e)))?;

        let text = parsed.into_text();
        if text.is_empty() {
            return Err(AiError::Generic("Empty text in AI response".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl AiBackend for ChatClient {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String, AiError> {
        self.retry.run(|_| self.complete_once(prompt, options)).await
    }

    fn provider(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_classify_rate_limit_from_text() {
        let err = classify_failure(None, "Error code: 429 - rate_limit_exceeded, retry in 12.5s", None);
        match err {
            AiError::RateLimited { retry_after, message } => {
                assert_eq!(retry_after, Some(12));
                assert!(message.contains("12"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_applies_minimum_wait() {
        let err = classify_failure(Some(StatusCode::TOO_MANY_REQUESTS), "slow down", Some(1));
        assert!(matches!(err, AiError::RateLimited { retry_after: Some(5), .. }));

        assert_eq!(parse_retry_hint("Quota exceeded. Please retry after 2s"), Some(5));
        assert_eq!(parse_retry_hint("no hint here"), None);
    }

    #[test]
    fn test_response_text_accepts_string_or_parts() {
        let plain: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": "  LOWEST_RESULTS: текст  "}}]
        }))
        .unwrap();
        assert_eq!(plain.into_text(), "LOWEST_RESULTS: текст");

        let parts: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": [
                {"type": "text", "text": "LOWEST_RESULTS: "},
                {"type": "text", "text": "текст"}
            ]}}]
        }))
        .unwrap();
        assert_eq!(parts.into_text(), "LOWEST_RESULTS: текст");

        let missing: ChatResponse =
            serde_json::from_value(serde_json::json!({"choices": [{"message": {}}]})).unwrap();
        assert_eq!(missing.into_text(), "");
    }

    #[test]
    fn test_classify_generic() {
        let err = classify_failure(Some(StatusCode::BAD_GATEWAY), "upstream down", None);
        assert!(matches!(err, AiError::Generic(_)));
    }

    #[tokio::test]
    async fn test_generic_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast_policy()
            .run(move |n| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(AiError::Generic("timeout".to_string()))
                    } else {
                        Ok("LOWEST_RESULTS: ...".to_string())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_generic_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast_policy()
            .run(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(AiError::Generic("connection refused".to_string())) }
            })
            .await;

        match result {
            Err(AiError::Generic(msg)) => assert!(msg.contains("connection refused")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_is_surfaced_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast_policy()
            .run(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(AiError::RateLimited {
                        message: "quota".to_string(),
                        retry_after: Some(30),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(AiError::RateLimited { retry_after: Some(30), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
