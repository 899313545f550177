// src/error.rs

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 429 Too Many Requests, with an optional retry hint in seconds
    TooManyRequests {
        message: String,
        retry_after: Option<u64>,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_header = None;
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::TooManyRequests {
                message,
                retry_after,
            } => {
                retry_header = retry_after;
                (StatusCode::TOO_MANY_REQUESTS, message)
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_header {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Failures of the results/records store.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("records backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for RecordsError {
    fn from(err: sqlx::Error) -> Self {
        RecordsError::Backend(err.to_string())
    }
}

impl From<RecordsError> for AppError {
    fn from(err: RecordsError) -> Self {
        match err {
            RecordsError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            RecordsError::Backend(msg) => {
                AppError::InternalServerError(format!("Database error: {}", msg))
            }
        }
    }
}

/// Failures of the analytics cache table. Logged by the cache, never surfaced.
#[derive(Debug, thiserror::Error)]
#[error("cache store error: {0}")]
pub struct CacheStoreError(pub String);

impl From<sqlx::Error> for CacheStoreError {
    fn from(err: sqlx::Error) -> Self {
        CacheStoreError(err.to_string())
    }
}

impl From<serde_json::Error> for CacheStoreError {
    fn from(err: serde_json::Error) -> Self {
        CacheStoreError(format!("malformed cache row: {}", err))
    }
}

/// Failures of the runtime settings store.
#[derive(Debug, thiserror::Error)]
#[error("settings store error: {0}")]
pub struct SettingsError(pub String);

impl From<sqlx::Error> for SettingsError {
    fn from(err: sqlx::Error) -> Self {
        SettingsError(err.to_string())
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError(format!("malformed settings: {}", err))
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// Failures of the AI backend, after the client's own retries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AiError {
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("{0}")]
    Generic(String),
}

impl AiError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AiError::RateLimited { .. })
    }
}

impl From<AiError> for AppError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::RateLimited {
                message,
                retry_after,
            } => AppError::TooManyRequests {
                message,
                retry_after,
            },
            AiError::Generic(msg) => AppError::InternalServerError(msg),
        }
    }
}

/// Failures around report templates and document rendering.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    NotFound(String),

    #[error("template '{0}' already exists")]
    AlreadyExists(String),

    #[error("No templates available")]
    NoTemplates,

    #[error("template rendering failed: {0}")]
    Render(String),

    #[error("template storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for TemplateError {
    fn from(err: sqlx::Error) -> Self {
        TemplateError::Storage(err.to_string())
    }
}

impl From<TemplateError> for AppError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound(_) | TemplateError::NoTemplates => {
                AppError::NotFound(err.to_string())
            }
            TemplateError::AlreadyExists(_) => AppError::Conflict(err.to_string()),
            TemplateError::Render(_) | TemplateError::Storage(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

/// Errors surfaced by the analysis orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Records(#[from] RecordsError),

    #[error(transparent)]
    Ai(#[from] AiError),
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Records(e) => e.into(),
            AnalysisError::Ai(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_maps_to_429_with_retry_after() {
        let err: AppError = AiError::RateLimited {
            message: "quota".to_string(),
            retry_after: Some(12),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "12"
        );
    }

    #[test]
    fn test_generic_ai_error_maps_to_500() {
        let err: AppError = AiError::Generic("boom".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_records_not_found_maps_to_404() {
        let err: AppError = RecordsError::NotFound("Test t1".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_missing_template_maps_to_404() {
        let err: AppError = TemplateError::NoTemplates.into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
