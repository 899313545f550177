// src/utils/api_key.rs

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{config::Config, error::AppError};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Axum Middleware: shared-secret check for maintenance routes.
///
/// Compares the `X-API-Key` header against `CLEANUP_API_KEY`.
/// Missing header is 401, a wrong key is 403. With no key configured the route stays open.
pub async fn api_key_middleware(
    State(config): State<Config>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = config.cleanup_api_key.as_deref() else {
        tracing::warn!("Maintenance endpoint not protected - set CLEANUP_API_KEY in production");
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        None => {
            tracing::warn!("Maintenance request without API key");
            Err(AppError::AuthError(
                "API key required. Provide X-API-Key header.".to_string(),
            ))
        }
        Some(key) if key != expected => {
            tracing::warn!("Maintenance request with invalid API key");
            Err(AppError::Forbidden("Invalid API key".to_string()))
        }
        Some(_) => Ok(next.run(req).await),
    }
}
