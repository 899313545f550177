// src/handlers/settings.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    config::Config, error::AppError, models::settings::AiSettings, store::SettingsStore,
};

/// Stored settings with the configured sampling values filled in.
fn settings_view(settings: AiSettings, config: &Config) -> Value {
    json!({
        "teacher_name": settings.teacher_name,
        "subject": settings.subject,
        "temperature": settings.temperature.unwrap_or(config.ai_temperature),
        "max_output_tokens": settings.max_output_tokens.unwrap_or(config.ai_max_tokens),
    })
}

pub async fn get_ai_settings(
    State(settings): State<Arc<dyn SettingsStore>>,
    State(config): State<Config>,
) -> Result<impl IntoResponse, AppError> {
    let current = settings.ai_settings().await?;
    Ok(Json(settings_view(current, &config)))
}

/// Updates the fields present in the body; the others keep their stored values.
pub async fn update_ai_settings(
    State(settings): State<Arc<dyn SettingsStore>>,
    State(config): State<Config>,
    Json(payload): Json<AiSettings>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.cleaned();
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let updated = settings.update_ai_settings(payload).await?;
    tracing::info!(
        "AI settings updated: teacher_name={:?}, subject={:?}",
        updated.teacher_name,
        updated.subject
    );

    Ok(Json(settings_view(updated, &config)))
}
