// src/handlers/maintenance.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    config::{Config, DEFAULT_CLEANUP_MAX_AGE_HOURS},
    error::AppError,
    models::request::CleanupQuery,
    services::ReportService,
    store::RecordsStore,
};

/// Removes generated documents older than `max_age_hours` (default 24).
pub async fn cleanup(
    State(reports): State<Arc<ReportService>>,
    Query(query): Query<CleanupQuery>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let max_age_hours = query.max_age_hours.unwrap_or(DEFAULT_CLEANUP_MAX_AGE_HOURS);

    let removed_count = reports.cleanup_old_documents(max_age_hours).await;

    Ok(Json(json!({
        "status": "success",
        "removed_count": removed_count,
        "max_age_hours": max_age_hours,
    })))
}

/// Liveness plus a records store round trip. Always 200; `status` says whether it is degraded.
pub async fn health(
    State(records): State<Arc<dyn RecordsStore>>,
    State(config): State<Config>,
) -> impl IntoResponse {
    let database = match records.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check: records store unreachable: {}", e);
            "unreachable"
        }
    };
    let status = if database == "connected" { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "database": database,
        "ai_configured": !config.ai_api_key.trim().is_empty(),
        "cleanup_protected": config.cleanup_api_key.is_some(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
