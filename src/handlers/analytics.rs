// src/handlers/analytics.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::request::{AnalysisQuery, InvalidateCacheRequest, clean_optional, validate_id},
    services::AnalysisService,
};

/// Validates an id taken from the path.
pub(crate) fn path_id(raw: &str) -> Result<String, AppError> {
    let id = raw.trim();
    if id.len() > 100 {
        return Err(AppError::BadRequest("id is too long".to_string()));
    }
    validate_id(id).map_err(|e| AppError::BadRequest(format!("Invalid id: {}", e)))?;
    Ok(id.to_string())
}

fn checked_query(query: AnalysisQuery) -> Result<(String, Option<String>, bool), AppError> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok((
        query.class_id.trim().to_string(),
        clean_optional(query.teacher_name),
        query.force,
    ))
}

/// Analysis data (statistics and per-question success) for a test and class.
pub async fn get_analysis(
    State(analysis): State<Arc<AnalysisService>>,
    Path(test_id): Path<String>,
    Query(query): Query<AnalysisQuery>,
) -> Result<impl IntoResponse, AppError> {
    let test_id = path_id(&test_id)?;
    let (class_id, teacher_name, _) = checked_query(query)?;

    let data = analysis
        .get_test_analysis_data(&test_id, &class_id, teacher_name.as_deref())
        .await?;
    Ok(Json(data))
}

/// Recomputes statistics for a test. `force=true` drops the cached row first.
pub async fn recalculate(
    State(analysis): State<Arc<AnalysisService>>,
    Path(test_id): Path<String>,
    Query(query): Query<AnalysisQuery>,
) -> Result<impl IntoResponse, AppError> {
    let test_id = path_id(&test_id)?;
    let (class_id, teacher_name, force) = checked_query(query)?;

    let data = analysis
        .recalculate(&test_id, &class_id, teacher_name.as_deref(), force)
        .await?;

    let statistics_count = serde_json::to_value(&data.statistics)?
        .as_object()
        .map(|o| o.len())
        .unwrap_or(0);

    Ok(Json(json!({
        "status": "success",
        "message": format!("Analytics recalculated for test {}", test_id),
        "test_id": test_id,
        "statistics_count": statistics_count,
        "question_success_rates_count": data.question_success_rates.len(),
    })))
}

async fn invalidate(
    analysis: &AnalysisService,
    test_id: String,
) -> Result<impl IntoResponse + use<>, AppError> {
    if !analysis.invalidate(&test_id).await {
        return Err(AppError::InternalServerError(
            "Failed to invalidate cache".to_string(),
        ));
    }
    Ok(Json(json!({
        "status": "success",
        "message": format!("Cache invalidated for test {}", test_id),
        "test_id": test_id,
    })))
}

/// Drops the cached analytics of a test.
pub async fn invalidate_cache(
    State(analysis): State<Arc<AnalysisService>>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let test_id = path_id(&test_id)?;
    invalidate(&analysis, test_id).await
}

/// Called after a result was created, changed or deleted.
pub async fn invalidate_by_result(
    State(analysis): State<Arc<AnalysisService>>,
    Json(payload): Json<InvalidateCacheRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    invalidate(&analysis, payload.test_id.trim().to_string()).await
}

/// Generates a new AI analysis and stores it with the cached statistics.
pub async fn generate_analysis(
    State(analysis): State<Arc<AnalysisService>>,
    Path(test_id): Path<String>,
    Query(query): Query<AnalysisQuery>,
) -> Result<impl IntoResponse, AppError> {
    let test_id = path_id(&test_id)?;
    let (class_id, teacher_name, _) = checked_query(query)?;

    let (_, sections) = analysis
        .generate_analysis(&test_id, &class_id, teacher_name.as_deref(), true)
        .await?;

    Ok(Json(json!({
        "success": true,
        "test_id": test_id,
        "analysis": sections,
        "provider": analysis.provider(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_id() {
        assert_eq!(path_id(" t1 ").unwrap(), "t1");
        assert!(path_id("a;b").is_err());
        assert!(path_id(&"x".repeat(101)).is_err());
    }
}
