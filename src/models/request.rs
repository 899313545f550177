// src/models/request.rs

use serde::Deserialize;
use validator::{Validate, ValidationError};

const FORBIDDEN_ID_CHARS: [char; 8] = ['<', '>', '&', '"', '\'', ';', '(', ')'];

/// Rejects blank identifiers and characters that have no business in an id.
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("id_cannot_be_empty"));
    }
    if trimmed.contains(FORBIDDEN_ID_CHARS) {
        return Err(ValidationError::new("id_contains_invalid_characters"));
    }
    Ok(())
}

/// DTO for generating the downloadable report.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateReportRequest {
    #[validate(length(min = 1, max = 100), custom(function = validate_id))]
    pub test_id: String,
    #[validate(length(min = 1, max = 100), custom(function = validate_id))]
    pub class_id: String,
    #[validate(length(max = 100))]
    pub teacher_name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub template_name: Option<String>,
}

/// Query parameters shared by the analytics endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct AnalysisQuery {
    #[validate(length(min = 1, max = 100), custom(function = validate_id))]
    pub class_id: String,
    #[validate(length(max = 100))]
    pub teacher_name: Option<String>,
    /// Recalculate: drop the cache first. Generate: ignore cached AI sections.
    #[serde(default)]
    pub force: bool,
}

/// DTO for invalidating the cache after a result mutation.
#[derive(Debug, Deserialize, Validate)]
pub struct InvalidateCacheRequest {
    #[validate(length(min = 1, max = 100), custom(function = validate_id))]
    pub test_id: String,
}

/// Query parameters for the maintenance cleanup.
#[derive(Debug, Deserialize, Validate)]
pub struct CleanupQuery {
    #[validate(range(min = 1, max = 8760))]
    pub max_age_hours: Option<u32>,
}

/// Trims an optional free-text field, mapping blank to `None`.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
