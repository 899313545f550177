// src/handlers/templates.rs

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    config::MAX_TEMPLATE_BYTES,
    error::{AppError, TemplateError},
    services::{
        ReportService,
        report::{DOCX_EXTENSION, template_variables},
    },
    store::TemplateStore,
};

/// Accepts plain `.docx` file names only.
fn checked_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(AppError::BadRequest("Invalid template name".to_string()));
    }
    if !name.to_lowercase().ends_with(DOCX_EXTENSION) {
        return Err(AppError::BadRequest(
            "Invalid file type. Only .docx files are allowed.".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Lists stored templates, sorted by name.
pub async fn list_templates(
    State(templates): State<Arc<dyn TemplateStore>>,
) -> Result<impl IntoResponse, AppError> {
    let mut list = templates.list().await?;
    list.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(list))
}

/// Stores a new template from the raw request body and makes it the default.
/// Existing names are rejected.
pub async fn upload_template(
    State(templates): State<Arc<dyn TemplateStore>>,
    State(reports): State<Arc<ReportService>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let name = checked_name(&name)?;

    if body.is_empty() {
        return Err(AppError::BadRequest("Template file is empty".to_string()));
    }
    if body.len() > MAX_TEMPLATE_BYTES {
        return Err(AppError::BadRequest(format!(
            "Template is too large. Maximum size is {} MB.",
            MAX_TEMPLATE_BYTES / (1024 * 1024)
        )));
    }

    let size = body.len();
    templates.create(&name, body.to_vec()).await?;
    tracing::info!("Template '{}' uploaded ({} bytes)", name, size);
    reports.remember_template(&name).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": format!("Template '{}' uploaded successfully", name),
            "template_name": name,
            "size": size,
        })),
    ))
}

pub async fn delete_template(
    State(templates): State<Arc<dyn TemplateStore>>,
    State(reports): State<Arc<ReportService>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let name = checked_name(&name)?;

    if !templates.delete(&name).await? {
        return Err(TemplateError::NotFound(name).into());
    }
    tracing::info!("Template '{}' deleted", name);
    reports.forget_template(&name).await;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Template '{}' deleted successfully", name),
    })))
}

/// Placeholder names used by a template.
pub async fn get_template_variables(
    State(templates): State<Arc<dyn TemplateStore>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let name = checked_name(&name)?;
    let template = templates.get(&name).await?;
    let variables = template_variables(&template.content);

    Ok(Json(json!({
        "template_name": name,
        "count": variables.len(),
        "variables": variables,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_name() {
        assert_eq!(checked_name("report.docx").unwrap(), "report.docx");
        assert_eq!(checked_name("Report.DOCX").unwrap(), "Report.DOCX");
        assert!(checked_name("../secret.docx").is_err());
        assert!(checked_name("a/b.docx").is_err());
        assert!(checked_name("report.pdf").is_err());
        assert!(checked_name("  ").is_err());
    }
}
