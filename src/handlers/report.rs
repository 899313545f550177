// src/handlers/report.rs

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use validator::Validate;

use crate::{
    error::AppError,
    models::request::{GenerateReportRequest, clean_optional},
    services::report::DOCX_MEDIA_TYPE,
    state::AppState,
    utils::filename::ascii_filename,
};

const MAX_DOWNLOAD_NAME_LEN: usize = 100;

/// Generates the analysis report document and returns it as a download.
///
/// Uses the named template when given, otherwise the last used one, otherwise the newest upload.
/// Cached AI sections are reused; otherwise they are generated and cached.
pub async fn generate_report(
    State(state): State<AppState>,
    Json(payload): Json<GenerateReportRequest>,
) -> Result<Response, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let test_id = payload.test_id.trim();
    let class_id = payload.class_id.trim();
    let teacher_name = clean_optional(payload.teacher_name);

    tracing::info!("Generating report for test {}, class {}", test_id, class_id);

    // Resolve the template before spending an AI call.
    let template_name = clean_optional(payload.template_name);
    let template = state
        .reports
        .select_template(state.templates.as_ref(), template_name.as_deref())
        .await?;

    let (data, sections) = state
        .analysis
        .generate_analysis(test_id, class_id, teacher_name.as_deref(), false)
        .await?;

    let report = state.reports.generate(&template, &data, &sections).await?;

    let download_name = ascii_filename(
        &format!("Analiz_{}_{}.docx", data.class_name, data.subject),
        MAX_DOWNLOAD_NAME_LEN,
    );
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", download_name))
        .map_err(|e| AppError::InternalServerError(format!("Invalid header value: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(DOCX_MEDIA_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.content,
    )
        .into_response())
}
