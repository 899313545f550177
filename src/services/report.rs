// src/services/report.rs

//! Report documents: context building, template rendering, output files.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::{Cursor, Read, Write},
    path::PathBuf,
    sync::{Arc, LazyLock},
    time::{Duration, SystemTime},
};

use chrono::{Datelike, Local};
use regex::{Captures, Regex};
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::{
    config::TEMPLATE_QUESTION_ROWS,
    error::TemplateError,
    models::analytics::{AiAnalysisSections, AnalysisData, GRADE_BUCKETS, Section},
    store::{SettingsStore, Template, TemplateStore},
    utils::{
        filename::sanitize_filename,
        timestamp::{TimestampFormat, current_timestamp},
    },
};

pub const DOCX_EXTENSION: &str = ".docx";
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{((?:[^{}<]|<[^>]*>)*?)\}\}").expect("static regex")
});
static XML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Fills a template with a flat context.
pub trait DocumentRenderer: Send + Sync {
    fn render(
        &self,
        template: &[u8],
        context: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, TemplateError>;
}

/// Variable name of a placeholder body: markup removed, filters after `|` dropped.
fn placeholder_key(inner: &str) -> String {
    let plain = XML_TAG.replace_all(inner, "");
    plain.split('|').next().unwrap_or_default().trim().to_string()
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Replaces every `{{ key }}` in `text`. Unknown keys render empty.
///
/// A placeholder may be interrupted by markup (Word splits text into runs);
/// the markup inside it is dropped together with the placeholder.
fn fill_placeholders(text: &str, context: &BTreeMap<String, String>, xml: bool) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let key = placeholder_key(&caps[1]);
            let value = context.get(&key).map(String::as_str).unwrap_or_else(|| {
                tracing::debug!("Template variable '{}' has no value", key);
                ""
            });
            if xml {
                escape_xml(value)
            } else {
                value.to_string()
            }
        })
        .into_owned()
}

fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Parts of a Word document that carry visible text.
fn is_text_part(name: &str) -> bool {
    name.starts_with("word/") && name.ends_with(".xml")
}

fn zip_error(e: zip::result::ZipError) -> TemplateError {
    TemplateError::Render(format!("invalid .docx archive: {}", e))
}

fn io_error(e: std::io::Error) -> TemplateError {
    TemplateError::Render(format!("cannot process .docx archive: {}", e))
}

/// Substitutes placeholders in a UTF-8 text template.
pub struct PlaceholderRenderer;

impl DocumentRenderer for PlaceholderRenderer {
    fn render(
        &self,
        template: &[u8],
        context: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, TemplateError> {
        let text = std::str::from_utf8(template)
            .map_err(|e| TemplateError::Render(format!("template is not UTF-8: {}", e)))?;
        Ok(fill_placeholders(text, context, false).into_bytes())
    }
}

/// Renders `.docx` templates by filling the placeholders of every `word/*.xml` part.
/// Anything that is not a zip archive is rendered as plain text.
pub struct DocxRenderer;

impl DocumentRenderer for DocxRenderer {
    fn render(
        &self,
        template: &[u8],
        context: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, TemplateError> {
        if !is_zip(template) {
            return PlaceholderRenderer.render(template, context);
        }

        let mut archive = ZipArchive::new(Cursor::new(template)).map_err(zip_error)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(zip_error)?;
            let name = entry.name().to_string();
            if entry.is_dir() {
                writer.add_directory(name, options).map_err(zip_error)?;
                continue;
            }

            let mut content = Vec::new();
            entry.read_to_end(&mut content).map_err(io_error)?;
            if is_text_part(&name) {
                if let Ok(xml) = std::str::from_utf8(&content) {
                    content = fill_placeholders(xml, context, true).into_bytes();
                }
            }

            writer.start_file(name, options).map_err(zip_error)?;
            writer.write_all(&content).map_err(io_error)?;
        }

        let cursor = writer.finish().map_err(zip_error)?;
        Ok(cursor.into_inner())
    }
}

/// Sorted, de-duplicated variable names used by a template (plain text or `.docx`).
pub fn template_variables(template: &[u8]) -> Vec<String> {
    let mut texts = Vec::new();
    if is_zip(template) {
        if let Ok(mut archive) = ZipArchive::new(Cursor::new(template)) {
            for i in 0..archive.len() {
                let Ok(mut entry) = archive.by_index(i) else {
                    continue;
                };
                if !is_text_part(entry.name()) {
                    continue;
                }
                let mut xml = String::new();
                if entry.read_to_string(&mut xml).is_ok() {
                    texts.push(xml);
                }
            }
        }
    } else {
        texts.push(String::from_utf8_lossy(template).into_owned());
    }

    texts
        .iter()
        .flat_map(|text| PLACEHOLDER.captures_iter(text))
        .map(|caps| placeholder_key(&caps[1]))
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn section_default(section: Section) -> &'static str {
    match section {
        Section::LowestResults => "Не са налични данни за анализ на най-ниските резултати.",
        Section::HighestResults => "Не са налични данни за анализ на най-високите резултати.",
        Section::Gaps => "Не са налични данни за анализ на пропуските.",
        Section::OverallResults => "Не са налични данни за общ анализ на резултатите.",
        Section::ImprovementMeasures => "Не са налични данни за мерки за подобрение.",
    }
}

/// `2024/2025` from September on, `2023/2024` before.
pub fn school_year(year: i32, month: u32) -> String {
    if month >= 9 {
        format!("{}/{}", year, year + 1)
    } else {
        format!("{}/{}", year - 1, year)
    }
}

fn current_school_year() -> String {
    let now = Local::now();
    school_year(now.year(), now.month())
}

/// Flat key/value context for the report template.
///
/// Every `q{i}_success` for `i` in `1..=max(total_questions, 19)` is present and
/// ends in `%`. The five sections are never empty.
pub fn build_context(
    data: &AnalysisData,
    sections: &AiAnalysisSections,
) -> BTreeMap<String, String> {
    let stats = &data.statistics;
    let mut context = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        context.insert(key.to_string(), value);
    };

    put("class_name", data.class_name.clone());
    put("subject", data.subject.clone());
    put("teacher_name", data.teacher_name.clone());
    put("test_name", data.test_name.clone());
    put("school_year", current_school_year());
    put("date", current_timestamp(TimestampFormat::Date));

    put("total_students", stats.total_students.to_string());
    put("boys_count", stats.boys_count.to_string());
    put("girls_count", stats.girls_count.to_string());

    // The template's question table always has 19 rows.
    put("total_questions", TEMPLATE_QUESTION_ROWS.to_string());
    put("actual_total_questions", data.total_questions.to_string());
    put("mc_questions", data.mc_questions.to_string());
    put("short_questions", data.short_questions.to_string());
    put("max_points_test", data.max_points_test.to_string());

    put("min_points", stats.min_points.to_string());
    put("max_points", stats.max_points.to_string());
    put("avg_points", stats.avg_points.to_string());
    put("avg_grade", stats.avg_grade.to_string());
    put("avg_percentage", stats.avg_percentage.to_string());
    put("participated_count", stats.participated_count.to_string());
    put("non_participating_count", stats.non_participating_count.to_string());
    put("pass_rate", stats.pass_rate.to_string());
    put("good_grades_count", stats.good_grades_count.to_string());
    put("good_grades_percentage", stats.good_grades_percentage.to_string());

    for bucket in GRADE_BUCKETS {
        let count = stats.grade_distribution.get(&bucket).copied().unwrap_or(0);
        let share = stats.grade_percentages.get(&bucket).copied().unwrap_or(0.0);
        put(&format!("grade_distribution_{}", bucket), count.to_string());
        put(&format!("grade_percentage_{}", bucket), share.to_string());
    }

    for section in Section::ALL {
        let text = sections.get(section).trim();
        let value = if text.is_empty() {
            tracing::warn!("AI section '{}' is empty, using default text", section.key());
            section_default(section).to_string()
        } else {
            text.to_string()
        };
        put(section.key(), value);
    }

    let rows = data.total_questions.max(TEMPLATE_QUESTION_ROWS);
    for i in 1..=rows {
        let label = data.success_label(i).trim();
        let value = if label.is_empty() {
            "0%".to_string()
        } else if label.ends_with('%') {
            label.to_string()
        } else {
            format!("{}%", label)
        };
        put(&format!("q{}_success", i), value);
    }

    context
}

/// A rendered report written to the output directory.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub file_name: String,
    pub content: Vec<u8>,
}

pub struct ReportService {
    output_dir: PathBuf,
    renderer: Arc<dyn DocumentRenderer>,
    settings: Arc<dyn SettingsStore>,
}

impl ReportService {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        renderer: Arc<dyn DocumentRenderer>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            renderer,
            settings,
        }
    }

    /// The named template, else the last used one, else the newest upload.
    pub async fn select_template(
        &self,
        templates: &dyn TemplateStore,
        requested: Option<&str>,
    ) -> Result<Template, TemplateError> {
        if let Some(name) = requested {
            return templates.get(name).await;
        }

        match self.settings.last_used_template().await {
            Ok(Some(name)) => match templates.get(&name).await {
                Ok(template) => return Ok(template),
                Err(TemplateError::NotFound(_)) => {
                    tracing::warn!("Last used template '{}' is gone, using the newest upload", name)
                }
                Err(e) => return Err(e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("Cannot read the last used template: {}", e),
        }

        templates.latest().await
    }

    /// Records `name` as the last used template. Failures are only logged.
    pub async fn remember_template(&self, name: &str) {
        if let Err(e) = self.settings.set_last_used_template(name).await {
            tracing::warn!("Cannot record last used template '{}': {}", name, e);
        }
    }

    /// Drops `name` as the last used template after it was deleted.
    pub async fn forget_template(&self, name: &str) {
        if let Err(e) = self.settings.forget_template(name).await {
            tracing::warn!("Cannot clear last used template '{}': {}", name, e);
        }
    }

    /// `Analiz_{class}_{subject}_{YYYYmmdd_HHMMSS}.docx`, filesystem safe.
    pub fn report_file_name(data: &AnalysisData) -> String {
        format!(
            "Analiz_{}_{}_{}{}",
            sanitize_filename(&data.class_name, None),
            sanitize_filename(&data.subject, None),
            current_timestamp(TimestampFormat::Filename),
            DOCX_EXTENSION
        )
    }

    pub async fn generate(
        &self,
        template: &Template,
        data: &AnalysisData,
        sections: &AiAnalysisSections,
    ) -> Result<GeneratedReport, TemplateError> {
        tracing::info!(
            "Rendering report for test {} with template '{}'",
            data.test_id,
            template.name
        );
        let context = build_context(data, sections);
        let renderer = Arc::clone(&self.renderer);
        let source = template.content.clone();
        let content = tokio::task::spawn_blocking(move || renderer.render(&source, &context))
            .await
            .map_err(|e| TemplateError::Render(format!("render task failed: {}", e)))??;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| TemplateError::Storage(format!("cannot create output dir: {}", e)))?;

        let file_name = Self::report_file_name(data);
        let path = self.output_dir.join(&file_name);
        tokio::fs::write(&path, &content)
            .await
            .map_err(|e| TemplateError::Storage(format!("cannot write {}: {}", file_name, e)))?;

        tracing::info!("Report written to {}", path.display());
        self.remember_template(&template.name).await;
        Ok(GeneratedReport {
            path,
            file_name,
            content,
        })
    }

    /// Deletes generated `.docx` files older than `max_age_hours`. Returns how many were removed.
    pub async fn cleanup_old_documents(&self, max_age_hours: u32) -> usize {
        let max_age = Duration::from_secs(u64::from(max_age_hours) * 3600);
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return 0;
        };

        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot read output dir {}: {}", self.output_dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error during cleanup: {}", e);
                    break;
                }
            };

            let path = entry.path();
            let is_docx = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
            if !is_docx {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::error!("Error reading {}: {}", path.display(), e);
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!("Removed old file: {}", path.display());
                    removed += 1;
                }
                Err(e) => tracing::error!("Error removing file {}: {}", path.display(), e),
            }
        }

        tracing::info!("Cleanup completed: {} files removed", removed);
        removed
    }
}
