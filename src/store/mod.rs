// src/store/mod.rs

//! Storage seams. The orchestrator only sees these traits; Postgres and
//! in-memory implementations live in the submodules.

pub mod cache;
pub mod memory;
pub mod records;
pub mod settings;
pub mod templates;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::{CacheStoreError, RecordsError, SettingsError, TemplateError},
    models::{
        analytics::{AggregateStatistics, AiAnalysisSections, AnalyticsCacheRecord, QuestionSuccessRates},
        result::ResultRecord,
        settings::AiSettings,
        student::StudentRecord,
        test::{ClassInfo, TestDefinition},
    },
};

pub use cache::PgCacheStore;
pub use memory::{MemoryCacheStore, MemoryRecordsStore, MemorySettingsStore, MemoryTemplateStore};
pub use records::PgRecordsStore;
pub use settings::PgSettingsStore;
pub use templates::PgTemplateStore;

/// Read access to tests, classes, students and results.
///
/// Simple lookups return `None`/empty on not-found; only genuine backend
/// failures are errors.
#[async_trait]
pub trait RecordsStore: Send + Sync {
    async fn get_test(&self, test_id: &str) -> Result<Option<TestDefinition>, RecordsError>;

    async fn get_class(&self, class_id: &str) -> Result<Option<ClassInfo>, RecordsError>;

    async fn get_students(&self, class_id: &str) -> Result<Vec<StudentRecord>, RecordsError>;

    async fn get_results(&self, test_id: &str) -> Result<Vec<ResultRecord>, RecordsError>;

    /// Creation time of the newest result for the test, as stored.
    async fn latest_result_created_at(&self, test_id: &str)
        -> Result<Option<String>, RecordsError>;

    async fn ping(&self) -> Result<(), RecordsError>;
}

/// One upsert into the analytics cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub test_id: String,
    pub statistics: AggregateStatistics,
    pub question_success_rates: QuestionSuccessRates,
    /// `None` keeps whatever analysis is already stored.
    pub ai_analysis: Option<AiAnalysisSections>,
    pub saved_at: DateTime<Utc>,
}

/// Single-row-per-test analytics table. Writes are last-writer-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, test_id: &str) -> Result<Option<AnalyticsCacheRecord>, CacheStoreError>;

    async fn upsert(&self, entry: CacheEntry) -> Result<(), CacheStoreError>;

    /// Deleting a missing row is not an error.
    async fn delete(&self, test_id: &str) -> Result<(), CacheStoreError>;
}

/// Metadata of a stored report template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateInfo {
    pub name: String,
    pub size: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub content: Vec<u8>,
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Newest first.
    async fn list(&self) -> Result<Vec<TemplateInfo>, TemplateError>;

    async fn get(&self, name: &str) -> Result<Template, TemplateError>;

    /// Most recently uploaded template; `NoTemplates` when the store is empty.
    async fn latest(&self) -> Result<Template, TemplateError>;

    /// Stores a new template. An existing name is left untouched and
    /// reported as `AlreadyExists`; the check and the insert are one step.
    async fn create(&self, name: &str, content: Vec<u8>) -> Result<(), TemplateError>;

    /// Returns whether a template was removed.
    async fn delete(&self, name: &str) -> Result<bool, TemplateError>;
}

/// Runtime settings: the editable AI settings and the last used report template.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn ai_settings(&self) -> Result<AiSettings, SettingsError>;

    /// Applies the fields set in `update` and returns the stored result.
    async fn update_ai_settings(&self, update: AiSettings) -> Result<AiSettings, SettingsError>;

    async fn last_used_template(&self) -> Result<Option<String>, SettingsError>;

    async fn set_last_used_template(&self, name: &str) -> Result<(), SettingsError>;

    /// Clears the last used template when it is `name`.
    async fn forget_template(&self, name: &str) -> Result<(), SettingsError>;
}
