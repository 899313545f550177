// src/store/memory.rs

//! In-process stores. Used by the test suites and for running the service
//! without a database.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    error::{CacheStoreError, RecordsError, SettingsError, TemplateError},
    models::{
        analytics::AnalyticsCacheRecord,
        result::ResultRecord,
        settings::AiSettings,
        student::StudentRecord,
        test::{ClassInfo, TestDefinition},
    },
    store::{
        CacheEntry, CacheStore, RecordsStore, SettingsStore, Template, TemplateInfo, TemplateStore,
    },
    utils::timestamp::{TimestampFormat, format_timestamp, parse_timestamp},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct MemoryRecordsStore {
    tests: Mutex<HashMap<String, TestDefinition>>,
    classes: Mutex<HashMap<String, ClassInfo>>,
    students: Mutex<Vec<StudentRecord>>,
    results: Mutex<HashMap<String, Vec<ResultRecord>>>,
    unavailable: AtomicBool,
}

impl MemoryRecordsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_test(&self, test: TestDefinition) {
        lock(&self.tests).insert(test.id.clone(), test);
    }

    pub fn insert_class(&self, class: ClassInfo) {
        lock(&self.classes).insert(class.id.clone(), class);
    }

    pub fn insert_student(&self, student: StudentRecord) {
        lock(&self.students).push(student);
    }

    pub fn insert_result(&self, test_id: &str, result: ResultRecord) {
        lock(&self.results)
            .entry(test_id.to_string())
            .or_default()
            .push(result);
    }

    /// Makes every call fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RecordsError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RecordsError::Backend("records store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordsStore for MemoryRecordsStore {
    async fn get_test(&self, test_id: &str) -> Result<Option<TestDefinition>, RecordsError> {
        self.check()?;
        Ok(lock(&self.tests).get(test_id).cloned())
    }

    async fn get_class(&self, class_id: &str) -> Result<Option<ClassInfo>, RecordsError> {
        self.check()?;
        Ok(lock(&self.classes).get(class_id).cloned())
    }

    async fn get_students(&self, class_id: &str) -> Result<Vec<StudentRecord>, RecordsError> {
        self.check()?;
        Ok(lock(&self.students)
            .iter()
            .filter(|s| s.class_id.as_deref() == Some(class_id))
            .cloned()
            .collect())
    }

    async fn get_results(&self, test_id: &str) -> Result<Vec<ResultRecord>, RecordsError> {
        self.check()?;
        Ok(lock(&self.results).get(test_id).cloned().unwrap_or_default())
    }

    async fn latest_result_created_at(
        &self,
        test_id: &str,
    ) -> Result<Option<String>, RecordsError> {
        self.check()?;
        let results = lock(&self.results);
        let latest = results.get(test_id).and_then(|rs| {
            rs.iter()
                .filter_map(|r| r.created_at.as_deref())
                .filter_map(|raw| parse_timestamp(raw).map(|dt| (dt, raw)))
                .max_by_key(|(dt, _)| *dt)
                .map(|(_, raw)| raw.to_string())
        });
        Ok(latest)
    }

    async fn ping(&self) -> Result<(), RecordsError> {
        self.check()
    }
}

#[derive(Default)]
pub struct MemoryCacheStore {
    rows: Mutex<HashMap<String, AnalyticsCacheRecord>>,
    unavailable: AtomicBool,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record exactly as given, timestamps included.
    pub fn put(&self, record: AnalyticsCacheRecord) {
        lock(&self.rows).insert(record.test_id.clone(), record);
    }

    pub fn contains(&self, test_id: &str) -> bool {
        lock(&self.rows).contains_key(test_id)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CacheStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CacheStoreError("cache store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn load(&self, test_id: &str) -> Result<Option<AnalyticsCacheRecord>, CacheStoreError> {
        self.check()?;
        Ok(lock(&self.rows).get(test_id).cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), CacheStoreError> {
        self.check()?;
        let now = format_timestamp(&entry.saved_at, TimestampFormat::Iso);
        let mut rows = lock(&self.rows);
        let previous = rows.remove(&entry.test_id);

        let ai_generated_at = match &entry.ai_analysis {
            Some(_) => Some(now.clone()),
            None => previous.as_ref().and_then(|p| p.ai_generated_at.clone()),
        };
        let record = AnalyticsCacheRecord {
            test_id: entry.test_id.clone(),
            statistics: entry.statistics,
            question_success_rates: entry.question_success_rates,
            ai_analysis: entry
                .ai_analysis
                .or_else(|| previous.as_ref().and_then(|p| p.ai_analysis.clone())),
            calculated_at: previous
                .as_ref()
                .and_then(|p| p.calculated_at.clone())
                .or_else(|| Some(now.clone())),
            updated_at: Some(now),
            ai_generated_at,
        };
        rows.insert(entry.test_id, record);
        Ok(())
    }

    async fn delete(&self, test_id: &str) -> Result<(), CacheStoreError> {
        self.check()?;
        lock(&self.rows).remove(test_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTemplateStore {
    // Kept in upload order, oldest first.
    templates: Mutex<Vec<(TemplateInfo, Vec<u8>)>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn list(&self) -> Result<Vec<TemplateInfo>, TemplateError> {
        Ok(lock(&self.templates)
            .iter()
            .rev()
            .map(|(info, _)| info.clone())
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Template, TemplateError> {
        lock(&self.templates)
            .iter()
            .find(|(info, _)| info.name == name)
            .map(|(info, content)| Template {
                name: info.name.clone(),
                content: content.clone(),
            })
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    async fn latest(&self) -> Result<Template, TemplateError> {
        lock(&self.templates)
            .last()
            .map(|(info, content)| Template {
                name: info.name.clone(),
                content: content.clone(),
            })
            .ok_or(TemplateError::NoTemplates)
    }

    async fn create(&self, name: &str, content: Vec<u8>) -> Result<(), TemplateError> {
        let now = format_timestamp(&Utc::now(), TimestampFormat::Iso);
        let mut templates = lock(&self.templates);
        if templates.iter().any(|(info, _)| info.name == name) {
            return Err(TemplateError::AlreadyExists(name.to_string()));
        }

        templates.push((
            TemplateInfo {
                name: name.to_string(),
                size: content.len() as i64,
                created_at: Some(now.clone()),
                updated_at: Some(now),
            },
            content,
        ));
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, TemplateError> {
        let mut templates = lock(&self.templates);
        let before = templates.len();
        templates.retain(|(info, _)| info.name != name);
        Ok(templates.len() != before)
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    ai: Mutex<AiSettings>,
    last_used_template: Mutex<Option<String>>,
    unavailable: AtomicBool,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SettingsError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SettingsError("settings store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn ai_settings(&self) -> Result<AiSettings, SettingsError> {
        self.check()?;
        Ok(lock(&self.ai).clone())
    }

    async fn update_ai_settings(&self, update: AiSettings) -> Result<AiSettings, SettingsError> {
        self.check()?;
        let mut settings = lock(&self.ai);
        settings.merge(update);
        Ok(settings.clone())
    }

    async fn last_used_template(&self) -> Result<Option<String>, SettingsError> {
        self.check()?;
        Ok(lock(&self.last_used_template).clone())
    }

    async fn set_last_used_template(&self, name: &str) -> Result<(), SettingsError> {
        self.check()?;
        *lock(&self.last_used_template) = Some(name.to_string());
        Ok(())
    }

    async fn forget_template(&self, name: &str) -> Result<(), SettingsError> {
        self.check()?;
        let mut last = lock(&self.last_used_template);
        if last.as_deref() == Some(name) {
            *last = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_templates_latest_follows_upload_order() {
        let store = MemoryTemplateStore::new();
        assert!(matches!(store.latest().await, Err(TemplateError::NoTemplates)));

        store.create("a.docx", b"a".to_vec()).await.unwrap();
        store.create("b.docx", b"bb".to_vec()).await.unwrap();
        assert_eq!(store.latest().await.unwrap().name, "b.docx");

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "b.docx");
        assert_eq!(listed[0].size, 2);

        assert!(store.delete("a.docx").await.unwrap());
        assert!(!store.delete("a.docx").await.unwrap());
        assert!(matches!(store.get("a.docx").await, Err(TemplateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_never_replaces_an_existing_template() {
        let store = std::sync::Arc::new(MemoryTemplateStore::new());

        let (first, second) = tokio::join!(
            {
                let store = store.clone();
                async move { store.create("report.docx", b"first".to_vec()).await }
            },
            {
                let store = store.clone();
                async move { store.create("report.docx", b"second".to_vec()).await }
            },
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(TemplateError::AlreadyExists(_))))
                .count(),
            1
        );

        let stored = store.get("report.docx").await.unwrap().content;
        let winner: &[u8] = if outcomes[0].is_ok() { b"first" } else { b"second" };
        assert_eq!(stored, winner);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_result_timestamp_compares_parsed_values() {
        let store = MemoryRecordsStore::new();
        for created in ["2024-01-01 12:00:00+00", "2024-01-01T13:00:00Z", "garbage"] {
            store.insert_result(
                "t1",
                ResultRecord {
                    student_id: None,
                    points: None,
                    grade: None,
                    percentage: None,
                    participated: true,
                    cancelled: false,
                    question_results: None,
                    created_at: Some(created.to_string()),
                },
            );
        }
        assert_eq!(
            store.latest_result_created_at("t1").await.unwrap().as_deref(),
            Some("2024-01-01T13:00:00Z")
        );
        assert_eq!(store.latest_result_created_at("t2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forget_template_only_clears_matching_name() {
        let store = MemorySettingsStore::new();
        store.set_last_used_template("a.docx").await.unwrap();

        store.forget_template("b.docx").await.unwrap();
        assert_eq!(store.last_used_template().await.unwrap().as_deref(), Some("a.docx"));

        store.forget_template("a.docx").await.unwrap();
        assert_eq!(store.last_used_template().await.unwrap(), None);
    }
}
