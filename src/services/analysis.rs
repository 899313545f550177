// src/services/analysis.rs

//! Analysis orchestrator: cache lookup with freshness validation, fresh
//! computation on a miss, AI generation and persistence.

use std::sync::Arc;

use crate::{
    ai::{AiBackend, GenerationOptions, build_prompt, parse_ai_response},
    analytics::{calculate_question_success, calculate_statistics},
    cache::AnalyticsCache,
    config::Config,
    error::{AnalysisError, RecordsError},
    models::{
        analytics::{AiAnalysisSections, AnalysisData, QuestionSuccessRates},
        settings::AiSettings,
    },
    store::{RecordsStore, SettingsStore},
};

const DEFAULT_MAX_POINTS: f64 = 100.0;

/// Last-resort names, used when the request, the records and the stored settings give none.
#[derive(Debug, Clone)]
pub struct AnalysisDefaults {
    pub teacher_name: String,
    pub subject: String,
}

impl From<&Config> for AnalysisDefaults {
    fn from(config: &Config) -> Self {
        Self {
            teacher_name: config.default_teacher_name.clone(),
            subject: config.default_subject.clone(),
        }
    }
}

pub struct AnalysisService {
    records: Arc<dyn RecordsStore>,
    cache: AnalyticsCache,
    ai: Arc<dyn AiBackend>,
    settings: Arc<dyn SettingsStore>,
    defaults: AnalysisDefaults,
}

/// Every ordinal in `1..=total` gets a label; unknown ones read `"0%"`.
fn complete_rates(rates: &QuestionSuccessRates, total: usize) -> QuestionSuccessRates {
    let mut complete = rates.clone();
    for i in 1..=total {
        complete.entry(i).or_insert_with(|| "0%".to_string());
    }
    complete
}

impl AnalysisService {
    pub fn new(
        records: Arc<dyn RecordsStore>,
        cache: AnalyticsCache,
        ai: Arc<dyn AiBackend>,
        settings: Arc<dyn SettingsStore>,
        defaults: AnalysisDefaults,
    ) -> Self {
        Self {
            records,
            cache,
            ai,
            settings,
            defaults,
        }
    }

    /// Stored AI settings. An unreadable store means no overrides.
    async fn ai_settings(&self) -> AiSettings {
        match self.settings.ai_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Using default AI settings: {}", e);
                AiSettings::default()
            }
        }
    }

    pub fn provider(&self) -> &str {
        self.ai.provider()
    }

    /// Statistics and question rates for one test and class, from a fresh cache row
    /// when there is one, otherwise computed from the records and cached.
    ///
    /// Teacher name: request, test, class, stored settings, default.
    /// Subject: test, stored settings, default.
    pub async fn get_test_analysis_data(
        &self,
        test_id: &str,
        class_id: &str,
        teacher_name: Option<&str>,
    ) -> Result<AnalysisData, RecordsError> {
        let settings = self.ai_settings().await;
        self.load_analysis_data(test_id, class_id, teacher_name, &settings)
            .await
    }

    async fn load_analysis_data(
        &self,
        test_id: &str,
        class_id: &str,
        teacher_name: Option<&str>,
        settings: &AiSettings,
    ) -> Result<AnalysisData, RecordsError> {
        let test = self
            .records
            .get_test(test_id)
            .await?
            .ok_or_else(|| RecordsError::NotFound(format!("Test {}", test_id)))?;
        let class = self
            .records
            .get_class(class_id)
            .await?
            .ok_or_else(|| RecordsError::NotFound(format!("Class {}", class_id)))?;

        let teacher_name = teacher_name
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| test.teacher_name.clone())
            .or_else(|| class.teacher_name.clone())
            .or_else(|| settings.teacher_name.clone())
            .unwrap_or_else(|| self.defaults.teacher_name.clone());
        let subject = test
            .subject
            .clone()
            .or_else(|| settings.subject.clone())
            .unwrap_or_else(|| self.defaults.subject.clone());

        let total_questions = test.effective_question_count();
        let (mc_questions, short_questions) = test.question_type_counts();

        let mut data = AnalysisData {
            test_id: test_id.to_string(),
            test_name: test.name.clone(),
            class_id: class_id.to_string(),
            class_name: class.name.clone(),
            subject,
            teacher_name,
            total_questions,
            mc_questions,
            short_questions,
            max_points_test: test.max_points.unwrap_or(DEFAULT_MAX_POINTS),
            statistics: Default::default(),
            question_success_rates: QuestionSuccessRates::new(),
            from_cache: false,
            students: Vec::new(),
            results: Vec::new(),
        };

        if let Some(cached) = self.cache.get_fresh(test_id, self.records.as_ref()).await {
            tracing::info!("Using cached analytics for test {}", test_id);
            data.statistics = cached.statistics;
            data.question_success_rates =
                complete_rates(&cached.question_success_rates, total_questions);
            data.from_cache = true;
            return Ok(data);
        }

        tracing::info!("Calculating analytics for test {} / class {}", test_id, class_id);
        let students = self.records.get_students(class_id).await?;
        let results = self.records.get_results(test_id).await?;
        if results.is_empty() {
            tracing::warn!("No results found for test {}", test_id);
        }

        let statistics = calculate_statistics(&students, &results, &test);
        let rates = calculate_question_success(&results, &test);

        // A failed save still returns the computed numbers.
        self.cache.save(test_id, &statistics, &rates, None).await;

        data.statistics = statistics;
        data.question_success_rates = complete_rates(&rates, total_questions);
        data.students = students;
        data.results = results;
        Ok(data)
    }

    /// Recomputes and re-saves. With `force` the cached row is dropped first.
    pub async fn recalculate(
        &self,
        test_id: &str,
        class_id: &str,
        teacher_name: Option<&str>,
        force: bool,
    ) -> Result<AnalysisData, RecordsError> {
        if force {
            self.cache.invalidate(test_id).await;
        }

        let data = self
            .get_test_analysis_data(test_id, class_id, teacher_name)
            .await?;
        self.cache
            .save(
                test_id,
                &data.statistics,
                &data.question_success_rates,
                None,
            )
            .await;
        Ok(data)
    }

    /// Analysis data plus the five AI sections.
    ///
    /// Cached sections are reused unless `force_ai` is set. Newly generated
    /// sections are stored next to the statistics, preferring the cached ones.
    pub async fn generate_analysis(
        &self,
        test_id: &str,
        class_id: &str,
        teacher_name: Option<&str>,
        force_ai: bool,
    ) -> Result<(AnalysisData, AiAnalysisSections), AnalysisError> {
        let settings = self.ai_settings().await;
        let data = self
            .load_analysis_data(test_id, class_id, teacher_name, &settings)
            .await?;
        let cached = self.cache.get(test_id).await;

        if !force_ai {
            if let Some(sections) = cached.as_ref().and_then(|c| c.ai_analysis.clone()) {
                tracing::info!("Using cached AI analysis for test {}", test_id);
                return Ok((data, sections));
            }
        }

        tracing::info!("Generating AI analysis for test {}", test_id);
        let prompt = build_prompt(&data);
        let options = GenerationOptions::from(&settings);
        let response = self.ai.generate(&prompt, options).await.map_err(|e| {
            tracing::error!("AI analysis failed for test {}: {}", test_id, e);
            e
        })?;
        let sections = parse_ai_response(&response);

        let (statistics, rates) = match &cached {
            Some(c) => (&c.statistics, &c.question_success_rates),
            None => (&data.statistics, &data.question_success_rates),
        };
        self.cache
            .save(test_id, statistics, rates, Some(&sections))
            .await;

        Ok((data, sections))
    }

    pub async fn invalidate(&self, test_id: &str) -> bool {
        self.cache.invalidate(test_id).await
    }
}
