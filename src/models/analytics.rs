// src/models/analytics.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{result::ResultRecord, student::StudentRecord};

/// Grade buckets of the six-point scale, highest first.
pub const GRADE_BUCKETS: [u8; 5] = [6, 5, 4, 3, 2];

/// Success rate per question ordinal (1-based), formatted as `"{percent}%"`.
pub type QuestionSuccessRates = BTreeMap<usize, String>;

/// Aggregate statistics over a class's results for one test.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateStatistics {
    pub total_students: usize,
    pub boys_count: usize,
    pub girls_count: usize,
    pub min_points: f64,
    pub max_points: f64,
    pub avg_points: f64,
    pub avg_grade: f64,
    pub avg_percentage: f64,
    pub participated_count: usize,
    pub non_participating_count: usize,

    /// Count per bucket (keys 2..=6).
    pub grade_distribution: BTreeMap<u8, usize>,

    /// Share of participants per bucket, one decimal.
    pub grade_percentages: BTreeMap<u8, f64>,

    pub good_grades_count: usize,
    pub good_grades_percentage: f64,
    pub pass_rate: f64,
}

/// The five analysis sections, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    LowestResults,
    HighestResults,
    Gaps,
    OverallResults,
    ImprovementMeasures,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::LowestResults,
        Section::HighestResults,
        Section::Gaps,
        Section::OverallResults,
        Section::ImprovementMeasures,
    ];

    /// Key used in storage and in the document context.
    pub fn key(self) -> &'static str {
        match self {
            Section::LowestResults => "lowest_results_analysis",
            Section::HighestResults => "highest_results_analysis",
            Section::Gaps => "gaps_analysis",
            Section::OverallResults => "results_analysis",
            Section::ImprovementMeasures => "improvement_measures",
        }
    }

    /// Text used when nothing usable was extracted for the section.
    pub fn placeholder(self) -> &'static str {
        match self {
            Section::LowestResults => "Анализ на най-ниските резултати.",
            Section::HighestResults => "Анализ на най-високите резултати.",
            Section::Gaps => "Анализ на пропуските.",
            Section::OverallResults => "Общ анализ на резултатите.",
            Section::ImprovementMeasures => "Мерки за подобрение.",
        }
    }
}

/// AI-generated analysis, always fully populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAnalysisSections {
    pub lowest_results_analysis: String,
    pub highest_results_analysis: String,
    pub gaps_analysis: String,
    pub results_analysis: String,
    pub improvement_measures: String,
}

impl AiAnalysisSections {
    pub fn placeholders() -> Self {
        Self::from_parts(Section::ALL.map(|s| s.placeholder().to_string()))
    }

    /// Builds from texts given in canonical order.
    pub fn from_parts(parts: [String; 5]) -> Self {
        let [lowest, highest, gaps, overall, measures] = parts;
        Self {
            lowest_results_analysis: lowest,
            highest_results_analysis: highest,
            gaps_analysis: gaps,
            results_analysis: overall,
            improvement_measures: measures,
        }
    }

    pub fn get(&self, section: Section) -> &str {
        match section {
            Section::LowestResults => &self.lowest_results_analysis,
            Section::HighestResults => &self.highest_results_analysis,
            Section::Gaps => &self.gaps_analysis,
            Section::OverallResults => &self.results_analysis,
            Section::ImprovementMeasures => &self.improvement_measures,
        }
    }
}

/// Row of the 'test_analytics' cache table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsCacheRecord {
    pub test_id: String,
    pub statistics: AggregateStatistics,
    pub question_success_rates: QuestionSuccessRates,
    pub ai_analysis: Option<AiAnalysisSections>,

    // Timestamps are kept textual; they are parsed only for freshness checks.
    pub calculated_at: Option<String>,
    pub updated_at: Option<String>,
    pub ai_generated_at: Option<String>,
}

/// Everything known about one test for one class, ready for the AI prompt and the report.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisData {
    pub test_id: String,
    pub test_name: String,
    pub class_id: String,
    pub class_name: String,
    pub subject: String,
    pub teacher_name: String,

    pub total_questions: usize,
    pub mc_questions: usize,
    pub short_questions: usize,
    pub max_points_test: f64,

    #[serde(flatten)]
    pub statistics: AggregateStatistics,

    /// Complete for every ordinal in `1..=total_questions`.
    pub question_success_rates: QuestionSuccessRates,

    pub from_cache: bool,

    /// Raw records, only present after a fresh computation.
    #[serde(skip)]
    pub students: Vec<StudentRecord>,
    #[serde(skip)]
    pub results: Vec<ResultRecord>,
}

impl AnalysisData {
    /// Success label for a question ordinal, `"0%"` when unknown.
    pub fn success_label(&self, ordinal: usize) -> &str {
        self.question_success_rates
            .get(&ordinal)
            .map(String::as_str)
            .unwrap_or("0%")
    }
}
