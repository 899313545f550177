// src/cache.rs

//! Analytics cache over a [`CacheStore`], plus the freshness protocol that
//! decides whether a cached row may still be trusted.
//!
//! Every store failure is soft: reads degrade to a miss, writes to `false`.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::FRESHNESS_TOLERANCE_SECS,
    models::analytics::{
        AggregateStatistics, AiAnalysisSections, AnalyticsCacheRecord, QuestionSuccessRates,
    },
    store::{CacheEntry, CacheStore, RecordsStore},
    utils::timestamp::is_timestamp_newer,
};

/// Outcome of a freshness check. `Unknown` is used like `Fresh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Unknown(String),
}

impl Freshness {
    pub fn is_usable(&self) -> bool {
        !matches!(self, Freshness::Stale)
    }
}

/// Compares the newest result creation time with the cache row's own timestamp.
pub fn evaluate_freshness(
    record: &AnalyticsCacheRecord,
    latest_result_at: Option<&str>,
) -> Freshness {
    let Some(cached_at) = record.updated_at.as_deref().or(record.calculated_at.as_deref()) else {
        return Freshness::Unknown("cache record has no timestamp".to_string());
    };
    let Some(latest) = latest_result_at else {
        return Freshness::Fresh;
    };

    match is_timestamp_newer(latest, cached_at, FRESHNESS_TOLERANCE_SECS) {
        Some(true) => Freshness::Stale,
        Some(false) => Freshness::Fresh,
        None => Freshness::Unknown(format!(
            "cannot compare timestamps (cache: {}, latest result: {})",
            cached_at, latest
        )),
    }
}

#[derive(Clone)]
pub struct AnalyticsCache {
    store: Arc<dyn CacheStore>,
}

impl AnalyticsCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Cached record for the test, or `None` on a miss or any store error.
    pub async fn get(&self, test_id: &str) -> Option<AnalyticsCacheRecord> {
        match self.store.load(test_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Failed to read analytics cache for {}: {}", test_id, e);
                None
            }
        }
    }

    /// Upserts statistics and rates. A given analysis is stamped with the save time.
    pub async fn save(
        &self,
        test_id: &str,
        statistics: &AggregateStatistics,
        question_success_rates: &QuestionSuccessRates,
        ai_analysis: Option<&AiAnalysisSections>,
    ) -> bool {
        let entry = CacheEntry {
            test_id: test_id.to_string(),
            statistics: statistics.clone(),
            question_success_rates: question_success_rates.clone(),
            ai_analysis: ai_analysis.cloned(),
            saved_at: Utc::now(),
        };

        match self.store.upsert(entry).await {
            Ok(()) => {
                tracing::info!(
                    "Saved analytics for test {}{}",
                    test_id,
                    if ai_analysis.is_some() { " (with AI analysis)" } else { "" }
                );
                true
            }
            Err(e) => {
                tracing::warn!("Failed to save analytics cache for {}: {}", test_id, e);
                false
            }
        }
    }

    /// Idempotent delete.
    pub async fn invalidate(&self, test_id: &str) -> bool {
        match self.store.delete(test_id).await {
            Ok(()) => {
                tracing::info!("Invalidated analytics cache for test {}", test_id);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to invalidate analytics cache for {}: {}", test_id, e);
                false
            }
        }
    }

    pub async fn check_freshness(
        &self,
        record: &AnalyticsCacheRecord,
        records: &dyn RecordsStore,
    ) -> Freshness {
        match records.latest_result_created_at(&record.test_id).await {
            Ok(latest) => evaluate_freshness(record, latest.as_deref()),
            Err(e) => Freshness::Unknown(format!("latest result lookup failed: {}", e)),
        }
    }

    /// Cache hit that survived the freshness check. A stale row is deleted
    /// and reported as a miss.
    pub async fn get_fresh(
        &self,
        test_id: &str,
        records: &dyn RecordsStore,
    ) -> Option<AnalyticsCacheRecord> {
        let record = self.get(test_id).await?;

        match self.check_freshness(&record, records).await {
            Freshness::Fresh => {
                tracing::debug!("Cache for test {} is fresh", test_id);
                Some(record)
            }
            Freshness::Unknown(reason) => {
                tracing::warn!("Using cache for test {} without validation: {}", test_id, reason);
                Some(record)
            }
            Freshness::Stale => {
                tracing::info!("Results changed after cache for test {} was written", test_id);
                self.invalidate(test_id).await;
                None
            }
        }
    }
}
