// src/store/cache.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, types::Json};

use crate::{
    error::CacheStoreError,
    models::analytics::{AiAnalysisSections, AnalyticsCacheRecord},
    store::{CacheEntry, CacheStore},
};

#[derive(sqlx::FromRow)]
struct CacheRow {
    test_id: String,
    statistics: Json<Value>,
    question_success_rates: Json<Value>,
    ai_analysis: Option<Json<Value>>,
    calculated_at: Option<String>,
    updated_at: Option<String>,
    ai_generated_at: Option<String>,
}

impl CacheRow {
    fn into_record(self) -> Result<AnalyticsCacheRecord, CacheStoreError> {
        let ai_analysis = match self.ai_analysis {
            Some(Json(raw)) => match serde_json::from_value::<AiAnalysisSections>(raw) {
                Ok(sections) => Some(sections),
                Err(e) => {
                    tracing::warn!("Ignoring malformed cached AI analysis for {}: {}", self.test_id, e);
                    None
                }
            },
            None => None,
        };

        Ok(AnalyticsCacheRecord {
            statistics: serde_json::from_value(self.statistics.0)?,
            question_success_rates: serde_json::from_value(self.question_success_rates.0)?,
            test_id: self.test_id,
            ai_analysis,
            calculated_at: self.calculated_at,
            updated_at: self.updated_at,
            ai_generated_at: self.ai_generated_at,
        })
    }
}

/// Analytics cache in the `test_analytics` table.
#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn load(&self, test_id: &str) -> Result<Option<AnalyticsCacheRecord>, CacheStoreError> {
        let row = sqlx::query_as::<_, CacheRow>(
            r#"
            SELECT test_id, statistics, question_success_rates, ai_analysis,
                   calculated_at::TEXT AS calculated_at,
                   updated_at::TEXT AS updated_at,
                   ai_generated_at::TEXT AS ai_generated_at
            FROM test_analytics
            WHERE test_id = $1
            "#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CacheRow::into_record).transpose()
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), CacheStoreError> {
        let ai_generated_at: Option<DateTime<Utc>> =
            entry.ai_analysis.as_ref().map(|_| entry.saved_at);
        let ai_analysis = entry.ai_analysis.map(Json);

        // calculated_at is only written on insert; an absent analysis keeps the stored one.
        sqlx::query(
            r#"
            INSERT INTO test_analytics
                (test_id, statistics, question_success_rates, ai_analysis,
                 calculated_at, updated_at, ai_generated_at)
            VALUES ($1, $2, $3, $4, $5, $5, $6)
            ON CONFLICT (test_id) DO UPDATE SET
                statistics = EXCLUDED.statistics,
                question_success_rates = EXCLUDED.question_success_rates,
                ai_analysis = COALESCE(EXCLUDED.ai_analysis, test_analytics.ai_analysis),
                ai_generated_at = COALESCE(EXCLUDED.ai_generated_at, test_analytics.ai_generated_at),
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&entry.test_id)
        .bind(Json(&entry.statistics))
        .bind(Json(&entry.question_success_rates))
        .bind(ai_analysis)
        .bind(entry.saved_at)
        .bind(ai_generated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, test_id: &str) -> Result<(), CacheStoreError> {
        sqlx::query("DELETE FROM test_analytics WHERE test_id = $1")
            .bind(test_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
