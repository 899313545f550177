// src/store/records.rs

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::{
    error::RecordsError,
    models::{
        normalize,
        result::ResultRecord,
        student::StudentRecord,
        test::{ClassInfo, TestDefinition},
    },
    store::RecordsStore,
};

/// Records store backed by the `tests`, `classes`, `students` and `results` tables.
///
/// Rows are read whole through `to_jsonb` and handed to `models::normalize`,
/// so extra or renamed columns never break a query.
#[derive(Clone)]
pub struct PgRecordsStore {
    pool: PgPool,
}

impl PgRecordsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordsStore for PgRecordsStore {
    async fn get_test(&self, test_id: &str) -> Result<Option<TestDefinition>, RecordsError> {
        let row: Option<Value> =
            sqlx::query_scalar("SELECT to_jsonb(t) FROM tests t WHERE t.id::TEXT = $1")
                .bind(test_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to fetch test {}: {:?}", test_id, e);
                    RecordsError::from(e)
                })?;

        Ok(row.as_ref().map(normalize::test_definition))
    }

    async fn get_class(&self, class_id: &str) -> Result<Option<ClassInfo>, RecordsError> {
        let row: Option<Value> =
            sqlx::query_scalar("SELECT to_jsonb(c) FROM classes c WHERE c.id::TEXT = $1")
                .bind(class_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to fetch class {}: {:?}", class_id, e);
                    RecordsError::from(e)
                })?;

        Ok(row.as_ref().map(normalize::class_info))
    }

    async fn get_students(&self, class_id: &str) -> Result<Vec<StudentRecord>, RecordsError> {
        let rows: Vec<Value> =
            sqlx::query_scalar("SELECT to_jsonb(s) FROM students s WHERE s.class_id::TEXT = $1")
                .bind(class_id)
                .fetch_all(&self.pool)
                .await?;

        tracing::debug!("Fetched {} students for class {}", rows.len(), class_id);
        Ok(rows.iter().map(normalize::student).collect())
    }

    async fn get_results(&self, test_id: &str) -> Result<Vec<ResultRecord>, RecordsError> {
        let rows: Vec<Value> = sqlx::query_scalar(
            "SELECT to_jsonb(r) FROM results r WHERE r.test_id::TEXT = $1 ORDER BY r.created_at",
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("Fetched {} results for test {}", rows.len(), test_id);
        Ok(rows.iter().map(normalize::result).collect())
    }

    async fn latest_result_created_at(
        &self,
        test_id: &str,
    ) -> Result<Option<String>, RecordsError> {
        let latest: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT created_at::TEXT
            FROM results
            WHERE test_id::TEXT = $1
            ORDER BY created_at DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(latest.flatten())
    }

    async fn ping(&self) -> Result<(), RecordsError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
