// src/store/templates.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::TemplateError,
    store::{Template, TemplateInfo, TemplateStore},
};

#[derive(sqlx::FromRow)]
struct TemplateInfoRow {
    name: String,
    size: i64,
    created_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    name: String,
    content: Vec<u8>,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Template {
            name: row.name,
            content: row.content,
        }
    }
}

/// Report templates kept in the `report_templates` table.
#[derive(Clone)]
pub struct PgTemplateStore {
    pool: PgPool,
}

impl PgTemplateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn list(&self) -> Result<Vec<TemplateInfo>, TemplateError> {
        let rows = sqlx::query_as::<_, TemplateInfoRow>(
            r#"
            SELECT name,
                   octet_length(content)::BIGINT AS size,
                   created_at::TEXT AS created_at,
                   updated_at::TEXT AS updated_at
            FROM report_templates
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| TemplateInfo {
                name: r.name,
                size: r.size,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Template, TemplateError> {
        sqlx::query_as::<_, TemplateRow>(
            "SELECT name, content FROM report_templates WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .map(Template::from)
        .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    async fn latest(&self) -> Result<Template, TemplateError> {
        sqlx::query_as::<_, TemplateRow>(
            "SELECT name, content FROM report_templates ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .map(Template::from)
        .ok_or(TemplateError::NoTemplates)
    }

    async fn create(&self, name: &str, content: Vec<u8>) -> Result<(), TemplateError> {
        let result = sqlx::query(
            r#"
            INSERT INTO report_templates (name, content)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store template {}: {:?}", name, e);
            TemplateError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(TemplateError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, TemplateError> {
        let result = sqlx::query("DELETE FROM report_templates WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
