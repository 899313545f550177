// src/store/settings.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};

use crate::{error::SettingsError, models::settings::AiSettings, store::SettingsStore};

/// Settings kept in the single-row `app_settings` table.
#[derive(Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn ai_settings(&self) -> Result<AiSettings, SettingsError> {
        let row: Option<(Json<AiSettings>,)> =
            sqlx::query_as("SELECT ai_settings FROM app_settings WHERE id")
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(settings),)| settings).unwrap_or_default())
    }

    async fn update_ai_settings(&self, update: AiSettings) -> Result<AiSettings, SettingsError> {
        // Unset fields are skipped when serializing, so `||` only overwrites what was sent.
        let patch = serde_json::to_value(&update)?;

        let (Json(settings),): (Json<AiSettings>,) = sqlx::query_as(
            r#"
            INSERT INTO app_settings (id, ai_settings)
            VALUES (TRUE, $1)
            ON CONFLICT (id) DO UPDATE SET
                ai_settings = app_settings.ai_settings || EXCLUDED.ai_settings,
                updated_at = NOW()
            RETURNING ai_settings
            "#,
        )
        .bind(Json(patch))
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn last_used_template(&self) -> Result<Option<String>, SettingsError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT last_used_template FROM app_settings WHERE id")
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(name,)| name))
    }

    async fn set_last_used_template(&self, name: &str) -> Result<(), SettingsError> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (id, last_used_template)
            VALUES (TRUE, $1)
            ON CONFLICT (id) DO UPDATE SET
                last_used_template = EXCLUDED.last_used_template,
                updated_at = NOW()
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn forget_template(&self, name: &str) -> Result<(), SettingsError> {
        sqlx::query(
            r#"
            UPDATE app_settings
            SET last_used_template = NULL, updated_at = NOW()
            WHERE id AND last_used_template = $1
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
