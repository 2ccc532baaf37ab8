use async_trait::async_trait;
use sqlx::{postgres::PgPool, postgres::PgPoolOptions, Row};
use std::collections::HashSet;
use std::path::Path;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::error::ScrapeError;
use crate::models::{ExtractionResult, Target};

/// Where finished targets are recorded. Keyed by target name; writing a key
/// twice replaces the earlier row.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn resolved_keys(&self) -> Result<HashSet<String>, ScrapeError>;

    async fn upsert(&self, result: &ExtractionResult) -> Result<(), ScrapeError>;
}

pub async fn connect(db_url: &str) -> Result<PgPool, ScrapeError> {
    let mut attempts = 0;
    loop {
        match PgPoolOptions::new().max_connections(2).connect(db_url).await {
            Ok(pool) => {
                info!("database connected");
                return Ok(pool);
            }
            Err(e) => {
                attempts += 1;
                if attempts >= 15 {
                    error!(attempts, "failed to connect to database");
                    return Err(e.into());
                }
                warn!(error = %e, attempt = attempts, "database connect failed, retrying in 2s");
                sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

pub async fn init_db(pool: &PgPool) -> Result<(), ScrapeError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS extraction_results (
            target_key TEXT PRIMARY KEY,
            field_value TEXT NOT NULL DEFAULT 'not found',
            resolved_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS targets (
            name TEXT PRIMARY KEY
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn resolved_keys(&self) -> Result<HashSet<String>, ScrapeError> {
        let rows = sqlx::query("SELECT target_key FROM extraction_results")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("target_key").map_err(ScrapeError::from))
            .collect()
    }

    async fn upsert(&self, result: &ExtractionResult) -> Result<(), ScrapeError> {
        sqlx::query(
            r#"
            INSERT INTO extraction_results (target_key, field_value, resolved_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (target_key)
            DO UPDATE SET field_value = EXCLUDED.field_value, resolved_at = EXCLUDED.resolved_at
            "#,
        )
        .bind(&result.target_key)
        .bind(&result.field_value)
        .bind(result.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence {
            target: result.target_key.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// Names from the `targets` table, ordered by name.
pub async fn load_targets_from_table(pool: &PgPool) -> Result<Vec<Target>, ScrapeError> {
    let rows = sqlx::query("SELECT name FROM targets ORDER BY name")
        .fetch_all(pool)
        .await?;
    let names = rows
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(clean_targets(names))
}

/// Names from a text file, one per line.
pub async fn load_targets_from_file(path: &Path) -> Result<Vec<Target>, ScrapeError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        ScrapeError::Config(format!("cannot read targets file {}: {}", path.display(), e))
    })?;
    Ok(clean_targets(raw.lines().map(str::to_string)))
}

/// Trims names, drops blanks, keeps the first of any duplicates.
pub fn clean_targets(names: impl IntoIterator<Item = String>) -> Vec<Target> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .map(Target::new)
        .collect()
}
