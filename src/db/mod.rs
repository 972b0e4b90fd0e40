//! Database access for perf-insight
//!
//! SQLite via sqlx, one module per entity. Write operations that must run
//! inside the ingestion transaction are generic over `Executor` so pool and
//! transaction callers share the same functions.

pub mod observations;
pub mod period_records;
pub mod subjects;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to the configured SQLite file (created if missing) and ensures
/// the schema exists.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create perf-insight tables if they don't exist
///
/// Note: `contact_key` carries no UNIQUE constraint. Reconciliation is
/// first-match-wins by design and storage does not guarantee uniqueness.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id TEXT PRIMARY KEY,
            given_name TEXT NOT NULL,
            family_name TEXT NOT NULL,
            contact_key TEXT NOT NULL,
            category TEXT NOT NULL,
            role_label TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS period_records (
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            overall_score REAL,
            analysis TEXT,
            recommendations TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metric_observations (
            id TEXT PRIMARY KEY,
            record_id TEXT NOT NULL REFERENCES period_records(id) ON DELETE CASCADE,
            metric_type TEXT NOT NULL,
            value REAL NOT NULL,
            target REAL,
            unit TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (subjects, period_records, metric_observations)");

    Ok(())
}
