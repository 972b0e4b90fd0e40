//! Metric observation persistence
//!
//! Observations are append-only: every import row that matches a metric
//! column creates a new observation, never updates an existing one.

use crate::models::MetricType;
use serde::Serialize;
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, Row};
use uuid::Uuid;

/// One measured value, optionally against a target
#[derive(Debug, Clone, Serialize)]
pub struct MetricObservation {
    pub id: Uuid,
    pub record_id: Uuid,
    pub metric_type: MetricType,
    pub value: f64,
    pub target: Option<f64>,
    pub unit: Option<String>,
}

impl MetricObservation {
    /// Create a new observation with a fresh id
    pub fn new(
        record_id: Uuid,
        metric_type: MetricType,
        value: f64,
        target: Option<f64>,
        unit: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id,
            metric_type,
            value,
            target,
            unit,
        }
    }
}

fn observation_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<MetricObservation, sqlx::Error> {
    let id_str: String = row.get("id");
    let record_str: String = row.get("record_id");
    let type_str: String = row.get("metric_type");
    let metric_type = MetricType::parse(&type_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown metric type: {}", type_str).into())
    })?;
    Ok(MetricObservation {
        id: Uuid::parse_str(&id_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        record_id: Uuid::parse_str(&record_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        metric_type,
        value: row.get("value"),
        target: row.get("target"),
        unit: row.get("unit"),
    })
}

/// Insert an observation
pub async fn insert_observation<'e, E>(
    db: E,
    obs: &MetricObservation,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO metric_observations (
            id, record_id, metric_type, value, target, unit, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(obs.id.to_string())
    .bind(obs.record_id.to_string())
    .bind(obs.metric_type.as_str())
    .bind(obs.value)
    .bind(obs.target)
    .bind(&obs.unit)
    .execute(db)
    .await?;

    Ok(())
}

/// Load all observations for one period record, oldest first
pub async fn list_by_record<'e, E>(
    db: E,
    record_id: Uuid,
) -> Result<Vec<MetricObservation>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, record_id, metric_type, value, target, unit \
         FROM metric_observations WHERE record_id = ? ORDER BY created_at",
    )
    .bind(record_id.to_string())
    .fetch_all(db)
    .await?;

    rows.iter().map(observation_from_row).collect()
}

/// Load an observation by id
pub async fn find_observation<'e, E>(
    db: E,
    id: Uuid,
) -> Result<Option<MetricObservation>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, record_id, metric_type, value, target, unit \
         FROM metric_observations WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;

    row.as_ref().map(observation_from_row).transpose()
}

/// Delete an observation by id
pub async fn delete_observation<'e, E>(db: E, id: Uuid) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM metric_observations WHERE id = ?")
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(())
}

/// Count all observations
pub async fn count_observations<'e, E>(db: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT COUNT(*) AS n FROM metric_observations")
        .fetch_one(db)
        .await?;
    Ok(row.get("n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::period_records::{insert_record, PeriodRecord};
    use crate::db::subjects::{insert_subject, Subject};
    use chrono::NaiveDate;
    use sqlx::SqlitePool;

    #[tokio::test]
    async fn test_observations_append_only() {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        crate::db::init_tables(&pool)
            .await
            .expect("Schema initialization failed");

        let subject = Subject::new(
            "Jean".to_string(),
            "Dupont".to_string(),
            "jean@x.com".to_string(),
            "unspecified".to_string(),
            "unspecified".to_string(),
        );
        insert_subject(&pool, &subject).await.expect("insert subject failed");

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date");
        let record = PeriodRecord::new(subject.id, start, end);
        insert_record(&pool, &record).await.expect("insert record failed");

        // Two observations of the same type under one record are allowed
        for _ in 0..2 {
            let obs = MetricObservation::new(
                record.id,
                MetricType::Quality,
                72.0,
                Some(80.0),
                Some("%".to_string()),
            );
            insert_observation(&pool, &obs).await.expect("insert obs failed");
        }

        let loaded = list_by_record(&pool, record.id).await.expect("list failed");
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|o| o.metric_type == MetricType::Quality));
        assert_eq!(loaded[0].target, Some(80.0));
    }
}
