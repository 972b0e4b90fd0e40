//! Period record persistence
//!
//! A period record is one scored evaluation window for a subject. The
//! (subject, exact start, exact end) tuple is the reconciliation key:
//! re-imports reuse the existing record.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, Row};
use uuid::Uuid;

/// One evaluation window for a subject
#[derive(Debug, Clone, Serialize)]
pub struct PeriodRecord {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub overall_score: Option<f64>,
    pub analysis: Option<String>,
    pub recommendations: Option<String>,
}

impl PeriodRecord {
    /// Create a new record bound to a subject, with no scores yet
    pub fn new(subject_id: Uuid, period_start: NaiveDate, period_end: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            period_start,
            period_end,
            overall_score: None,
            analysis: None,
            recommendations: None,
        }
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PeriodRecord, sqlx::Error> {
    let id_str: String = row.get("id");
    let subject_str: String = row.get("subject_id");
    Ok(PeriodRecord {
        id: Uuid::parse_str(&id_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        subject_id: Uuid::parse_str(&subject_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        period_start: row.get("period_start"),
        period_end: row.get("period_end"),
        overall_score: row.get("overall_score"),
        analysis: row.get("analysis"),
        recommendations: row.get("recommendations"),
    })
}

/// Insert a period record (flushes immediately so the id is durable)
pub async fn insert_record<'e, E>(db: E, record: &PeriodRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO period_records (
            id, subject_id, period_start, period_end, overall_score,
            analysis, recommendations, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.subject_id.to_string())
    .bind(record.period_start)
    .bind(record.period_end)
    .bind(record.overall_score)
    .bind(&record.analysis)
    .bind(&record.recommendations)
    .execute(db)
    .await?;

    Ok(())
}

/// Load a record by id
pub async fn find_record<'e, E>(db: E, id: Uuid) -> Result<Option<PeriodRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, subject_id, period_start, period_end, overall_score, analysis, recommendations \
         FROM period_records WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Load all records for one subject, oldest period first
pub async fn list_by_subject<'e, E>(
    db: E,
    subject_id: Uuid,
) -> Result<Vec<PeriodRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, subject_id, period_start, period_end, overall_score, analysis, recommendations \
         FROM period_records WHERE subject_id = ? ORDER BY period_start",
    )
    .bind(subject_id.to_string())
    .fetch_all(db)
    .await?;

    rows.iter().map(record_from_row).collect()
}

/// Load the record matching a subject and an exact period window
pub async fn find_by_window<'e, E>(
    db: E,
    subject_id: Uuid,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<Option<PeriodRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, subject_id, period_start, period_end, overall_score, analysis, recommendations \
         FROM period_records WHERE subject_id = ? AND period_start = ? AND period_end = ?",
    )
    .bind(subject_id.to_string())
    .bind(period_start)
    .bind(period_end)
    .fetch_optional(db)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Load all records
pub async fn list_records<'e, E>(db: E) -> Result<Vec<PeriodRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, subject_id, period_start, period_end, overall_score, analysis, recommendations \
         FROM period_records ORDER BY period_start",
    )
    .fetch_all(db)
    .await?;

    rows.iter().map(record_from_row).collect()
}

/// Persist the computed score and narrative outputs onto a record
pub async fn update_assessment<'e, E>(
    db: E,
    id: Uuid,
    overall_score: Option<f64>,
    analysis: &str,
    recommendations: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE period_records SET
            overall_score = ?, analysis = ?, recommendations = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(overall_score)
    .bind(analysis)
    .bind(recommendations)
    .bind(id.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Delete a record; its observations go with it via ON DELETE CASCADE
pub async fn delete_record<'e, E>(db: E, id: Uuid) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM period_records WHERE id = ?")
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(())
}

/// Count all records
pub async fn count_records<'e, E>(db: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT COUNT(*) AS n FROM period_records")
        .fetch_one(db)
        .await?;
    Ok(row.get("n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::subjects::{insert_subject, Subject};
    use sqlx::SqlitePool;

    async fn test_pool_with_subject() -> (SqlitePool, Subject) {
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
        insert_subject(&pool, &subject).await.expect("insert failed");
        (pool, subject)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[tokio::test]
    async fn test_exact_window_match() {
        let (pool, subject) = test_pool_with_subject().await;

        let record = PeriodRecord::new(subject.id, date(2024, 1, 1), date(2024, 1, 31));
        insert_record(&pool, &record).await.expect("insert failed");

        let found = find_by_window(&pool, subject.id, date(2024, 1, 1), date(2024, 1, 31))
            .await
            .expect("query failed")
            .expect("record not found");
        assert_eq!(found.id, record.id);

        // Different end date: no match
        let miss = find_by_window(&pool, subject.id, date(2024, 1, 1), date(2024, 1, 30))
            .await
            .expect("query failed");
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_update_assessment() {
        let (pool, subject) = test_pool_with_subject().await;

        let record = PeriodRecord::new(subject.id, date(2024, 2, 1), date(2024, 2, 29));
        insert_record(&pool, &record).await.expect("insert failed");

        update_assessment(&pool, record.id, Some(90.0), "analysis text", "reco text")
            .await
            .expect("update failed");

        let loaded = find_record(&pool, record.id)
            .await
            .expect("find failed")
            .expect("record not found");
        assert_eq!(loaded.overall_score, Some(90.0));
        assert_eq!(loaded.analysis.as_deref(), Some("analysis text"));
        assert_eq!(loaded.recommendations.as_deref(), Some("reco text"));
    }

    #[tokio::test]
    async fn test_delete_record_cascades_to_observations() {
        use crate::db::observations::{count_observations, insert_observation, MetricObservation};
        use crate::models::MetricType;

        let (pool, subject) = test_pool_with_subject().await;

        let record = PeriodRecord::new(subject.id, date(2024, 3, 1), date(2024, 3, 31));
        insert_record(&pool, &record).await.expect("insert failed");

        let obs = MetricObservation::new(
            record.id,
            MetricType::Quality,
            91.0,
            Some(100.0),
            Some("%".to_string()),
        );
        insert_observation(&pool, &obs).await.expect("insert failed");

        delete_record(&pool, record.id).await.expect("delete failed");

        assert!(find_record(&pool, record.id)
            .await
            .expect("find failed")
            .is_none());
        assert_eq!(count_observations(&pool).await.expect("count failed"), 0);
    }
}
