//! End-to-end ingestion tests
//!
//! Drives the full pipeline (parse, resolve, reconcile, extract, score,
//! narrative refresh) from raw CSV bytes against an in-memory database,
//! with a remote client that always fails so the rule-based fallback is
//! exercised.

use async_trait::async_trait;
use chrono::NaiveDate;
use perf_insight::analysis::{AnalysisOrchestrator, RemoteError, RemoteModelClient};
use perf_insight::db;
use perf_insight::ingest;
use perf_insight::models::MetricType;
use sqlx::SqlitePool;
use std::sync::Arc;

struct OfflineRemote;

#[async_trait]
impl RemoteModelClient for OfflineRemote {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String, RemoteError> {
        Err(RemoteError::Network("offline".to_string()))
    }
}

async fn setup() -> (SqlitePool, AnalysisOrchestrator) {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    db::init_tables(&pool)
        .await
        .expect("Failed to initialize database schema");
    let orchestrator = AnalysisOrchestrator::new(pool.clone(), Arc::new(OfflineRemote));
    (pool, orchestrator)
}

fn january() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date"),
    )
}

const SINGLE_ROW_CSV: &str = "Prénom,Nom,Email,Qualité,Objectif Qualité\n\
                              Jean,Dupont,jean.dupont@example.com,72,80\n";

#[tokio::test]
async fn test_single_row_import_creates_full_chain() {
    let (pool, orchestrator) = setup().await;
    let (start, end) = january();

    let report = ingest::ingest_file(
        &pool,
        &orchestrator,
        "performance.csv",
        SINGLE_ROW_CSV.as_bytes(),
        start,
        end,
    )
    .await
    .expect("ingest failed");

    assert!(report.success, "errors: {:?}", report.errors);
    assert_eq!(report.subjects_processed, 1);
    assert_eq!(report.records_created, 1);
    assert_eq!(report.metrics_created, 1);
    assert!(report.errors.is_empty());

    // Subject resolved from the row's identity columns
    let subject = db::subjects::find_by_contact_key(&pool, "jean.dupont@example.com")
        .await
        .expect("query failed")
        .expect("subject not found");
    assert_eq!(subject.given_name, "Jean");
    assert_eq!(subject.family_name, "Dupont");

    // Exactly one record for the window
    let records = db::period_records::list_by_subject(&pool, subject.id)
        .await
        .expect("query failed");
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.period_start, start);
    assert_eq!(record.period_end, end);

    // The target column produced a target, not a second metric
    let observations = db::observations::list_by_record(&pool, record.id)
        .await
        .expect("query failed");
    assert_eq!(observations.len(), 1);
    let obs = &observations[0];
    assert_eq!(obs.metric_type, MetricType::Quality);
    assert_eq!(obs.value, 72.0);
    assert_eq!(obs.target, Some(80.0));
    assert_eq!(obs.unit.as_deref(), Some("%"));

    // Post-commit refresh persisted the score and fallback narratives
    assert_eq!(record.overall_score, Some(90.0));
    let analysis = record.analysis.as_deref().expect("analysis missing");
    assert!(analysis.contains("Quality: 90.00%"));
    let recommendations = record
        .recommendations
        .as_deref()
        .expect("recommendations missing");
    assert!(!recommendations.is_empty());
}

#[tokio::test]
async fn test_reimport_is_idempotent_for_entities() {
    let (pool, orchestrator) = setup().await;
    let (start, end) = january();

    for _ in 0..2 {
        ingest::ingest_file(
            &pool,
            &orchestrator,
            "performance.csv",
            SINGLE_ROW_CSV.as_bytes(),
            start,
            end,
        )
        .await
        .expect("ingest failed");
    }

    assert_eq!(
        db::subjects::count_subjects(&pool).await.expect("count failed"),
        1
    );
    assert_eq!(
        db::period_records::count_records(&pool).await.expect("count failed"),
        1
    );
    // Observations append on every import
    assert_eq!(
        db::observations::count_observations(&pool).await.expect("count failed"),
        2
    );
}

#[tokio::test]
async fn test_multiple_metrics_and_rows() {
    let (pool, orchestrator) = setup().await;
    let (start, end) = january();

    let csv = "Prénom,Nom,Email,Vélocité,Qualité,Assiduité\n\
               Jean,Dupont,jean@x.com,\"42,5\",88,95\n\
               Marie,Curie,marie@x.com,50,91,not-a-number\n";

    let report = ingest::ingest_file(&pool, &orchestrator, "perf.csv", csv.as_bytes(), start, end)
        .await
        .expect("ingest failed");

    assert!(report.success);
    assert_eq!(report.subjects_processed, 2);
    assert_eq!(report.records_created, 2);
    // 3 metrics for Jean (comma decimal accepted), 2 for Marie
    assert_eq!(report.metrics_created, 5);
    assert_eq!(report.warnings.iter().filter(|w| w.contains("Row 3")).count(), 1);

    let jean = db::subjects::find_by_contact_key(&pool, "jean@x.com")
        .await
        .expect("query failed")
        .expect("subject missing");
    let records = db::period_records::list_by_subject(&pool, jean.id)
        .await
        .expect("query failed");
    let observations = db::observations::list_by_record(&pool, records[0].id)
        .await
        .expect("query failed");
    let velocity = observations
        .iter()
        .find(|o| o.metric_type == MetricType::Velocity)
        .expect("velocity observation missing");
    assert_eq!(velocity.value, 42.5);
    assert_eq!(velocity.target, None);
}

#[tokio::test]
async fn test_name_only_row_synthesizes_contact_key() {
    let (pool, orchestrator) = setup().await;
    let (start, end) = january();

    let csv = "Prénom,Nom,Qualité\nAda,Lovelace,77\n";
    let report = ingest::ingest_file(&pool, &orchestrator, "perf.csv", csv.as_bytes(), start, end)
        .await
        .expect("ingest failed");
    assert!(report.success);

    let subjects = db::subjects::list_subjects(&pool).await.expect("query failed");
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].contact_key.starts_with("ada.lovelace."));
    assert!(subjects[0].contact_key.ends_with("@import.local"));
    assert_eq!(subjects[0].category, "unspecified");
}

#[tokio::test]
async fn test_unsupported_format_is_fatal() {
    let (pool, orchestrator) = setup().await;
    let (start, end) = january();

    let result =
        ingest::ingest_file(&pool, &orchestrator, "report.pdf", b"%PDF-1.4", start, end).await;
    assert!(matches!(result, Err(ingest::IngestError::Parse(_))));
    assert_eq!(
        db::subjects::count_subjects(&pool).await.expect("count failed"),
        0
    );
}
