//! Ingestion pipeline
//!
//! Ties parsing, column resolution, reconciliation and extraction together.
//! All database writes for one file happen in a single transaction; a row
//! that fails validation is reported and skipped without aborting the rest.

use crate::analysis::AnalysisOrchestrator;
use crate::ingest::columns::resolve_row;
use crate::ingest::extractor::extract_metrics;
use crate::ingest::parser::{self, ParseError};
use crate::ingest::reconciler::{resolve_period_record, resolve_subject, ReconcileError};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Fatal ingestion errors
///
/// Row-level problems are collected in the report instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome summary returned to the uploader
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub message: String,
    pub subjects_processed: usize,
    pub records_created: usize,
    pub metrics_created: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Ingest one uploaded file for the given reporting window
///
/// Parses the bytes, then walks the rows inside one transaction: each row
/// resolves to a subject and period record and its metric columns become
/// observations. After commit, every touched record gets its score and
/// narratives refreshed; a refresh failure downgrades to a warning.
pub async fn ingest_file(
    pool: &SqlitePool,
    orchestrator: &AnalysisOrchestrator,
    filename: &str,
    bytes: &[u8],
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<IngestReport, IngestError> {
    info!(filename, %period_start, %period_end, "Starting file ingestion");

    let rows = parser::parse_bytes(filename, bytes)?;
    info!(rows = rows.len(), "File parsed");

    let mut subjects_seen: HashSet<Uuid> = HashSet::new();
    let mut touched_records: Vec<Uuid> = Vec::new();
    let mut records_created = 0usize;
    let mut metrics_created = 0usize;
    let mut warnings: Vec<String> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    let mut tx = pool.begin().await?;

    for row in &rows {
        let row_number = row.line();
        let resolved = resolve_row(row);

        let subject = match resolve_subject(&mut *tx, &resolved.identity).await {
            Ok(subject) => subject,
            Err(ReconcileError::Validation(reason)) => {
                warn!(row = row_number, %reason, "Row skipped");
                errors.push(format!("Row {}: {}", row_number, reason));
                continue;
            }
            Err(ReconcileError::Database(e)) => return Err(e.into()),
        };
        subjects_seen.insert(subject.id);

        let (record, created) =
            resolve_period_record(&mut *tx, &subject, period_start, period_end)
                .await
                .map_err(|e| match e {
                    ReconcileError::Database(e) => IngestError::Database(e),
                    // Record resolution has no validation path
                    ReconcileError::Validation(reason) => {
                        IngestError::Database(sqlx::Error::Protocol(reason))
                    }
                })?;
        if created {
            records_created += 1;
        }
        if !touched_records.contains(&record.id) {
            touched_records.push(record.id);
        }

        let outcome = extract_metrics(&mut *tx, &record, &resolved).await?;
        metrics_created += outcome.created;
        for w in outcome.warnings {
            warnings.push(format!("Row {}: {}", row_number, w));
        }
    }

    tx.commit().await?;

    for record_id in &touched_records {
        if let Err(e) = orchestrator.refresh_record(*record_id).await {
            warn!(record_id = %record_id, error = %e, "Assessment refresh failed");
            warnings.push(format!("Record {}: assessment refresh failed: {}", record_id, e));
        }
    }

    let report = IngestReport {
        // Row-level failures are reported in `errors`; reaching this point
        // means the file itself was processed.
        success: true,
        message: format!(
            "Import completed: {} subject(s), {} record(s) created, {} metric(s)",
            subjects_seen.len(),
            records_created,
            metrics_created
        ),
        subjects_processed: subjects_seen.len(),
        records_created,
        metrics_created,
        warnings,
        errors,
    };

    info!(
        subjects = report.subjects_processed,
        records = report.records_created,
        metrics = report.metrics_created,
        warnings = report.warnings.len(),
        errors = report.errors.len(),
        "Ingestion finished"
    );

    Ok(report)
}
