//! Metric extraction
//!
//! For each column the resolver assigned to a metric type, parses a finite
//! decimal (accepting both `.` and `,` separators) and persists one
//! observation per column. A column that fails to parse is skipped with a
//! warning; it never aborts the rest of the row. A target that fails to
//! parse silently yields "no target".

use crate::db::observations::{self, MetricObservation};
use crate::db::period_records::PeriodRecord;
use crate::ingest::columns::ResolvedRow;
use sqlx::SqliteConnection;
use tracing::warn;

/// Unit recorded on every imported observation
const IMPORT_UNIT: &str = "%";

/// Result of extracting one row's metric columns
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// Number of observations created
    pub created: usize,
    /// Non-fatal per-column warnings (column name + raw value)
    pub warnings: Vec<String>,
}

/// Parse a decimal accepting `,` or `.` as the separator; must be finite
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Persist one observation per parsed metric column under the given record
pub async fn extract_metrics(
    conn: &mut SqliteConnection,
    record: &PeriodRecord,
    resolved: &ResolvedRow,
) -> Result<ExtractionOutcome, sqlx::Error> {
    let mut outcome = ExtractionOutcome::default();

    // Unparsable target degrades to "no target" for the whole row
    let target = resolved.target_raw.as_deref().and_then(parse_decimal);

    for (header, metric_type, raw_value) in &resolved.metrics {
        let value = match parse_decimal(raw_value) {
            Some(v) => v,
            None => {
                let msg = format!(
                    "Could not parse value for column '{}': '{}'",
                    header, raw_value
                );
                warn!(column = %header, raw = %raw_value, "Skipping unparsable metric cell");
                outcome.warnings.push(msg);
                continue;
            }
        };

        let obs = MetricObservation::new(
            record.id,
            *metric_type,
            value,
            target,
            Some(IMPORT_UNIT.to_string()),
        );
        observations::insert_observation(&mut *conn, &obs).await?;
        outcome.created += 1;
    }

    Ok(outcome)
}
