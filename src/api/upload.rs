//! File upload endpoint

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::ingest::{self, IngestReport};
use crate::AppState;

/// POST /upload/file
///
/// Multipart form: `file` (required, .xlsx/.xls/.csv), `period_start` and
/// `period_end` (optional, ISO dates). A missing window defaults to the
/// current calendar month.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<IngestReport>> {
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;
    let mut period_start: Option<NaiveDate> = None;
    let mut period_end: Option<NaiveDate> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                bytes = Some(data.to_vec());
            }
            "period_start" => {
                period_start = Some(parse_date_field("period_start", field).await?);
            }
            "period_end" => {
                period_end = Some(parse_date_field("period_end", field).await?);
            }
            other => {
                return Err(ApiError::BadRequest(format!(
                    "Unexpected form field: {}",
                    other
                )));
            }
        }
    }

    let filename =
        filename.ok_or_else(|| ApiError::BadRequest("Missing file field".to_string()))?;
    let bytes = bytes.ok_or_else(|| ApiError::BadRequest("Missing file field".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    let (default_start, default_end) = month_bounds(Utc::now().date_naive());
    let period_start = period_start.unwrap_or(default_start);
    let period_end = period_end.unwrap_or(default_end);
    if period_start > period_end {
        return Err(ApiError::BadRequest(
            "period_start must not be after period_end".to_string(),
        ));
    }

    info!(%filename, size = bytes.len(), "Upload received");

    let orchestrator = state.orchestrator();
    let report = ingest::ingest_file(
        &state.db,
        &orchestrator,
        &filename,
        &bytes,
        period_start,
        period_end,
    )
    .await?;

    Ok(Json(report))
}

async fn parse_date_field(
    name: &str,
    field: axum::extract::multipart::Field<'_>,
) -> Result<NaiveDate, ApiError> {
    let text = field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", name, e)))?;
    text.trim()
        .parse::<NaiveDate>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {} (expected YYYY-MM-DD)", name)))
}

/// First and last day of the month containing `day`
fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day.with_day(1).unwrap_or(day);
    let next_month_start = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    let end = next_month_start
        .and_then(|d| d.pred_opt())
        .unwrap_or(day);
    (start, end)
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/upload/file", post(upload_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds_regular_month() {
        let (start, end) = month_bounds(NaiveDate::from_ymd_opt(2024, 4, 17).expect("valid date"));
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 4, 1).expect("valid date"));
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 4, 30).expect("valid date"));
    }

    #[test]
    fn test_month_bounds_december_wraps_year() {
        let (start, end) = month_bounds(NaiveDate::from_ymd_opt(2024, 12, 5).expect("valid date"));
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 12, 1).expect("valid date"));
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid date"));
    }

    #[test]
    fn test_month_bounds_february_leap_year() {
        let (_, end) = month_bounds(NaiveDate::from_ymd_opt(2024, 2, 10).expect("valid date"));
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date"));
    }
}
