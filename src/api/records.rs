//! Period record endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::db::{period_records, subjects};
use crate::db::period_records::PeriodRecord;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub subject_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// GET /records
pub async fn list_records(State(state): State<AppState>) -> ApiResult<Json<Vec<PeriodRecord>>> {
    let list = period_records::list_records(&state.db).await?;
    Ok(Json(list))
}

/// GET /records/:id
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PeriodRecord>> {
    let record = period_records::find_record(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("period record {}", id)))?;
    Ok(Json(record))
}

/// GET /subjects/:id/records
pub async fn list_subject_records(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<PeriodRecord>>> {
    if !subjects::subject_exists(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("subject {}", id)));
    }
    let list = period_records::list_by_subject(&state.db, id).await?;
    Ok(Json(list))
}

/// POST /records
pub async fn create_record(
    State(state): State<AppState>,
    Json(req): Json<CreateRecordRequest>,
) -> ApiResult<(StatusCode, Json<PeriodRecord>)> {
    if req.period_start > req.period_end {
        return Err(ApiError::BadRequest(
            "period_start must not be after period_end".to_string(),
        ));
    }
    if !subjects::subject_exists(&state.db, req.subject_id).await? {
        return Err(ApiError::NotFound(format!("subject {}", req.subject_id)));
    }

    // One record per subject and window
    if let Some(existing) = period_records::find_by_window(
        &state.db,
        req.subject_id,
        req.period_start,
        req.period_end,
    )
    .await?
    {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let record = PeriodRecord::new(req.subject_id, req.period_start, req.period_end);
    period_records::insert_record(&state.db, &record).await?;

    info!(record_id = %record.id, subject_id = %record.subject_id, "Period record created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// DELETE /records/:id
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if period_records::find_record(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound(format!("period record {}", id)));
    }
    period_records::delete_record(&state.db, id).await?;
    info!(record_id = %id, "Period record deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build period record routes
pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/records", get(list_records).post(create_record))
        .route("/records/:id", get(get_record).delete(delete_record))
        .route("/subjects/:id/records", get(list_subject_records))
}
