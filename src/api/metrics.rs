//! Metric observation endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::db::observations::{self, MetricObservation};
use crate::db::period_records;
use crate::error::{ApiError, ApiResult};
use crate::models::MetricType;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateObservationRequest {
    pub metric_type: String,
    pub value: f64,
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// GET /records/:id/metrics
pub async fn list_record_metrics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<MetricObservation>>> {
    if period_records::find_record(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound(format!("period record {}", id)));
    }
    let list = observations::list_by_record(&state.db, id).await?;
    Ok(Json(list))
}

/// GET /metrics/:id
pub async fn get_observation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MetricObservation>> {
    let obs = observations::find_observation(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("metric observation {}", id)))?;
    Ok(Json(obs))
}

/// POST /records/:id/metrics
pub async fn create_observation(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    Json(req): Json<CreateObservationRequest>,
) -> ApiResult<(StatusCode, Json<MetricObservation>)> {
    let metric_type = MetricType::parse(&req.metric_type).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown metric type: {}", req.metric_type))
    })?;
    if !req.value.is_finite() {
        return Err(ApiError::BadRequest("value must be finite".to_string()));
    }
    if period_records::find_record(&state.db, record_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(format!("period record {}", record_id)));
    }

    let obs = MetricObservation::new(record_id, metric_type, req.value, req.target, req.unit);
    observations::insert_observation(&state.db, &obs).await?;

    info!(observation_id = %obs.id, record_id = %obs.record_id, "Observation created");
    Ok((StatusCode::CREATED, Json(obs)))
}

/// DELETE /metrics/:id
pub async fn delete_observation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if observations::find_observation(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound(format!("metric observation {}", id)));
    }
    observations::delete_observation(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build metric observation routes
pub fn metric_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/metrics/:id",
            get(get_observation).delete(delete_observation),
        )
        .route(
            "/records/:id/metrics",
            get(list_record_metrics).post(create_observation),
        )
}
