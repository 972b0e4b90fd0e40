//! Analysis and recommendation endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::NarrativeOutcome;
use crate::error::ApiResult;
use crate::AppState;

/// Narrative response envelope
#[derive(Debug, Serialize)]
pub struct NarrativeResponse {
    pub subject_id: Uuid,
    pub text: String,
    /// "ai", "fallback" or "none"
    pub source: &'static str,
}

fn source_label(outcome: NarrativeOutcome) -> &'static str {
    match outcome {
        NarrativeOutcome::AiSucceeded => "ai",
        NarrativeOutcome::Fallback => "fallback",
        NarrativeOutcome::NoData => "none",
    }
}

/// GET /analysis/subjects/:id
pub async fn subject_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NarrativeResponse>> {
    let result = state.orchestrator().analyze_subject(id).await?;
    Ok(Json(NarrativeResponse {
        subject_id: id,
        text: result.text,
        source: source_label(result.outcome),
    }))
}

/// GET /analysis/subjects/:id/recommendations
pub async fn subject_recommendations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NarrativeResponse>> {
    let result = state.orchestrator().recommend_subject(id).await?;
    Ok(Json(NarrativeResponse {
        subject_id: id,
        text: result.text,
        source: source_label(result.outcome),
    }))
}

/// POST /analysis/records/:id/refresh
///
/// Recomputes the overall score and re-generates both narratives for the
/// record, persisting the results.
pub async fn refresh_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.orchestrator().refresh_record(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analysis/subjects/:id", get(subject_analysis))
        .route(
            "/analysis/subjects/:id/recommendations",
            get(subject_recommendations),
        )
        .route("/analysis/records/:id/refresh", post(refresh_record))
}
