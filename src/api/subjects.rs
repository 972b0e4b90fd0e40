//! Subject CRUD endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::db::subjects::{self, Subject};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubjectRequest {
    pub given_name: String,
    pub family_name: String,
    pub contact_key: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub role_label: Option<String>,
}

impl SubjectRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.given_name.trim().is_empty() || self.family_name.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "given_name and family_name are required".to_string(),
            ));
        }
        if self.contact_key.trim().is_empty() {
            return Err(ApiError::BadRequest("contact_key is required".to_string()));
        }
        Ok(())
    }
}

/// GET /subjects
pub async fn list_subjects(State(state): State<AppState>) -> ApiResult<Json<Vec<Subject>>> {
    let list = subjects::list_subjects(&state.db).await?;
    Ok(Json(list))
}

/// GET /subjects/:id
pub async fn get_subject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Subject>> {
    let subject = subjects::find_subject(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("subject {}", id)))?;
    Ok(Json(subject))
}

/// POST /subjects
pub async fn create_subject(
    State(state): State<AppState>,
    Json(req): Json<SubjectRequest>,
) -> ApiResult<(StatusCode, Json<Subject>)> {
    req.validate()?;

    let subject = Subject::new(
        req.given_name.trim().to_string(),
        req.family_name.trim().to_string(),
        req.contact_key.trim().to_string(),
        req.category.unwrap_or_else(|| "unspecified".to_string()),
        req.role_label.unwrap_or_else(|| "unspecified".to_string()),
    );
    subjects::insert_subject(&state.db, &subject).await?;

    info!(subject_id = %subject.id, "Subject created");
    Ok((StatusCode::CREATED, Json(subject)))
}

/// PUT /subjects/:id
pub async fn update_subject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubjectRequest>,
) -> ApiResult<Json<Subject>> {
    req.validate()?;

    let mut subject = subjects::find_subject(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("subject {}", id)))?;

    subject.given_name = req.given_name.trim().to_string();
    subject.family_name = req.family_name.trim().to_string();
    subject.contact_key = req.contact_key.trim().to_string();
    if let Some(category) = req.category {
        subject.category = category;
    }
    if let Some(role_label) = req.role_label {
        subject.role_label = role_label;
    }
    subjects::update_subject(&state.db, &subject).await?;

    Ok(Json(subject))
}

/// DELETE /subjects/:id
pub async fn delete_subject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !subjects::subject_exists(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("subject {}", id)));
    }
    subjects::delete_subject(&state.db, id).await?;
    info!(subject_id = %id, "Subject deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build subject routes
pub fn subject_routes() -> Router<AppState> {
    Router::new()
        .route("/subjects", get(list_subjects).post(create_subject))
        .route(
            "/subjects/:id",
            get(get_subject).put(update_subject).delete(delete_subject),
        )
}
