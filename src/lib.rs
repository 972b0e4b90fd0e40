//! perf-insight library interface
//!
//! Exposes the ingestion, scoring and analysis layers plus the HTTP
//! router for integration testing.

pub mod analysis;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod scoring;

pub use crate::error::{ApiError, ApiResult};

use crate::analysis::{AnalysisOrchestrator, RemoteModelClient};
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Remote narrative model client
    pub remote: Arc<dyn RemoteModelClient>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, remote: Arc<dyn RemoteModelClient>) -> Self {
        Self {
            db,
            remote,
            startup_time: Utc::now(),
        }
    }

    /// Orchestrator bound to this state's pool and remote client
    pub fn orchestrator(&self) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(self.db.clone(), self.remote.clone())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(api::upload_routes())
        .merge(api::subject_routes())
        .merge(api::record_routes())
        .merge(api::metric_routes())
        .merge(api::analysis_routes());

    Router::new()
        .nest("/api", api)
        .merge(api::health_routes())
        .with_state(state)
}
