//! perf-insight - Performance data ingestion and analysis service
//!
//! Accepts spreadsheet/CSV uploads of per-subject performance metrics,
//! reconciles them into subjects and period records, scores them, and
//! serves AI-assisted (with rule-based fallback) narrative assessments
//! over HTTP REST.

use anyhow::Result;
use perf_insight::analysis::ChatCompletionsClient;
use perf_insight::config::Config;
use perf_insight::AppState;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting perf-insight service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Database: {}", config.database_path.display());

    let db_pool = perf_insight::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let remote = ChatCompletionsClient::new(
        config.remote_api_url.clone(),
        config.remote_api_key.clone(),
        config.remote_model.clone(),
        config.remote_max_retries,
    )?;

    let state = AppState::new(db_pool, Arc::new(remote));
    let app = perf_insight::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
