//! HTTP API handlers

pub mod analysis;
pub mod health;
pub mod metrics;
pub mod records;
pub mod subjects;
pub mod upload;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use metrics::metric_routes;
pub use records::record_routes;
pub use subjects::subject_routes;
pub use upload::upload_routes;
