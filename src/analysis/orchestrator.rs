//! Analysis orchestration
//!
//! Drives the two-tier narrative generation per subject: attempt the remote
//! model, fall back to the deterministic scoring narrative when the call
//! fails. Analysis and recommendations share the same try/fallback control
//! flow through `with_fallback`; the remote call's failure never surfaces
//! to the caller as an error.

use crate::analysis::remote::{RemoteError, RemoteModelClient};
use crate::db::observations::{self, MetricObservation};
use crate::db::period_records::{self, PeriodRecord};
use crate::db::subjects::{self, Subject};
use crate::models::MetricType;
use crate::scoring;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert in performance analysis and talent \
management. Your role is to analyze performance indicators and provide detailed, objective \
and constructive assessments. Be precise, professional, and provide actionable insights for \
management decisions.";

const RECOMMENDATION_SYSTEM_PROMPT: &str = "You are a consultant specializing in talent \
development and performance improvement. Your role is to provide concrete, actionable and \
personalized recommendations. They must be practical, measurable, and aligned with \
organizational goals.";

/// Orchestration errors
///
/// Remote failures are absorbed by the fallback and never appear here.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// How a narrative was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeOutcome {
    /// No records, or records without observations
    NoData,
    /// Remote model call succeeded; text returned verbatim
    AiSucceeded,
    /// Remote call failed; deterministic narrative substituted
    Fallback,
}

/// A generated narrative plus how it was obtained
#[derive(Debug, Clone)]
pub struct NarrativeResult {
    pub text: String,
    pub outcome: NarrativeOutcome,
}

/// Two-tier analysis/recommendation generator
pub struct AnalysisOrchestrator {
    pool: SqlitePool,
    remote: Arc<dyn RemoteModelClient>,
}

impl AnalysisOrchestrator {
    pub fn new(pool: SqlitePool, remote: Arc<dyn RemoteModelClient>) -> Self {
        Self { pool, remote }
    }

    /// Generate the performance analysis narrative for a subject
    pub async fn analyze_subject(&self, subject_id: Uuid) -> Result<NarrativeResult, AnalysisError> {
        info!(subject_id = %subject_id, "Starting performance analysis");

        let (subject, records, metrics) = match self.load_subject_data(subject_id).await? {
            Loaded::NoRecords => {
                return Ok(NarrativeResult {
                    text: "No performance records available for this subject.".to_string(),
                    outcome: NarrativeOutcome::NoData,
                })
            }
            Loaded::NoMetrics => {
                return Ok(NarrativeResult {
                    text: "No metrics available for analysis.".to_string(),
                    outcome: NarrativeOutcome::NoData,
                })
            }
            Loaded::Data(subject, records, metrics) => (subject, records, metrics),
        };

        let user_prompt = format!(
            "Analyze the performance of the following subject based on their metric data:\n\n\
             === Subject Profile ===\n{}\n\
             === Metric Data ===\n{}\n\
             Provide a detailed analysis covering:\n\
             1. An executive summary of overall performance\n\
             2. An analysis per metric type (Attendance, Velocity, Quality, ...)\n\
             3. Identified strengths\n\
             4. Areas needing improvement\n\
             5. An overall assessment with a contextual score\n\n\
             Be precise, factual and professional.",
            format_subject_profile(&subject),
            self.format_metric_context(&records, &metrics).await?,
        );

        debug!(subject_id = %subject_id, "Calling remote model for analysis");
        let primary = self
            .remote
            .generate(ANALYSIS_SYSTEM_PROMPT, &user_prompt)
            .await;

        Ok(with_fallback("analysis", primary, || {
            scoring::render_analysis(&metrics)
        }))
    }

    /// Generate improvement recommendations for a subject
    ///
    /// The analysis narrative (remote or fallback) is generated first and
    /// fed to the recommendation prompt as context.
    pub async fn recommend_subject(
        &self,
        subject_id: Uuid,
    ) -> Result<NarrativeResult, AnalysisError> {
        info!(subject_id = %subject_id, "Generating recommendations");

        let (subject, records, metrics) = match self.load_subject_data(subject_id).await? {
            Loaded::NoRecords => {
                return Ok(NarrativeResult {
                    text: "No recommendations available. No performance records found."
                        .to_string(),
                    outcome: NarrativeOutcome::NoData,
                })
            }
            Loaded::NoMetrics => {
                return Ok(NarrativeResult {
                    text: "No recommendations available. No metrics found.".to_string(),
                    outcome: NarrativeOutcome::NoData,
                })
            }
            Loaded::Data(subject, records, metrics) => (subject, records, metrics),
        };

        let analysis = self.analyze_subject(subject_id).await?;

        let user_prompt = format!(
            "Based on the following analysis, generate specific and actionable \
             recommendations:\n\n\
             === Subject Profile ===\n{}\n\
             === Metric Data ===\n{}\n\
             === Performance Analysis ===\n{}\n\n\
             Provide recommendations covering:\n\
             1. Immediate actions to take\n\
             2. Short-term development goals (1-3 months)\n\
             3. Medium-term development goals (3-6 months)\n\
             4. Suggested resources or training\n\
             5. Success indicators to measure improvement\n\n\
             Be specific, practical and results-oriented.",
            format_subject_profile(&subject),
            self.format_metric_context(&records, &metrics).await?,
            analysis.text,
        );

        debug!(subject_id = %subject_id, "Calling remote model for recommendations");
        let primary = self
            .remote
            .generate(RECOMMENDATION_SYSTEM_PROMPT, &user_prompt)
            .await;

        Ok(with_fallback("recommendations", primary, || {
            scoring::render_recommendations(&metrics)
        }))
    }

    /// Recompute and persist the overall score and both narratives for one
    /// period record
    pub async fn refresh_record(&self, record_id: Uuid) -> Result<(), AnalysisError> {
        let record = period_records::find_record(&self.pool, record_id)
            .await?
            .ok_or_else(|| AnalysisError::NotFound(format!("period record {}", record_id)))?;

        let record_metrics = observations::list_by_record(&self.pool, record.id).await?;
        let overall = if record_metrics.is_empty() {
            record.overall_score
        } else {
            Some(scoring::overall_score(&record_metrics))
        };

        let analysis = self.analyze_subject(record.subject_id).await?;
        let recommendations = self.recommend_subject(record.subject_id).await?;

        period_records::update_assessment(
            &self.pool,
            record.id,
            overall,
            &analysis.text,
            &recommendations.text,
        )
        .await?;

        info!(
            record_id = %record.id,
            overall_score = ?overall,
            analysis_outcome = ?analysis.outcome,
            "Record assessment refreshed"
        );
        Ok(())
    }

    async fn load_subject_data(&self, subject_id: Uuid) -> Result<Loaded, AnalysisError> {
        let subject = subjects::find_subject(&self.pool, subject_id)
            .await?
            .ok_or_else(|| AnalysisError::NotFound(format!("subject {}", subject_id)))?;

        let records = period_records::list_by_subject(&self.pool, subject_id).await?;
        if records.is_empty() {
            return Ok(Loaded::NoRecords);
        }

        let mut metrics = Vec::new();
        for record in &records {
            metrics.extend(observations::list_by_record(&self.pool, record.id).await?);
        }
        if metrics.is_empty() {
            return Ok(Loaded::NoMetrics);
        }

        Ok(Loaded::Data(subject, records, metrics))
    }

    /// Chronological per-period metric dump followed by a per-type summary
    async fn format_metric_context(
        &self,
        records: &[PeriodRecord],
        all_metrics: &[MetricObservation],
    ) -> Result<String, AnalysisError> {
        let mut out = String::new();

        for record in records {
            out.push_str(&format!(
                "--- Period: {} to {} ---\n",
                record.period_start, record.period_end
            ));
            if let Some(score) = record.overall_score {
                out.push_str(&format!("Overall score: {:.2}%\n", score));
            }
            let record_metrics = observations::list_by_record(&self.pool, record.id).await?;
            for obs in &record_metrics {
                out.push_str(&format!("  - {}:\n", obs.metric_type.label()));
                out.push_str(&format!("    value: {}\n", obs.value));
                if let Some(target) = obs.target.filter(|t| *t > 0.0) {
                    out.push_str(&format!("    target: {}\n", target));
                    out.push_str(&format!(
                        "    percent: {:.2}%\n",
                        (obs.value / target) * 100.0
                    ));
                }
            }
            out.push('\n');
        }

        out.push_str("=== Summary by Metric Type ===\n");
        let by_type = scoring::score_by_type(all_metrics);
        for ty in MetricType::ALL {
            if let Some(average) = by_type.get(&ty) {
                out.push_str(&format!("{}: average {:.2}%\n", ty.label(), average));
            }
        }

        Ok(out)
    }
}

/// Unified try/classify/fallback step shared by both narrative pipelines
fn with_fallback(
    kind: &str,
    primary: Result<String, RemoteError>,
    fallback: impl FnOnce() -> String,
) -> NarrativeResult {
    match primary {
        Ok(text) => {
            info!(kind, "Remote model {} generated", kind);
            NarrativeResult {
                text,
                outcome: NarrativeOutcome::AiSucceeded,
            }
        }
        Err(e) => {
            warn!(kind, error = %e, "Remote model call failed, using rule-based fallback");
            NarrativeResult {
                text: fallback(),
                outcome: NarrativeOutcome::Fallback,
            }
        }
    }
}

enum Loaded {
    NoRecords,
    NoMetrics,
    Data(Subject, Vec<PeriodRecord>, Vec<MetricObservation>),
}

fn format_subject_profile(subject: &Subject) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Name: {} {}\n",
        subject.given_name, subject.family_name
    ));
    out.push_str(&format!("Contact: {}\n", subject.contact_key));
    out.push_str(&format!("Category: {}\n", subject.category));
    out.push_str(&format!("Role: {}\n", subject.role_label));
    if let Some(created) = &subject.created_at {
        out.push_str(&format!("On record since: {}\n", created));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::observations::{insert_observation, MetricObservation};
    use crate::db::period_records::{insert_record, PeriodRecord};
    use crate::db::subjects::{insert_subject, Subject};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    /// Remote stub returning a fixed outcome
    struct StubRemote {
        response: Result<String, ()>,
    }

    #[async_trait]
    impl RemoteModelClient for StubRemote {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String, RemoteError> {
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(()) => Err(RemoteError::Network("connection refused".to_string())),
            }
        }
    }

    async fn setup(remote: StubRemote) -> (AnalysisOrchestrator, SqlitePool) {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        crate::db::init_tables(&pool)
            .await
            .expect("Schema initialization failed");
        let orchestrator = AnalysisOrchestrator::new(pool.clone(), Arc::new(remote));
        (orchestrator, pool)
    }

    async fn seed_subject(pool: &SqlitePool) -> Subject {
        let subject = Subject::new(
            "Jean".to_string(),
            "Dupont".to_string(),
            "jean@x.com".to_string(),
            "Engineering".to_string(),
            "Developer".to_string(),
        );
        insert_subject(pool, &subject).await.expect("insert subject");
        subject
    }

    async fn seed_record_with_metric(pool: &SqlitePool, subject: &Subject) -> PeriodRecord {
        let record = PeriodRecord::new(
            subject.id,
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date"),
        );
        insert_record(pool, &record).await.expect("insert record");
        let obs = MetricObservation::new(
            record.id,
            MetricType::Quality,
            72.0,
            Some(80.0),
            Some("%".to_string()),
        );
        insert_observation(pool, &obs).await.expect("insert obs");
        record
    }

    #[tokio::test]
    async fn test_no_records_message() {
        let (orchestrator, pool) = setup(StubRemote { response: Err(()) }).await;
        let subject = seed_subject(&pool).await;

        let result = orchestrator.analyze_subject(subject.id).await.expect("analyze failed");
        assert_eq!(result.outcome, NarrativeOutcome::NoData);
        assert!(result.text.contains("No performance records"));
    }

    #[tokio::test]
    async fn test_no_metrics_message_is_distinct() {
        let (orchestrator, pool) = setup(StubRemote { response: Err(()) }).await;
        let subject = seed_subject(&pool).await;
        let record = PeriodRecord::new(
            subject.id,
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date"),
        );
        insert_record(&pool, &record).await.expect("insert record");

        let result = orchestrator.analyze_subject(subject.id).await.expect("analyze failed");
        assert_eq!(result.outcome, NarrativeOutcome::NoData);
        assert!(result.text.contains("No metrics available"));
    }

    #[tokio::test]
    async fn test_ai_success_returns_verbatim() {
        let (orchestrator, pool) = setup(StubRemote {
            response: Ok("model narrative".to_string()),
        })
        .await;
        let subject = seed_subject(&pool).await;
        seed_record_with_metric(&pool, &subject).await;

        let result = orchestrator.analyze_subject(subject.id).await.expect("analyze failed");
        assert_eq!(result.outcome, NarrativeOutcome::AiSucceeded);
        assert_eq!(result.text, "model narrative");
    }

    #[tokio::test]
    async fn test_fallback_never_empty_never_errors() {
        let (orchestrator, pool) = setup(StubRemote { response: Err(()) }).await;
        let subject = seed_subject(&pool).await;
        seed_record_with_metric(&pool, &subject).await;

        let analysis = orchestrator.analyze_subject(subject.id).await.expect("analyze failed");
        assert_eq!(analysis.outcome, NarrativeOutcome::Fallback);
        assert!(!analysis.text.is_empty());
        assert!(analysis.text.contains("Quality: 90.00%"));

        let recommendations = orchestrator
            .recommend_subject(subject.id)
            .await
            .expect("recommend failed");
        assert_eq!(recommendations.outcome, NarrativeOutcome::Fallback);
        assert!(!recommendations.text.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_record_persists_assessment() {
        let (orchestrator, pool) = setup(StubRemote { response: Err(()) }).await;
        let subject = seed_subject(&pool).await;
        let record = seed_record_with_metric(&pool, &subject).await;

        orchestrator.refresh_record(record.id).await.expect("refresh failed");

        let loaded = crate::db::period_records::find_record(&pool, record.id)
            .await
            .expect("find failed")
            .expect("record not found");
        assert_eq!(loaded.overall_score, Some(90.0));
        assert!(loaded.analysis.is_some());
        assert!(loaded.recommendations.is_some());
    }
}
