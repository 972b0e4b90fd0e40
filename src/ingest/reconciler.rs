//! Entity reconciliation
//!
//! Finds or creates the subject for a row and the enclosing period record,
//! enforcing idempotency across repeated imports. Both operations may write
//! as a side effect of a read-shaped call, so callers run them inside the
//! ingestion transaction.
//!
//! Name-based matching is a deliberate linear scan over all subjects
//! (first case-insensitive match wins); O(subjects) per unmatched row is an
//! accepted scaling limit at this data volume.

use crate::db::period_records::{self, PeriodRecord};
use crate::db::subjects::{self, Subject};
use crate::ingest::columns::IdentityFields;
use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use thiserror::Error;
use tracing::debug;

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A required identity field is missing when creating a subject
    #[error("Row validation failed: {0}")]
    Validation(String),

    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Find or create the subject a row refers to
///
/// Lookup order: exact contact key, then case-insensitive (given, family)
/// scan, then create. New subjects are inserted immediately so a durable id
/// exists for dependent records.
pub async fn resolve_subject(
    conn: &mut SqliteConnection,
    identity: &IdentityFields,
) -> Result<Subject, ReconcileError> {
    if let Some(key) = &identity.contact_key {
        if let Some(existing) = subjects::find_by_contact_key(&mut *conn, key).await? {
            debug!(subject_id = %existing.id, contact_key = %key, "Subject matched by contact key");
            return Ok(existing);
        }
        return create_subject(conn, identity).await;
    }

    if let (Some(given), Some(family)) = (&identity.given_name, &identity.family_name) {
        let given_lower = given.to_lowercase();
        let family_lower = family.to_lowercase();
        for candidate in subjects::list_subjects(&mut *conn).await? {
            if candidate.given_name.to_lowercase() == given_lower
                && candidate.family_name.to_lowercase() == family_lower
            {
                debug!(subject_id = %candidate.id, "Subject matched by name scan");
                return Ok(candidate);
            }
        }
    }

    create_subject(conn, identity).await
}

async fn create_subject(
    conn: &mut SqliteConnection,
    identity: &IdentityFields,
) -> Result<Subject, ReconcileError> {
    let given = identity
        .given_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ReconcileError::Validation("a given name is required to create a subject".to_string())
        })?;
    let family = identity
        .family_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ReconcileError::Validation("a family name is required to create a subject".to_string())
        })?;

    let contact_key = match &identity.contact_key {
        Some(key) => key.trim().to_string(),
        None => synthesize_contact_key(given, family),
    };
    let category = identity
        .category
        .clone()
        .unwrap_or_else(|| "unspecified".to_string());
    let role_label = identity
        .role_label
        .clone()
        .unwrap_or_else(|| "unspecified".to_string());

    let subject = Subject::new(
        given.to_string(),
        family.to_string(),
        contact_key,
        category,
        role_label,
    );
    subjects::insert_subject(&mut *conn, &subject).await?;

    debug!(
        subject_id = %subject.id,
        given = %subject.given_name,
        family = %subject.family_name,
        "Created new subject"
    );
    Ok(subject)
}

/// Synthesized contact keys carry a wall-clock millisecond component so two
/// distinct unnamed imports never collide
fn synthesize_contact_key(given: &str, family: &str) -> String {
    let slug = format!("{}.{}", given.to_lowercase(), family.to_lowercase());
    let slug: String = slug
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(".");
    format!("{}.{}@import.local", slug, Utc::now().timestamp_millis())
}

/// Find or create the period record for (subject, exact start, exact end)
///
/// Returns the record plus whether it was newly created, so the ingestion
/// pipeline can count created records separately from reused ones.
pub async fn resolve_period_record(
    conn: &mut SqliteConnection,
    subject: &Subject,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<(PeriodRecord, bool), ReconcileError> {
    if let Some(existing) =
        period_records::find_by_window(&mut *conn, subject.id, period_start, period_end).await?
    {
        debug!(record_id = %existing.id, "Period record matched by exact window");
        return Ok((existing, false));
    }

    let record = PeriodRecord::new(subject.id, period_start, period_end);
    period_records::insert_record(&mut *conn, &record).await?;

    debug!(
        record_id = %record.id,
        subject_id = %subject.id,
        period_start = %period_start,
        period_end = %period_end,
        "Created new period record"
    );
    Ok((record, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        crate::db::init_tables(&pool)
            .await
            .expect("Schema initialization failed");
        pool
    }

    fn identity(
        contact: Option<&str>,
        given: Option<&str>,
        family: Option<&str>,
    ) -> IdentityFields {
        IdentityFields {
            contact_key: contact.map(String::from),
            given_name: given.map(String::from),
            family_name: family.map(String::from),
            category: None,
            role_label: None,
        }
    }

    #[tokio::test]
    async fn test_contact_key_match_is_idempotent() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.expect("acquire failed");

        let fields = identity(Some("jean@x.com"), Some("Jean"), Some("Dupont"));
        let first = resolve_subject(&mut conn, &fields).await.expect("resolve failed");
        let second = resolve_subject(&mut conn, &fields).await.expect("resolve failed");
        assert_eq!(first.id, second.id);

        let count = crate::db::subjects::count_subjects(&pool).await.expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_name_match_case_insensitive() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.expect("acquire failed");

        let first = resolve_subject(&mut conn, &identity(None, Some("Jean"), Some("Dupont")))
            .await
            .expect("resolve failed");
        let second = resolve_subject(&mut conn, &identity(None, Some("JEAN"), Some("dupont")))
            .await
            .expect("resolve failed");
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_missing_names_rejected() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.expect("acquire failed");

        let result = resolve_subject(&mut conn, &identity(None, Some("Jean"), None)).await;
        assert!(matches!(result, Err(ReconcileError::Validation(_))));

        let result = resolve_subject(&mut conn, &identity(None, None, Some("Dupont"))).await;
        assert!(matches!(result, Err(ReconcileError::Validation(_))));
    }

    #[tokio::test]
    async fn test_defaults_and_synthesized_key() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.expect("acquire failed");

        let subject = resolve_subject(&mut conn, &identity(None, Some("Marie "), Some(" Curie")))
            .await
            .expect("resolve failed");
        assert_eq!(subject.given_name, "Marie");
        assert_eq!(subject.family_name, "Curie");
        assert_eq!(subject.category, "unspecified");
        assert_eq!(subject.role_label, "unspecified");
        assert!(subject.contact_key.starts_with("marie.curie."));
        assert!(subject.contact_key.ends_with("@import.local"));
    }

    #[tokio::test]
    async fn test_period_record_reuse() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.expect("acquire failed");

        let subject = resolve_subject(
            &mut conn,
            &identity(Some("a@b.c"), Some("A"), Some("B")),
        )
        .await
        .expect("resolve failed");

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date");

        let (first, created) = resolve_period_record(&mut conn, &subject, start, end)
            .await
            .expect("resolve failed");
        assert!(created);

        let (second, created) = resolve_period_record(&mut conn, &subject, start, end)
            .await
            .expect("resolve failed");
        assert!(!created);
        assert_eq!(first.id, second.id);
    }
}
