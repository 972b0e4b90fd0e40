//! Subject persistence
//!
//! Subjects are the reconciled entities performance rows are attributed to.
//! Lookup by contact key is first-match-wins; there is no uniqueness
//! constraint in storage.

use serde::Serialize;
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, Row};
use uuid::Uuid;

/// Subject record
#[derive(Debug, Clone, Serialize)]
pub struct Subject {
    pub id: Uuid,
    pub given_name: String,
    pub family_name: String,
    pub contact_key: String,
    pub category: String,
    pub role_label: String,
    pub created_at: Option<String>,
}

impl Subject {
    /// Create a new subject with a fresh id
    pub fn new(
        given_name: String,
        family_name: String,
        contact_key: String,
        category: String,
        role_label: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            given_name,
            family_name,
            contact_key,
            category,
            role_label,
            created_at: None,
        }
    }
}

fn subject_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Subject, sqlx::Error> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(Subject {
        id,
        given_name: row.get("given_name"),
        family_name: row.get("family_name"),
        contact_key: row.get("contact_key"),
        category: row.get("category"),
        role_label: row.get("role_label"),
        created_at: row.get("created_at"),
    })
}

/// Insert a subject (flushes immediately so the id is durable)
pub async fn insert_subject<'e, E>(db: E, subject: &Subject) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO subjects (
            id, given_name, family_name, contact_key, category, role_label,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(subject.id.to_string())
    .bind(&subject.given_name)
    .bind(&subject.family_name)
    .bind(&subject.contact_key)
    .bind(&subject.category)
    .bind(&subject.role_label)
    .execute(db)
    .await?;

    Ok(())
}

/// Load a subject by id
pub async fn find_subject<'e, E>(db: E, id: Uuid) -> Result<Option<Subject>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, given_name, family_name, contact_key, category, role_label, created_at \
         FROM subjects WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;

    row.as_ref().map(subject_from_row).transpose()
}

/// Load the first subject with the given contact key (first-match-wins)
pub async fn find_by_contact_key<'e, E>(
    db: E,
    contact_key: &str,
) -> Result<Option<Subject>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, given_name, family_name, contact_key, category, role_label, created_at \
         FROM subjects WHERE contact_key = ? ORDER BY created_at LIMIT 1",
    )
    .bind(contact_key)
    .fetch_optional(db)
    .await?;

    row.as_ref().map(subject_from_row).transpose()
}

/// Load all subjects
///
/// Used by the reconciler's name-based linear scan. O(subjects) per
/// unmatched row is a known scaling limit, kept deliberately so the
/// first-case-insensitive-match semantics stay explicit.
pub async fn list_subjects<'e, E>(db: E) -> Result<Vec<Subject>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, given_name, family_name, contact_key, category, role_label, created_at \
         FROM subjects ORDER BY created_at",
    )
    .fetch_all(db)
    .await?;

    rows.iter().map(subject_from_row).collect()
}

/// Check whether a subject exists
pub async fn subject_exists<'e, E>(db: E, id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT 1 FROM subjects WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    Ok(row.is_some())
}

/// Update a subject's identity attributes
pub async fn update_subject<'e, E>(db: E, subject: &Subject) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE subjects SET
            given_name = ?, family_name = ?, contact_key = ?,
            category = ?, role_label = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&subject.given_name)
    .bind(&subject.family_name)
    .bind(&subject.contact_key)
    .bind(&subject.category)
    .bind(&subject.role_label)
    .bind(subject.id.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Delete a subject by id; dependent records and observations cascade
pub async fn delete_subject<'e, E>(db: E, id: Uuid) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM subjects WHERE id = ?")
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(())
}

/// Count all subjects
pub async fn count_subjects<'e, E>(db: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT COUNT(*) AS n FROM subjects")
        .fetch_one(db)
        .await?;
    Ok(row.get("n"))
}
