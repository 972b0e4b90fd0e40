//! Column resolution
//!
//! Maps arbitrary, locale-varying column headers to canonical field roles.
//! Identity fields resolve by ordered alias lists with exact case-insensitive
//! matching; metric columns resolve by lower-cased substring matching over a
//! fixed priority table, so the chosen type is reproducible when a header
//! happens to match aliases of more than one type. English and French aliases
//! are both first-class.

use crate::ingest::parser::Row;
use crate::models::MetricType;

/// Ordered alias lists for identity fields (exact case-insensitive match)
const CONTACT_KEY_ALIASES: &[&str] = &["email", "e-mail", "courriel", "mail"];
const GIVEN_NAME_ALIASES: &[&str] =
    &["firstname", "first_name", "first name", "prénom", "prenom"];
const FAMILY_NAME_ALIASES: &[&str] = &["lastname", "last_name", "last name", "nom"];
const CATEGORY_ALIASES: &[&str] = &["department", "département", "departement", "dept"];
const ROLE_ALIASES: &[&str] = &["position", "poste", "job", "role", "rôle"];

/// Metric-type aliases, in declared priority order (substring match).
///
/// A header matching aliases of two types resolves to the first entry here,
/// deterministically.
const METRIC_ALIASES: &[(MetricType, &[&str])] = &[
    (
        MetricType::Attendance,
        &["attendance", "assiduité", "assiduite", "présence", "presence"],
    ),
    (MetricType::Velocity, &["velocity", "vélocité", "velocite"]),
    (MetricType::Quality, &["quality", "qualité", "qualite"]),
    (
        MetricType::Productivity,
        &["productivity", "productivité", "productivite"],
    ),
    (
        MetricType::Efficiency,
        &["efficiency", "efficacité", "efficacite"],
    ),
];

/// Substrings that mark a column as the row's target-value column
const TARGET_MARKERS: &[&str] = &["target", "objectif", "goal"];

/// Identity field values extracted from one row
#[derive(Debug, Clone, Default)]
pub struct IdentityFields {
    pub contact_key: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub category: Option<String>,
    pub role_label: Option<String>,
}

/// Resolution of one row's columns into field roles
#[derive(Debug, Clone)]
pub struct ResolvedRow {
    pub identity: IdentityFields,
    /// (header, assigned type, raw cell value) per metric column
    pub metrics: Vec<(String, MetricType, String)>,
    /// Raw value of the row's target column, if one was found
    pub target_raw: Option<String>,
}

/// Resolve a row's headers into identity fields, metric columns, and the
/// target column.
///
/// Claim order: identity fields first, then the target column, then metric
/// columns. A column claimed by an earlier role is never reconsidered for a
/// later one, so "Objectif Qualité" supplies the quality target instead of
/// producing a spurious quality observation.
pub fn resolve_row(row: &Row) -> ResolvedRow {
    let identity = IdentityFields {
        contact_key: lookup_alias(row, CONTACT_KEY_ALIASES),
        given_name: lookup_alias(row, GIVEN_NAME_ALIASES),
        family_name: lookup_alias(row, FAMILY_NAME_ALIASES),
        category: lookup_alias(row, CATEGORY_ALIASES),
        role_label: lookup_alias(row, ROLE_ALIASES),
    };

    let identity_headers: Vec<String> = row
        .cells()
        .filter(|(h, _)| is_identity_header(h))
        .map(|(h, _)| h.to_lowercase())
        .collect();

    let mut target_raw = None;
    let mut metrics = Vec::new();

    // Target column: first header containing a target marker supplies the
    // target for every metric column in this row
    for (header, value) in row.cells() {
        let lower = header.to_lowercase();
        if identity_headers.contains(&lower) {
            continue;
        }
        if is_target_header(&lower) {
            target_raw = Some(value.to_string());
            break;
        }
    }

    for (header, value) in row.cells() {
        let lower = header.to_lowercase();
        // Target-role columns never double as metric columns, claimed or not
        if identity_headers.contains(&lower) || is_target_header(&lower) {
            continue;
        }
        if let Some(ty) = match_metric_type(&lower) {
            metrics.push((header.to_string(), ty, value.to_string()));
        }
    }

    ResolvedRow {
        identity,
        metrics,
        target_raw,
    }
}

/// First alias present in the row wins (values trimmed, empty treated as absent)
fn lookup_alias(row: &Row, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        if let Some(value) = row.get_ci(alias) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn is_target_header(lower_header: &str) -> bool {
    TARGET_MARKERS.iter().any(|m| lower_header.contains(m))
}

fn is_identity_header(header: &str) -> bool {
    let lower = header.to_lowercase();
    CONTACT_KEY_ALIASES
        .iter()
        .chain(GIVEN_NAME_ALIASES)
        .chain(FAMILY_NAME_ALIASES)
        .chain(CATEGORY_ALIASES)
        .chain(ROLE_ALIASES)
        .any(|alias| lower == *alias)
}

/// Assign a metric type by substring match, in priority-table order
fn match_metric_type(lower_header: &str) -> Option<MetricType> {
    for (ty, aliases) in METRIC_ALIASES {
        if aliases.iter().any(|alias| lower_header.contains(alias)) {
            return Some(*ty);
        }
    }
    None
}
