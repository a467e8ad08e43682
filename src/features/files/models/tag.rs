use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::features::files::models::UserId;

/// Database model for user-scoped tags
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Tag with the number of live files carrying it
#[derive(Debug, Clone, FromRow)]
pub struct TagUsage {
    pub id: Uuid,
    pub name: String,
    pub file_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Names added and removed by a tag replacement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Trim, drop empties and de-duplicate tag names.
///
/// The result is sorted so that concurrent transactions upsert (and lock)
/// tag rows in the same order.
pub fn normalize_tag_names(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
