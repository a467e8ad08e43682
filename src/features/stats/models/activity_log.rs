use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::features::files::models::UserId;

/// Activity kind matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "activity_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Upload,
    Download,
    TagAdd,
    TagDel,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityKind::Upload => write!(f, "upload"),
            ActivityKind::Download => write!(f, "download"),
            ActivityKind::TagAdd => write!(f, "tag_add"),
            ActivityKind::TagDel => write!(f, "tag_del"),
        }
    }
}

/// Append-only activity row; only ever read back for statistics
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: UserId,
    pub file_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub tag_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data for appending an activity row
#[derive(Debug, Clone)]
pub struct CreateActivity {
    pub user_id: UserId,
    pub file_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub tag_name: Option<String>,
}

impl CreateActivity {
    pub fn download(user_id: UserId, file_id: Uuid) -> Self {
        Self {
            user_id,
            file_id: Some(file_id),
            kind: ActivityKind::Download,
            tag_name: None,
        }
    }
}

/// Activity counters over a time window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct ActivityCounts {
    pub uploads: i64,
    pub downloads: i64,
    pub distinct_tags: i64,
}

/// Upload/download counters for one UTC day
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DailyActivity {
    pub day: NaiveDate,
    pub uploads: i64,
    pub downloads: i64,
}

/// A tag name seen on a given UTC day, from file creation or a tag_add entry
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DailyTag {
    pub day: NaiveDate,
    pub name: String,
}
