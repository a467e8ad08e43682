use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::features::files::models::{FileWithTags, UserId};

/// Database model for favorites; at most one row per (user_id, file_id)
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: UserId,
    pub file_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A favorite joined with its (live) file
#[derive(Debug, Clone)]
pub struct FavoriteFile {
    pub favorited_at: DateTime<Utc>,
    pub file: FileWithTags,
}
