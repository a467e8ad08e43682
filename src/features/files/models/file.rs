use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::files::models::Tag;

/// Owning user identifier, already resolved by the identity layer
pub type UserId = i64;

/// Media kind matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "media_file_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Image => write!(f, "image"),
            FileType::Video => write!(f, "video"),
        }
    }
}

/// Whether a usable upload destination has been handed out for the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "upload_url_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    /// Metadata committed but URL issuance failed; retry via the upload-url endpoint
    PendingUrl,
    Issued,
}

/// Database model for files
#[derive(Debug, Clone, FromRow)]
pub struct MediaFile {
    pub id: Uuid,
    pub user_id: UserId,
    pub file_name: String,
    pub storage_key: String,
    pub thumbnail_key: Option<String>,
    pub file_type: FileType,
    pub content_type: String,
    pub file_size: i64,
    pub duration: Option<i32>,
    pub url_status: UrlStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MediaFile {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

/// A file together with its eager-loaded tags
#[derive(Debug, Clone)]
pub struct FileWithTags {
    pub file: MediaFile,
    pub tags: Vec<Tag>,
}

/// Data for creating a new file row. Tag resolution and activity rows are
/// written in the same unit.
#[derive(Debug, Clone)]
pub struct CreateFile {
    pub id: Uuid,
    pub user_id: UserId,
    pub file_name: String,
    pub storage_key: String,
    pub thumbnail_key: Option<String>,
    pub file_type: FileType,
    pub content_type: String,
    pub file_size: i64,
    pub duration: Option<i32>,
    pub tag_names: Vec<String>,
}

pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of(".hidden"), None);
        assert_eq!(extension_of("trailing."), None);
    }
}
