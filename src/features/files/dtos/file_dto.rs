use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::ValidationError;
use crate::features::files::models::{
    extension_of, FileType, FileWithTags, MediaFile, Tag, TagUsage, UrlStatus,
};
use crate::shared::constants::{
    DEFAULT_PAGE_SIZE, FALLBACK_EXTENSION, MAX_PAGE, MAX_PAGE_SIZE, MAX_TAG_LENGTH,
};
use crate::shared::types::PaginationMeta;
use crate::shared::validation::parse_date;

// =============================================================================
// REQUESTS
// =============================================================================

/// Request DTO for a single upload slot
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UploadRequestDto {
    /// Original file name as seen by the client
    #[validate(length(min = 1, max = 255, message = "file_name must be 1-255 characters"))]
    #[schema(example = "photo.jpg")]
    pub file_name: String,
    /// Declared MIME type, checked against the allow-list for `file_type`
    #[validate(length(min = 1, max = 127, message = "content_type is required"))]
    #[schema(example = "image/jpeg")]
    pub content_type: String,
    pub file_type: FileType,
    /// Declared size in bytes
    #[validate(range(min = 0, message = "file_size_bytes must not be negative"))]
    #[schema(example = 2097152)]
    pub file_size_bytes: i64,
    #[serde(default)]
    #[validate(
        length(max = 20, message = "at most 20 tags per file"),
        custom(function = "validate_tag_list")
    )]
    pub tags: Vec<String>,
    /// Duration in seconds, videos only
    #[validate(range(min = 0, message = "duration must not be negative"))]
    pub duration: Option<i32>,
}

/// Request DTO for a batch of upload slots
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BatchUploadRequestDto {
    pub files: Vec<UploadRequestDto>,
}

/// Request DTO for replacing a file's tag set
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateTagsDto {
    #[validate(
        length(max = 20, message = "at most 20 tags per file"),
        custom(function = "validate_tag_list")
    )]
    pub tags: Vec<String>,
}

fn validate_tag_list(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags.iter().any(|t| t.trim().chars().count() > MAX_TAG_LENGTH) {
        let mut err = validator::ValidationError::new("tag_too_long");
        err.message = Some(format!("tags must be at most {} characters", MAX_TAG_LENGTH).into());
        return Err(err);
    }
    Ok(())
}

/// Sort keys for the file listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileSort {
    #[default]
    Latest,
    Oldest,
    Name,
    Size,
}

impl FileSort {
    /// ORDER BY fragment over the `f` alias
    pub fn as_sql(&self) -> &'static str {
        match self {
            FileSort::Latest => "f.created_at DESC",
            FileSort::Oldest => "f.created_at ASC",
            FileSort::Name => "f.file_name ASC",
            FileSort::Size => "f.file_size DESC",
        }
    }
}

/// Query params for listing files
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileListQuery {
    pub file_type: Option<FileType>,
    /// Case-insensitive match on file name or any tag name
    pub keyword: Option<String>,
    /// Comma-separated tag names; the file must carry all of them
    pub tags: Option<String>,
    pub sort: Option<FileSort>,
    /// Inclusive first day, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Inclusive last day, `YYYY-MM-DD`
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Parsed and bounded listing filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub file_type: Option<FileType>,
    pub keyword: Option<String>,
    pub tags: Vec<String>,
    pub sort: FileSort,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: i64,
    pub page_size: i64,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            file_type: None,
            keyword: None,
            tags: Vec::new(),
            sort: FileSort::default(),
            start_date: None,
            end_date: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TryFrom<FileListQuery> for FileFilter {
    type Error = ValidationError;

    fn try_from(q: FileListQuery) -> Result<Self, Self::Error> {
        let page = q.page.unwrap_or(1);
        if !(1..=MAX_PAGE).contains(&page) {
            return Err(ValidationError::InvalidRequest(format!(
                "page must be between 1 and {}",
                MAX_PAGE
            )));
        }
        let page_size = q.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ValidationError::InvalidRequest(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let start_date = q.start_date.as_deref().map(parse_date).transpose()?;
        let end_date = q.end_date.as_deref().map(parse_date).transpose()?;

        let tags = q
            .tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            file_type: q.file_type,
            keyword: q
                .keyword
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            tags,
            sort: q.sort.unwrap_or_default(),
            start_date,
            end_date,
            page,
            page_size,
        })
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Response DTO for an issued upload slot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponseDto {
    pub file_id: Uuid,
    /// Presigned PUT URL for the primary object
    pub upload_url: String,
    pub storage_key: String,
    /// Presigned PUT URL for the thumbnail; empty when issuance failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,
    pub expires_in_seconds: u32,
}

/// Response DTO for a batch of upload slots
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchUploadResponseDto {
    /// Successful items, in request order
    pub results: Vec<UploadResponseDto>,
    pub total_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
}

/// Response DTO for a download link
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadResponseDto {
    pub download_url: String,
    pub file_name: String,
    pub expires_in_seconds: u32,
}

/// Tag reference embedded in file responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileTagDto {
    pub id: Uuid,
    pub name: String,
}

impl From<Tag> for FileTagDto {
    fn from(t: Tag) -> Self {
        Self {
            id: t.id,
            name: t.name,
        }
    }
}

/// Response DTO for file metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileResponseDto {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: FileType,
    pub content_type: String,
    pub file_size: i64,
    pub duration: Option<i32>,
    pub has_thumbnail: bool,
    pub url_status: UrlStatus,
    pub tags: Vec<FileTagDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileResponseDto {
    pub fn from_parts(file: MediaFile, tags: Vec<Tag>) -> Self {
        Self {
            id: file.id,
            has_thumbnail: file.thumbnail_key.is_some(),
            file_name: file.file_name,
            file_type: file.file_type,
            content_type: file.content_type,
            file_size: file.file_size,
            duration: file.duration,
            url_status: file.url_status,
            tags: tags.into_iter().map(FileTagDto::from).collect(),
            created_at: file.created_at,
            updated_at: file.updated_at,
        }
    }
}

impl From<FileWithTags> for FileResponseDto {
    fn from(f: FileWithTags) -> Self {
        Self::from_parts(f.file, f.tags)
    }
}

/// Response DTO for a page of files
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileListResponseDto {
    pub files: Vec<FileResponseDto>,
    pub pagination: PaginationMeta,
}

/// Response DTO for a tag with its usage count
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagResponseDto {
    pub id: Uuid,
    pub name: String,
    pub file_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<TagUsage> for TagResponseDto {
    fn from(t: TagUsage) -> Self {
        Self {
            id: t.id,
            name: t.name,
            file_count: t.file_count,
            created_at: t.created_at,
        }
    }
}

/// Response DTO for delete operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteFileResponseDto {
    /// Confirmation that the file was deleted
    pub deleted: bool,
}

// =============================================================================
// CONTENT RULES
// =============================================================================

/// Allowed MIME types for image uploads
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/heic",
    "image/heif",
    "image/bmp",
];

/// Allowed MIME types for video uploads
pub const ALLOWED_VIDEO_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/webm",
    "video/x-msvideo",
    "video/x-matroska",
    "video/mpeg",
    "video/3gpp",
];

/// Extensions kept as-is in storage keys
const KNOWN_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "bmp", "mp4", "mov", "webm", "avi",
    "mkv", "mpeg", "mpg", "3gp",
];

/// Check if a MIME type is allowed for the declared media kind
/// Canonical form of a declared MIME type, as stored and signed
pub fn normalize_content_type(content_type: &str) -> String {
    content_type.trim().to_ascii_lowercase()
}

pub fn is_content_type_allowed(file_type: FileType, content_type: &str) -> bool {
    let normalized = normalize_content_type(content_type);
    match file_type {
        FileType::Image => ALLOWED_IMAGE_TYPES.contains(&normalized.as_str()),
        FileType::Video => ALLOWED_VIDEO_TYPES.contains(&normalized.as_str()),
    }
}

/// Storage extension for a declared file name; unknown or missing falls back to `bin`
pub fn storage_extension(file_name: &str) -> String {
    extension_of(file_name)
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::MAX_TAGS_PER_FILE;

    fn upload(tags: Vec<String>) -> UploadRequestDto {
        UploadRequestDto {
            file_name: "photo.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            file_type: FileType::Image,
            file_size_bytes: 1024,
            tags,
            duration: None,
        }
    }

    #[test]
    fn test_content_type_allow_list_is_per_kind() {
        assert!(is_content_type_allowed(FileType::Image, "image/jpeg"));
        assert!(is_content_type_allowed(FileType::Image, "IMAGE/PNG"));
        assert!(!is_content_type_allowed(FileType::Image, "video/mp4"));
        assert!(is_content_type_allowed(FileType::Video, "video/mp4"));
        assert!(!is_content_type_allowed(FileType::Video, "application/pdf"));
    }

    #[test]
    fn test_storage_extension_falls_back_to_bin() {
        assert_eq!(storage_extension("photo.JPG"), "jpg");
        assert_eq!(storage_extension("clip.mov"), "mov");
        assert_eq!(storage_extension("README"), "bin");
        assert_eq!(storage_extension("notes.exe"), "bin");
    }

    #[test]
    fn test_upload_dto_tag_limits() {
        assert!(upload(vec!["holiday".to_string()]).validate().is_ok());
        assert!(upload(vec!["x".repeat(MAX_TAG_LENGTH + 1)]).validate().is_err());
        let many = (0..=MAX_TAGS_PER_FILE).map(|i| format!("t{}", i)).collect();
        assert!(upload(many).validate().is_err());
    }

    #[test]
    fn test_list_query_defaults() {
        let filter = FileFilter::try_from(FileListQuery::default()).unwrap();
        assert_eq!(filter, FileFilter::default());
    }

    #[test]
    fn test_list_query_parses_tags_and_dates() {
        let filter = FileFilter::try_from(FileListQuery {
            tags: Some("a, b,,c ".to_string()),
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-31".to_string()),
            sort: Some(FileSort::Size),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.tags, vec!["a", "b", "c"]);
        assert_eq!(filter.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filter.end_date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(filter.sort, FileSort::Size);
    }

    #[test]
    fn test_list_query_rejects_bad_bounds() {
        let too_big = FileListQuery {
            page_size: Some(MAX_PAGE_SIZE + 1),
            ..Default::default()
        };
        assert!(FileFilter::try_from(too_big).is_err());

        let zero_page = FileListQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(FileFilter::try_from(zero_page).is_err());

        let huge_page = FileListQuery {
            page: Some(1_000_000_000_000_000_000),
            page_size: Some(MAX_PAGE_SIZE),
            ..Default::default()
        };
        assert!(matches!(
            FileFilter::try_from(huge_page),
            Err(ValidationError::InvalidRequest(_))
        ));

        let bad_date = FileListQuery {
            start_date: Some("2024-02-30".to_string()),
            ..Default::default()
        };
        assert_eq!(
            FileFilter::try_from(bad_date),
            Err(ValidationError::InvalidDate("2024-02-30".to_string()))
        );
    }
}
