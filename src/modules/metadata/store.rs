use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::favorites::dtos::FavoriteSort;
use crate::features::favorites::models::Favorite;
use crate::features::files::dtos::FileSort;
use crate::features::files::models::{
    CreateFile, FileType, FileWithTags, MediaFile, Tag, TagChanges, TagUsage, UrlStatus, UserId,
};
use crate::features::stats::models::{ActivityCounts, CreateActivity, DailyActivity, DailyTag};
use crate::shared::types::SortDirection;

/// Normalized listing query over a user's live files
#[derive(Debug, Clone)]
pub struct FileQuery {
    pub file_type: Option<FileType>,
    /// Case-insensitive substring of the file name or any tag name
    pub keyword: Option<String>,
    /// The file must carry every one of these tags
    pub tags: Vec<String>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_before: Option<DateTime<Utc>>,
    pub sort: FileSort,
    pub limit: i64,
    pub offset: i64,
}

/// Normalized listing query over a user's favorites
#[derive(Debug, Clone)]
pub struct FavoriteQuery {
    /// Case-insensitive substring of the file name
    pub query: Option<String>,
    /// Lowercase extension without the leading dot
    pub extension: Option<String>,
    /// Exact tag name the file must carry
    pub tag: Option<String>,
    pub sort: FavoriteSort,
    pub order: SortDirection,
    pub limit: i64,
    pub offset: i64,
}

/// Relational metadata backend.
///
/// Every method is a single committed step; `create_file_with_tags` and
/// `replace_file_tags` are each atomic on their own. Rows with a non-null
/// `deleted_at` are invisible to every read.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Resolve tags (find-or-create per user and name), then insert the file, its
    /// tag links, one `tag_add` row per tag and one `upload` row, all in one unit.
    /// `tag_names` must come from `normalize_tag_names`, so tags are locked in name order.
    async fn create_file_with_tags(&self, file: CreateFile) -> Result<FileWithTags>;

    async fn find_file(&self, file_id: Uuid) -> Result<Option<MediaFile>>;

    /// Tags for each of the given files, sorted by name
    async fn load_tags(&self, file_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>>;

    async fn set_url_status(&self, file_id: Uuid, status: UrlStatus) -> Result<()>;

    /// Returns false if the file was already gone
    async fn soft_delete_file(&self, file_id: Uuid) -> Result<bool>;

    /// Replace the file's tag set, logging `tag_add`/`tag_del` per changed name.
    /// `tag_names` must be normalized and sorted.
    async fn replace_file_tags(
        &self,
        user_id: UserId,
        file_id: Uuid,
        tag_names: &[String],
    ) -> Result<TagChanges>;

    async fn list_tags(&self, user_id: UserId) -> Result<Vec<TagUsage>>;

    /// Page of files plus the total count of the filtered set
    async fn list_files(&self, user_id: UserId, query: &FileQuery)
        -> Result<(Vec<MediaFile>, i64)>;

    async fn append_activity(&self, entry: CreateActivity) -> Result<()>;

    /// Find-or-create; an existing row is returned untouched
    async fn add_favorite(&self, user_id: UserId, file_id: Uuid) -> Result<Favorite>;

    /// No-op when the favorite does not exist
    async fn remove_favorite(&self, user_id: UserId, file_id: Uuid) -> Result<()>;

    /// Page of (favorited_at, file) pairs for live files, plus the total count
    async fn list_favorites(
        &self,
        user_id: UserId,
        query: &FavoriteQuery,
    ) -> Result<(Vec<(DateTime<Utc>, MediaFile)>, i64)>;

    /// Sum of declared sizes over live files
    async fn storage_used(&self, user_id: UserId) -> Result<i64>;

    /// Counters over activity rows with `from <= created_at < until`
    async fn activity_counts(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<ActivityCounts>;

    async fn daily_activity(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DailyActivity>>;

    /// Tag names per day from live files created in the window and from
    /// `tag_add` rows in the window; duplicates may appear
    async fn daily_tags(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DailyTag>>;
}
