//! In-memory metadata store.
//!
//! Stores all metadata in memory with no persistence. Useful for testing and
//! ephemeral deployments. A single `RwLock` guards every table, so each trait
//! method is atomic the same way a transaction is on Postgres.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{FavoriteQuery, FileQuery, MetadataStore};
use crate::core::error::{AppError, Result};
use crate::features::favorites::dtos::FavoriteSort;
use crate::features::favorites::models::Favorite;
use crate::features::files::dtos::FileSort;
use crate::features::files::models::{
    CreateFile, FileWithTags, MediaFile, Tag, TagChanges, TagUsage, UrlStatus, UserId,
};
use crate::features::stats::models::{
    ActivityCounts, ActivityKind, ActivityLog, CreateActivity, DailyActivity, DailyTag,
};
use crate::shared::types::SortDirection;

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<Uuid, MediaFile>,
    tags: HashMap<Uuid, Tag>,
    /// file id -> linked tag ids
    file_tags: HashMap<Uuid, Vec<Uuid>>,
    favorites: HashMap<(UserId, Uuid), Favorite>,
    activity: Vec<ActivityLog>,
}

impl Inner {
    fn live_file(&self, file_id: Uuid) -> Option<&MediaFile> {
        self.files.get(&file_id).filter(|f| f.deleted_at.is_none())
    }

    fn tags_of(&self, file_id: Uuid) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .file_tags
            .get(&file_id)
            .map(|ids| ids.iter().filter_map(|id| self.tags.get(id)).cloned().collect())
            .unwrap_or_default();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    fn has_tag(&self, file_id: Uuid, name: &str) -> bool {
        self.tags_of(file_id).iter().any(|t| t.name == name)
    }

    fn upsert_tag(&mut self, user_id: UserId, name: &str, now: DateTime<Utc>) -> Tag {
        if let Some(existing) = self
            .tags
            .values()
            .find(|t| t.user_id == user_id && t.name == name)
        {
            return existing.clone();
        }

        let tag = Tag {
            id: Uuid::now_v7(),
            user_id,
            name: name.to_string(),
            created_at: now,
        };
        self.tags.insert(tag.id, tag.clone());
        tag
    }

    fn push_activity(&mut self, entry: CreateActivity, now: DateTime<Utc>) {
        self.activity.push(ActivityLog {
            id: Uuid::now_v7(),
            user_id: entry.user_id,
            file_id: entry.file_id,
            kind: entry.kind,
            tag_name: entry.tag_name,
            created_at: now,
        });
    }

    fn activity_in<'a>(
        &'a self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a ActivityLog> + 'a {
        self.activity
            .iter()
            .filter(move |a| a.user_id == user_id && a.created_at >= from && a.created_at < until)
    }

    fn matches_file_query(&self, file: &MediaFile, user_id: UserId, query: &FileQuery) -> bool {
        if file.user_id != user_id || file.deleted_at.is_some() {
            return false;
        }
        if query.file_type.is_some_and(|t| t != file.file_type) {
            return false;
        }
        if let Some(ref keyword) = query.keyword {
            let needle = keyword.to_lowercase();
            let in_name = file.file_name.to_lowercase().contains(&needle);
            let in_tags = self
                .tags_of(file.id)
                .iter()
                .any(|t| t.name.to_lowercase().contains(&needle));
            if !in_name && !in_tags {
                return false;
            }
        }
        if !query.tags.iter().all(|name| self.has_tag(file.id, name)) {
            return false;
        }
        if query.created_from.is_some_and(|from| file.created_at < from) {
            return false;
        }
        if query
            .created_before
            .is_some_and(|before| file.created_at >= before)
        {
            return false;
        }
        true
    }

    fn matches_favorite_query(&self, file: &MediaFile, user_id: UserId, query: &FavoriteQuery) -> bool {
        if file.user_id != user_id || file.deleted_at.is_some() {
            return false;
        }
        if let Some(ref q) = query.query {
            if !file.file_name.to_lowercase().contains(&q.to_lowercase()) {
                return false;
            }
        }
        if let Some(ref ext) = query.extension {
            if !file
                .file_name
                .to_lowercase()
                .ends_with(&format!(".{}", ext))
            {
                return false;
            }
        }
        if let Some(ref tag) = query.tag {
            if !self.has_tag(file.id, tag) {
                return false;
            }
        }
        true
    }
}

fn compare_files(sort: FileSort, a: &MediaFile, b: &MediaFile) -> Ordering {
    match sort {
        FileSort::Latest => b.created_at.cmp(&a.created_at),
        FileSort::Oldest => a.created_at.cmp(&b.created_at),
        FileSort::Name => a.file_name.cmp(&b.file_name),
        FileSort::Size => b.file_size.cmp(&a.file_size),
    }
}

fn paginate<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

pub struct MemoryMetadataStore {
    inner: RwLock<Inner>,
    frozen_now: Mutex<Option<DateTime<Utc>>>,
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            frozen_now: Mutex::new(None),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.frozen_now
            .lock()
            .ok()
            .and_then(|guard| *guard)
            .unwrap_or_else(Utc::now)
    }

    /// Pin the timestamp given to subsequent writes (`None` restores wall time)
    #[cfg(test)]
    pub fn freeze_clock(&self, at: Option<DateTime<Utc>>) {
        if let Ok(mut guard) = self.frozen_now.lock() {
            *guard = at;
        }
    }

    /// Raw activity rows, oldest first
    #[cfg(test)]
    pub async fn activity_rows(&self, user_id: UserId) -> Vec<ActivityLog> {
        let inner = self.inner.read().await;
        inner
            .activity
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Tag rows owned by a user, including ones no file carries any more
    #[cfg(test)]
    pub async fn tag_rows(&self, user_id: UserId) -> Vec<Tag> {
        let inner = self.inner.read().await;
        inner
            .tags
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Lookup that ignores soft deletion
    #[cfg(test)]
    pub async fn raw_file(&self, file_id: Uuid) -> Option<MediaFile> {
        self.inner.read().await.files.get(&file_id).cloned()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create_file_with_tags(&self, file: CreateFile) -> Result<FileWithTags> {
        let now = self.now();
        let mut inner = self.inner.write().await;

        if inner
            .files
            .values()
            .any(|f| f.storage_key == file.storage_key)
        {
            return Err(AppError::Conflict("Storage key already in use".to_string()));
        }

        let mut tags = Vec::with_capacity(file.tag_names.len());
        for name in &file.tag_names {
            let tag = inner.upsert_tag(file.user_id, name, now);
            inner.push_activity(
                CreateActivity {
                    user_id: file.user_id,
                    file_id: Some(file.id),
                    kind: ActivityKind::TagAdd,
                    tag_name: Some(tag.name.clone()),
                },
                now,
            );
            tags.push(tag);
        }

        let created = MediaFile {
            id: file.id,
            user_id: file.user_id,
            file_name: file.file_name,
            storage_key: file.storage_key,
            thumbnail_key: file.thumbnail_key,
            file_type: file.file_type,
            content_type: file.content_type,
            file_size: file.file_size,
            duration: file.duration,
            url_status: UrlStatus::Issued,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        inner.files.insert(created.id, created.clone());
        inner
            .file_tags
            .insert(created.id, tags.iter().map(|t| t.id).collect());
        inner.push_activity(
            CreateActivity {
                user_id: created.user_id,
                file_id: Some(created.id),
                kind: ActivityKind::Upload,
                tag_name: None,
            },
            now,
        );

        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(FileWithTags {
            file: created,
            tags,
        })
    }

    async fn find_file(&self, file_id: Uuid) -> Result<Option<MediaFile>> {
        let inner = self.inner.read().await;
        Ok(inner.live_file(file_id).cloned())
    }

    async fn load_tags(&self, file_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>> {
        let inner = self.inner.read().await;
        Ok(file_ids
            .iter()
            .map(|id| (*id, inner.tags_of(*id)))
            .filter(|(_, tags)| !tags.is_empty())
            .collect())
    }

    async fn set_url_status(&self, file_id: Uuid, status: UrlStatus) -> Result<()> {
        let now = self.now();
        let mut inner = self.inner.write().await;
        if let Some(file) = inner.files.get_mut(&file_id) {
            file.url_status = status;
            file.updated_at = now;
        }
        Ok(())
    }

    async fn soft_delete_file(&self, file_id: Uuid) -> Result<bool> {
        let now = self.now();
        let mut inner = self.inner.write().await;
        match inner.files.get_mut(&file_id) {
            Some(file) if file.deleted_at.is_none() => {
                file.deleted_at = Some(now);
                file.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace_file_tags(
        &self,
        user_id: UserId,
        file_id: Uuid,
        tag_names: &[String],
    ) -> Result<TagChanges> {
        let now = self.now();
        let mut inner = self.inner.write().await;

        let current = inner.tags_of(file_id);
        let mut changes = TagChanges::default();
        let mut linked: Vec<Uuid> = Vec::with_capacity(tag_names.len());

        for tag in &current {
            if tag_names.iter().any(|n| n == &tag.name) {
                linked.push(tag.id);
                continue;
            }
            inner.push_activity(
                CreateActivity {
                    user_id,
                    file_id: Some(file_id),
                    kind: ActivityKind::TagDel,
                    tag_name: Some(tag.name.clone()),
                },
                now,
            );
            changes.removed.push(tag.name.clone());
        }

        for name in tag_names {
            if current.iter().any(|t| &t.name == name) {
                continue;
            }
            let tag = inner.upsert_tag(user_id, name, now);
            inner.push_activity(
                CreateActivity {
                    user_id,
                    file_id: Some(file_id),
                    kind: ActivityKind::TagAdd,
                    tag_name: Some(tag.name.clone()),
                },
                now,
            );
            linked.push(tag.id);
            changes.added.push(tag.name);
        }

        inner.file_tags.insert(file_id, linked);
        if let Some(file) = inner.files.get_mut(&file_id) {
            file.updated_at = now;
        }

        Ok(changes)
    }

    async fn list_tags(&self, user_id: UserId) -> Result<Vec<TagUsage>> {
        let inner = self.inner.read().await;

        let mut usage: Vec<TagUsage> = inner
            .tags
            .values()
            .filter(|t| t.user_id == user_id)
            .map(|t| {
                let file_count = inner
                    .file_tags
                    .iter()
                    .filter(|(file_id, tag_ids)| {
                        tag_ids.contains(&t.id) && inner.live_file(**file_id).is_some()
                    })
                    .count() as i64;
                TagUsage {
                    id: t.id,
                    name: t.name.clone(),
                    file_count,
                    created_at: t.created_at,
                }
            })
            .collect();

        usage.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(usage)
    }

    async fn list_files(
        &self,
        user_id: UserId,
        query: &FileQuery,
    ) -> Result<(Vec<MediaFile>, i64)> {
        let inner = self.inner.read().await;

        let mut files: Vec<MediaFile> = inner
            .files
            .values()
            .filter(|f| inner.matches_file_query(f, user_id, query))
            .cloned()
            .collect();
        let total = files.len() as i64;

        files.sort_by(|a, b| compare_files(query.sort, a, b));
        Ok((paginate(files, query.limit, query.offset), total))
    }

    async fn append_activity(&self, entry: CreateActivity) -> Result<()> {
        let now = self.now();
        self.inner.write().await.push_activity(entry, now);
        Ok(())
    }

    async fn add_favorite(&self, user_id: UserId, file_id: Uuid) -> Result<Favorite> {
        let now = self.now();
        let mut inner = self.inner.write().await;
        let favorite = inner
            .favorites
            .entry((user_id, file_id))
            .or_insert_with(|| Favorite {
                id: Uuid::now_v7(),
                user_id,
                file_id,
                created_at: now,
            });
        Ok(favorite.clone())
    }

    async fn remove_favorite(&self, user_id: UserId, file_id: Uuid) -> Result<()> {
        self.inner.write().await.favorites.remove(&(user_id, file_id));
        Ok(())
    }

    async fn list_favorites(
        &self,
        user_id: UserId,
        query: &FavoriteQuery,
    ) -> Result<(Vec<(DateTime<Utc>, MediaFile)>, i64)> {
        let inner = self.inner.read().await;

        let mut rows: Vec<(DateTime<Utc>, MediaFile)> = inner
            .favorites
            .values()
            .filter(|fav| fav.user_id == user_id)
            .filter_map(|fav| {
                inner
                    .files
                    .get(&fav.file_id)
                    .filter(|f| inner.matches_favorite_query(f, user_id, query))
                    .map(|f| (fav.created_at, f.clone()))
            })
            .collect();
        let total = rows.len() as i64;

        rows.sort_by(|(a_at, a), (b_at, b)| {
            let ordering = match query.sort {
                FavoriteSort::FavoritedAt => a_at.cmp(b_at),
                FavoriteSort::FileName => a.file_name.cmp(&b.file_name),
                FavoriteSort::UploadDate => a.created_at.cmp(&b.created_at),
            };
            match query.order {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        Ok((paginate(rows, query.limit, query.offset), total))
    }

    async fn storage_used(&self, user_id: UserId) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .files
            .values()
            .filter(|f| f.user_id == user_id && f.deleted_at.is_none())
            .map(|f| f.file_size)
            .sum())
    }

    async fn activity_counts(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<ActivityCounts> {
        let inner = self.inner.read().await;

        let mut counts = ActivityCounts::default();
        let mut tag_names = HashSet::new();
        for entry in inner.activity_in(user_id, from, until) {
            match entry.kind {
                ActivityKind::Upload => counts.uploads += 1,
                ActivityKind::Download => counts.downloads += 1,
                ActivityKind::TagAdd => {
                    if let Some(ref name) = entry.tag_name {
                        tag_names.insert(name.clone());
                    }
                }
                ActivityKind::TagDel => {}
            }
        }
        counts.distinct_tags = tag_names.len() as i64;
        Ok(counts)
    }

    async fn daily_activity(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DailyActivity>> {
        let inner = self.inner.read().await;

        let mut by_day: HashMap<chrono::NaiveDate, DailyActivity> = HashMap::new();
        for entry in inner.activity_in(user_id, from, until) {
            let day = entry.created_at.date_naive();
            let row = by_day.entry(day).or_insert_with(|| DailyActivity {
                day,
                uploads: 0,
                downloads: 0,
            });
            match entry.kind {
                ActivityKind::Upload => row.uploads += 1,
                ActivityKind::Download => row.downloads += 1,
                _ => {}
            }
        }

        let mut rows: Vec<DailyActivity> = by_day.into_values().collect();
        rows.sort_by_key(|r| r.day);
        Ok(rows)
    }

    async fn daily_tags(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DailyTag>> {
        let inner = self.inner.read().await;

        let mut rows: Vec<DailyTag> = inner
            .files
            .values()
            .filter(|f| f.user_id == user_id && f.deleted_at.is_none())
            .filter(|f| f.created_at >= from && f.created_at < until)
            .flat_map(|f| {
                let day = f.created_at.date_naive();
                inner
                    .tags_of(f.id)
                    .into_iter()
                    .map(move |t| DailyTag { day, name: t.name })
            })
            .collect();

        rows.extend(
            inner
                .activity_in(user_id, from, until)
                .filter(|a| a.kind == ActivityKind::TagAdd)
                .filter_map(|a| {
                    a.tag_name.clone().map(|name| DailyTag {
                        day: a.created_at.date_naive(),
                        name,
                    })
                }),
        );

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_file(user_id: UserId, name: &str, tags: &[&str]) -> CreateFile {
        let id = Uuid::new_v4();
        CreateFile {
            id,
            user_id,
            file_name: name.to_string(),
            storage_key: format!("uploads/{}/{}.jpg", user_id, id),
            thumbnail_key: None,
            file_type: crate::features::files::models::FileType::Image,
            content_type: "image/jpeg".to_string(),
            file_size: 1024,
            duration: None,
            tag_names: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_storage_key_is_conflict() {
        let store = MemoryMetadataStore::new();
        let file = new_file(1, "a.jpg", &[]);
        let mut clash = new_file(1, "b.jpg", &[]);
        clash.storage_key = file.storage_key.clone();

        store.create_file_with_tags(file).await.unwrap();
        let result = store.create_file_with_tags(clash).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_storage_key_stays_taken_after_soft_delete() {
        let store = MemoryMetadataStore::new();
        let file = new_file(1, "a.jpg", &[]);
        let mut reuse = new_file(1, "b.jpg", &[]);
        reuse.storage_key = file.storage_key.clone();

        let created = store.create_file_with_tags(file).await.unwrap();
        assert!(store.soft_delete_file(created.file.id).await.unwrap());

        assert!(store.create_file_with_tags(reuse).await.is_err());
    }

    #[tokio::test]
    async fn test_tags_are_scoped_per_user() {
        let store = MemoryMetadataStore::new();
        store
            .create_file_with_tags(new_file(1, "a.jpg", &["trip"]))
            .await
            .unwrap();
        store
            .create_file_with_tags(new_file(2, "b.jpg", &["trip"]))
            .await
            .unwrap();

        assert_eq!(store.tag_rows(1).await.len(), 1);
        assert_eq!(store.tag_rows(2).await.len(), 1);
        assert_ne!(store.tag_rows(1).await[0].id, store.tag_rows(2).await[0].id);
    }

    #[tokio::test]
    async fn test_replace_file_tags_reports_changes() {
        let store = MemoryMetadataStore::new();
        let created = store
            .create_file_with_tags(new_file(1, "a.jpg", &["trip", "beach"]))
            .await
            .unwrap();

        let changes = store
            .replace_file_tags(1, created.file.id, &["beach".to_string(), "family".to_string()])
            .await
            .unwrap();

        assert_eq!(changes.added, vec!["family"]);
        assert_eq!(changes.removed, vec!["trip"]);

        let tags = store.load_tags(&[created.file.id]).await.unwrap();
        let names: Vec<_> = tags[&created.file.id].iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["beach", "family"]);

        let kinds: Vec<_> = store
            .activity_rows(1)
            .await
            .iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            kinds.iter().filter(|k| **k == ActivityKind::TagDel).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_list_tags_counts_live_files_only() {
        let store = MemoryMetadataStore::new();
        let first = store
            .create_file_with_tags(new_file(1, "a.jpg", &["trip"]))
            .await
            .unwrap();
        store
            .create_file_with_tags(new_file(1, "b.jpg", &["trip"]))
            .await
            .unwrap();
        store.soft_delete_file(first.file.id).await.unwrap();

        let tags = store.list_tags(1).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].file_count, 1);
    }
}
