use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::core::config::MediaConfig;
use crate::core::deadline::with_deadline;
use crate::core::error::{AppError, Result, ValidationError};
use crate::features::files::dtos::{
    DeleteFileResponseDto, FileResponseDto, TagResponseDto, UpdateTagsDto,
};
use crate::features::files::models::{normalize_tag_names, UserId};
use crate::features::files::services::load_owned_file;
use crate::modules::metadata::MetadataStore;
use crate::modules::storage::PresignedUrlIssuer;

/// Service for file metadata and tag management
pub struct FileService {
    store: Arc<dyn MetadataStore>,
    issuer: Arc<dyn PresignedUrlIssuer>,
    config: Arc<MediaConfig>,
}

impl FileService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        issuer: Arc<dyn PresignedUrlIssuer>,
        config: Arc<MediaConfig>,
    ) -> Self {
        Self {
            store,
            issuer,
            config,
        }
    }

    /// Get a file's metadata and tags
    pub async fn get_file(&self, user_id: UserId, file_id: Uuid) -> Result<FileResponseDto> {
        with_deadline(self.config.request_timeout, "get_file", async {
            let file = load_owned_file(self.store.as_ref(), user_id, file_id).await?;
            let tags = self
                .store
                .load_tags(&[file.id])
                .await?
                .remove(&file.id)
                .unwrap_or_default();
            Ok(FileResponseDto::from_parts(file, tags))
        })
        .await
    }

    /// Soft-delete a file, then remove its stored objects.
    ///
    /// Object removal is best effort; the metadata is already gone for every reader.
    pub async fn delete_file(
        &self,
        user_id: UserId,
        file_id: Uuid,
    ) -> Result<DeleteFileResponseDto> {
        with_deadline(self.config.request_timeout, "delete_file", async {
            let file = load_owned_file(self.store.as_ref(), user_id, file_id).await?;

            let deleted = self.store.soft_delete_file(file.id).await?;
            if !deleted {
                return Err(AppError::file_not_found());
            }

            let keys = std::iter::once(&file.storage_key).chain(file.thumbnail_key.as_ref());
            for key in keys {
                if let Err(e) = self.issuer.delete_object(key).await {
                    warn!("Stored object for file {} was not removed: {}", file.id, e);
                }
            }

            info!("File deleted: {} (user {})", file.id, user_id);
            Ok(DeleteFileResponseDto { deleted: true })
        })
        .await
    }

    /// Replace the file's tag set
    pub async fn update_tags(
        &self,
        user_id: UserId,
        file_id: Uuid,
        request: UpdateTagsDto,
    ) -> Result<FileResponseDto> {
        request
            .validate()
            .map_err(|e| ValidationError::InvalidRequest(e.to_string()))?;

        with_deadline(self.config.request_timeout, "update_tags", async {
            let file = load_owned_file(self.store.as_ref(), user_id, file_id).await?;

            let names = normalize_tag_names(&request.tags);
            let changes = self
                .store
                .replace_file_tags(user_id, file.id, &names)
                .await?;
            info!(
                "Tags updated on file {}: +{:?} -{:?}",
                file.id, changes.added, changes.removed
            );

            // Re-read for the bumped updated_at
            let file = load_owned_file(self.store.as_ref(), user_id, file_id).await?;
            let tags = self
                .store
                .load_tags(&[file.id])
                .await?
                .remove(&file.id)
                .unwrap_or_default();
            Ok(FileResponseDto::from_parts(file, tags))
        })
        .await
    }

    /// List the caller's tags with live-file counts
    pub async fn list_tags(&self, user_id: UserId) -> Result<Vec<TagResponseDto>> {
        with_deadline(self.config.request_timeout, "list_tags", async {
            let tags = self.store.list_tags(user_id).await?;
            Ok(tags.into_iter().map(TagResponseDto::from).collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::stats::models::ActivityKind;
    use crate::shared::test_helpers::{image_request, TestContext};

    #[tokio::test]
    async fn test_get_file_applies_ownership() {
        let ctx = TestContext::new();
        let uploaded = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &["b", "a"]))
            .await
            .unwrap();
        let service = ctx.file_service();

        let file = service.get_file(1, uploaded.file_id).await.unwrap();
        assert_eq!(file.file_name, "photo.jpg");
        assert!(file.has_thumbnail);
        let names: Vec<&str> = file.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let err = service.get_file(2, uploaded.file_id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_delete_is_soft_and_removes_objects() {
        let ctx = TestContext::new();
        let uploaded = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &[]))
            .await
            .unwrap();
        let service = ctx.file_service();

        let response = service.delete_file(1, uploaded.file_id).await.unwrap();
        assert!(response.deleted);

        let raw = ctx.store.raw_file(uploaded.file_id).await.unwrap();
        assert!(raw.deleted_at.is_some());

        let deleted = ctx.issuer.deleted_keys();
        assert!(deleted.contains(&uploaded.storage_key));
        assert!(deleted.contains(&uploaded.thumbnail_key.unwrap()));

        let err = service.get_file(1, uploaded.file_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = service.delete_file(1, uploaded.file_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_tags_logs_changes() {
        let ctx = TestContext::new();
        let uploaded = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &["keep", "drop"]))
            .await
            .unwrap();

        let updated = ctx
            .file_service()
            .update_tags(
                1,
                uploaded.file_id,
                UpdateTagsDto {
                    tags: vec!["keep".to_string(), " new ".to_string()],
                },
            )
            .await
            .unwrap();

        let names: Vec<&str> = updated.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["keep", "new"]);

        let rows = ctx.store.activity_rows(1).await;
        let deleted: Vec<_> = rows
            .iter()
            .filter(|a| a.kind == ActivityKind::TagDel)
            .filter_map(|a| a.tag_name.as_deref())
            .collect();
        assert_eq!(deleted, vec!["drop"]);
        assert!(rows
            .iter()
            .any(|a| a.kind == ActivityKind::TagAdd && a.tag_name.as_deref() == Some("new")));
    }

    #[tokio::test]
    async fn test_update_tags_rejects_long_names() {
        let ctx = TestContext::new();
        let uploaded = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &[]))
            .await
            .unwrap();

        let err = ctx
            .file_service()
            .update_tags(
                1,
                uploaded.file_id,
                UpdateTagsDto {
                    tags: vec!["x".repeat(51)],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_tags_counts_files() {
        let ctx = TestContext::new();
        let upload = ctx.upload_service();
        upload
            .request_upload(1, image_request("a.jpg", &["sea", "sky"]))
            .await
            .unwrap();
        upload
            .request_upload(1, image_request("b.jpg", &["sea"]))
            .await
            .unwrap();

        let tags = ctx.file_service().list_tags(1).await.unwrap();
        let counts: Vec<(&str, i64)> = tags
            .iter()
            .map(|t| (t.name.as_str(), t.file_count))
            .collect();
        assert_eq!(counts, vec![("sea", 2), ("sky", 1)]);
    }
}
