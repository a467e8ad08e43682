use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::core::config::MediaConfig;
use crate::core::deadline::with_deadline;
use crate::core::error::{AppError, Result, ValidationError};
use crate::features::files::dtos::{
    is_content_type_allowed, normalize_content_type, storage_extension, BatchUploadRequestDto,
    BatchUploadResponseDto, UploadRequestDto, UploadResponseDto,
};
use crate::features::files::models::{normalize_tag_names, CreateFile, UrlStatus, UserId};
use crate::features::files::services::load_owned_file;
use crate::modules::metadata::MetadataStore;
use crate::modules::storage::PresignedUrlIssuer;
use crate::shared::constants::MAX_BATCH_SIZE;

const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

/// Issues presigned upload slots and records the matching metadata
pub struct UploadService {
    store: Arc<dyn MetadataStore>,
    issuer: Arc<dyn PresignedUrlIssuer>,
    config: Arc<MediaConfig>,
}

impl UploadService {
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

    /// Validate the request, commit the file with its tags, then hand out a
    /// presigned PUT URL (and a thumbnail URL when thumbnails are enabled).
    pub async fn request_upload(
        &self,
        user_id: UserId,
        request: UploadRequestDto,
    ) -> Result<UploadResponseDto> {
        with_deadline(
            self.config.request_timeout,
            "request_upload",
            self.issue_slot(user_id, request),
        )
        .await
    }

    /// Run up to `MAX_BATCH_SIZE` uploads through a bounded worker pool.
    ///
    /// Failed items are counted and left out of `results`, which keeps request order.
    pub async fn request_batch_upload(
        &self,
        user_id: UserId,
        request: BatchUploadRequestDto,
    ) -> Result<BatchUploadResponseDto> {
        let total_count = request.files.len();
        if total_count == 0 {
            return Err(ValidationError::EmptyBatch.into());
        }
        if total_count > MAX_BATCH_SIZE {
            return Err(ValidationError::BatchTooLarge {
                count: total_count,
                max: MAX_BATCH_SIZE,
            }
            .into());
        }

        let width = self.config.batch_concurrency.max(1);
        with_deadline(self.config.request_timeout, "request_batch_upload", async {
            let outcomes: Vec<Result<UploadResponseDto>> =
                stream::iter(request.files.into_iter().enumerate())
                    .map(|(index, item)| async move {
                        let outcome = self.issue_slot(user_id, item).await;
                        if let Err(e) = &outcome {
                            warn!("Batch item {} for user {} failed: {}", index, user_id, e);
                        }
                        outcome
                    })
                    .buffered(width)
                    .collect()
                    .await;

            let results: Vec<UploadResponseDto> = outcomes.into_iter().flatten().collect();
            let success_count = results.len();
            let failed_count = total_count - success_count;

            info!(
                "Batch upload for user {}: {} succeeded, {} failed",
                user_id, success_count, failed_count
            );

            Ok(BatchUploadResponseDto {
                results,
                total_count,
                success_count,
                failed_count,
            })
        })
        .await
    }

    /// Issue a fresh upload URL for a file whose metadata already exists
    pub async fn retry_upload_url(
        &self,
        user_id: UserId,
        file_id: Uuid,
    ) -> Result<UploadResponseDto> {
        with_deadline(self.config.request_timeout, "retry_upload_url", async {
            let file = load_owned_file(self.store.as_ref(), user_id, file_id).await?;

            let ttl = self.config.upload_url_expiry_secs;
            let upload_url = self
                .issuer
                .issue_upload_url(&file.storage_key, &file.content_type, ttl)
                .await?;
            let thumbnail_url = match &file.thumbnail_key {
                Some(key) => Some(self.thumbnail_url(key).await),
                None => None,
            };

            if file.url_status != UrlStatus::Issued {
                self.store
                    .set_url_status(file.id, UrlStatus::Issued)
                    .await?;
                info!("Upload URL reissued for pending file {}", file.id);
            }

            Ok(UploadResponseDto {
                file_id: file.id,
                upload_url,
                storage_key: file.storage_key,
                thumbnail_url,
                thumbnail_key: file.thumbnail_key,
                expires_in_seconds: ttl,
            })
        })
        .await
    }

    fn check_request(&self, request: &UploadRequestDto) -> Result<()> {
        if !is_content_type_allowed(request.file_type, &request.content_type) {
            return Err(ValidationError::InvalidContentType {
                content_type: request.content_type.clone(),
                file_type: request.file_type.to_string(),
            }
            .into());
        }
        if request.file_size_bytes > self.config.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size: request.file_size_bytes,
                max: self.config.max_file_size,
            }
            .into());
        }
        request
            .validate()
            .map_err(|e| ValidationError::InvalidRequest(e.to_string()))?;
        Ok(())
    }

    async fn issue_slot(
        &self,
        user_id: UserId,
        request: UploadRequestDto,
    ) -> Result<UploadResponseDto> {
        self.check_request(&request)?;

        let object_id = Uuid::new_v4();
        let storage_key = format!(
            "uploads/{}/{}.{}",
            user_id,
            object_id,
            storage_extension(&request.file_name)
        );
        let thumbnail_key = self
            .config
            .thumbnails_enabled
            .then(|| format!("thumbnails/{}/{}.jpg", user_id, object_id));

        let created = self
            .store
            .create_file_with_tags(CreateFile {
                id: Uuid::now_v7(),
                user_id,
                file_name: request.file_name,
                storage_key: storage_key.clone(),
                thumbnail_key: thumbnail_key.clone(),
                file_type: request.file_type,
                content_type: normalize_content_type(&request.content_type),
                file_size: request.file_size_bytes,
                duration: request.duration,
                tag_names: normalize_tag_names(&request.tags),
            })
            .await?;
        let file_id = created.file.id;
        debug!(
            "File {} recorded for user {} with {} tags",
            file_id,
            user_id,
            created.tags.len()
        );

        let ttl = self.config.upload_url_expiry_secs;
        let upload_url = match self
            .issuer
            .issue_upload_url(&storage_key, &created.file.content_type, ttl)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                error!("Upload URL issuance failed for file {}: {}", file_id, e);
                if let Err(mark_err) = self
                    .store
                    .set_url_status(file_id, UrlStatus::PendingUrl)
                    .await
                {
                    error!("Failed to mark file {} as pending: {}", file_id, mark_err);
                }
                return Err(AppError::Upstream(
                    "Failed to generate upload URL".to_string(),
                ));
            }
        };

        let thumbnail_url = match &thumbnail_key {
            Some(key) => Some(self.thumbnail_url(key).await),
            None => None,
        };

        info!("Upload slot issued for file {} (user {})", file_id, user_id);

        Ok(UploadResponseDto {
            file_id,
            upload_url,
            storage_key,
            thumbnail_url,
            thumbnail_key,
            expires_in_seconds: ttl,
        })
    }

    /// Thumbnail slots are best effort; a failure yields an empty URL
    async fn thumbnail_url(&self, key: &str) -> String {
        self.issuer
            .issue_upload_url(key, THUMBNAIL_CONTENT_TYPE, self.config.upload_url_expiry_secs)
            .await
            .unwrap_or_else(|e| {
                warn!("Thumbnail URL issuance failed: {}", e);
                String::new()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::files::models::FileType;
    use crate::features::stats::models::ActivityKind;
    use crate::shared::test_helpers::{image_request, upload_request, TestContext};

    #[tokio::test]
    async fn test_upload_records_file_tags_and_activity() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();

        let response = service
            .request_upload(7, image_request("photo.jpg", &["vacation", "beach"]))
            .await
            .unwrap();

        assert!(response.storage_key.starts_with("uploads/7/"));
        assert!(response.storage_key.ends_with(".jpg"));
        assert!(response.upload_url.contains(&response.storage_key));
        assert_eq!(response.expires_in_seconds, ctx.config.upload_url_expiry_secs);
        let thumbnail_key = response.thumbnail_key.clone().unwrap();
        assert!(thumbnail_key.starts_with("thumbnails/7/"));
        assert!(!response.thumbnail_url.unwrap().is_empty());

        let kinds: Vec<ActivityKind> = ctx
            .store
            .activity_rows(7)
            .await
            .into_iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            kinds.iter().filter(|k| **k == ActivityKind::TagAdd).count(),
            2
        );
        assert_eq!(
            kinds.iter().filter(|k| **k == ActivityKind::Upload).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_storage_keys_are_unique() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();

        let first = service
            .request_upload(1, image_request("same.jpg", &[]))
            .await
            .unwrap();
        let second = service
            .request_upload(1, image_request("same.jpg", &[]))
            .await
            .unwrap();

        assert_ne!(first.storage_key, second.storage_key);
        assert_ne!(first.file_id, second.file_id);
    }

    #[tokio::test]
    async fn test_same_tag_twice_creates_one_tag_and_two_events() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();

        service
            .request_upload(3, image_request("a.jpg", &["x"]))
            .await
            .unwrap();
        service
            .request_upload(3, image_request("b.jpg", &["x"]))
            .await
            .unwrap();

        assert_eq!(ctx.store.tag_rows(3).await.len(), 1);
        let tag_adds = ctx
            .store
            .activity_rows(3)
            .await
            .into_iter()
            .filter(|a| a.kind == ActivityKind::TagAdd && a.tag_name.as_deref() == Some("x"))
            .count();
        assert_eq!(tag_adds, 2);
    }

    #[tokio::test]
    async fn test_content_type_is_stored_and_signed_normalized() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();

        let request = upload_request("shot.jpg", " IMAGE/JPEG ", FileType::Image, 2048);
        let response = service.request_upload(4, request).await.unwrap();

        let file = ctx.store.raw_file(response.file_id).await.unwrap();
        assert_eq!(file.content_type, "image/jpeg");
        assert!(response.upload_url.ends_with("content-type=image%2Fjpeg"));
    }

    #[tokio::test]
    async fn test_tags_are_applied_in_name_order() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();

        service
            .request_upload(6, image_request("a.jpg", &["y", "x", "y"]))
            .await
            .unwrap();

        let tag_adds: Vec<String> = ctx
            .store
            .activity_rows(6)
            .await
            .into_iter()
            .filter(|a| a.kind == ActivityKind::TagAdd)
            .filter_map(|a| a.tag_name)
            .collect();
        assert_eq!(tag_adds, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_content_type_checked_before_size() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();

        let request = upload_request(
            "clip.mp4",
            "video/mp4",
            FileType::Image,
            ctx.config.max_file_size + 1,
        );
        let err = service.request_upload(1, request).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidContentType { .. })
        ));

        let request = upload_request(
            "big.jpg",
            "image/jpeg",
            FileType::Image,
            ctx.config.max_file_size + 1,
        );
        let err = service.request_upload(1, request).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::FileTooLarge { .. })
        ));
        assert!(ctx.store.activity_rows(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_swallowed() {
        let ctx = TestContext::new();
        ctx.issuer.fail_thumbnails(true);

        let response = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &[]))
            .await
            .unwrap();

        assert!(!response.upload_url.is_empty());
        assert_eq!(response.thumbnail_url.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_thumbnails_can_be_disabled() {
        let ctx = TestContext::with_config(MediaConfig {
            thumbnails_enabled: false,
            ..MediaConfig::default()
        });

        let response = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &[]))
            .await
            .unwrap();

        assert!(response.thumbnail_key.is_none());
        assert!(response.thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn test_upload_url_failure_marks_file_pending_then_retry_recovers() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();
        ctx.issuer.fail_uploads(true);

        let err = service
            .request_upload(5, image_request("photo.jpg", &["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(ref m) if m == "Failed to generate upload URL"));

        let pending = ctx.store.activity_rows(5).await[0].file_id.unwrap();
        let file = ctx.store.raw_file(pending).await.unwrap();
        assert_eq!(file.url_status, UrlStatus::PendingUrl);

        ctx.issuer.fail_uploads(false);
        let retried = service.retry_upload_url(5, pending).await.unwrap();
        assert_eq!(retried.file_id, pending);
        assert_eq!(retried.storage_key, file.storage_key);

        let file = ctx.store.raw_file(pending).await.unwrap();
        assert_eq!(file.url_status, UrlStatus::Issued);
    }

    #[tokio::test]
    async fn test_retry_requires_ownership() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();
        let created = service
            .request_upload(1, image_request("photo.jpg", &[]))
            .await
            .unwrap();

        let err = service.retry_upload_url(2, created.file_id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = service
            .retry_upload_url(1, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_batch_bounds_checked_up_front() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();

        let err = service
            .request_batch_upload(1, BatchUploadRequestDto { files: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::EmptyBatch)
        ));

        let files = (0..31)
            .map(|i| image_request(&format!("{}.jpg", i), &[]))
            .collect();
        let err = service
            .request_batch_upload(1, BatchUploadRequestDto { files })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::BatchTooLarge { count: 31, max: 30 })
        ));
        assert!(ctx.store.activity_rows(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_counts_failures_and_keeps_order() {
        let ctx = TestContext::new();
        let service = ctx.upload_service();

        let mut files: Vec<UploadRequestDto> = (0..5)
            .map(|i| image_request(&format!("item-{}.jpg", i), &[]))
            .collect();
        files[2].content_type = "application/pdf".to_string();

        let response = service
            .request_batch_upload(9, BatchUploadRequestDto { files })
            .await
            .unwrap();

        assert_eq!(response.total_count, 5);
        assert_eq!(response.success_count, 4);
        assert_eq!(response.failed_count, 1);
        assert_eq!(response.results.len(), 4);

        let mut uploaded = Vec::new();
        for result in &response.results {
            let file = ctx.store.raw_file(result.file_id).await.unwrap();
            uploaded.push(file.file_name);
        }
        assert_eq!(
            uploaded,
            vec!["item-0.jpg", "item-1.jpg", "item-3.jpg", "item-4.jpg"]
        );
    }
}
