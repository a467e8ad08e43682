use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::core::config::MediaConfig;
use crate::core::deadline::with_deadline;
use crate::core::error::Result;
use crate::features::files::dtos::DownloadResponseDto;
use crate::features::files::models::UserId;
use crate::features::files::services::load_owned_file;
use crate::features::stats::models::CreateActivity;
use crate::modules::metadata::MetadataStore;
use crate::modules::storage::PresignedUrlIssuer;

/// Hands out presigned GET URLs for files the caller owns
pub struct DownloadService {
    store: Arc<dyn MetadataStore>,
    issuer: Arc<dyn PresignedUrlIssuer>,
    config: Arc<MediaConfig>,
}

impl DownloadService {
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

    /// Ownership is checked before anything is logged, so a rejected request
    /// leaves no activity row behind.
    pub async fn request_download(
        &self,
        user_id: UserId,
        file_id: Uuid,
    ) -> Result<DownloadResponseDto> {
        with_deadline(self.config.request_timeout, "request_download", async {
            let file = load_owned_file(self.store.as_ref(), user_id, file_id).await?;

            if let Err(e) = self
                .store
                .append_activity(CreateActivity::download(user_id, file.id))
                .await
            {
                warn!("Failed to log download of file {}: {}", file.id, e);
            }

            let ttl = self.config.download_url_expiry_secs;
            let download_url = self
                .issuer
                .issue_download_url(&file.storage_key, ttl, Some(&file.file_name))
                .await?;

            info!("Download URL issued for file {} (user {})", file.id, user_id);

            Ok(DownloadResponseDto {
                download_url,
                file_name: file.file_name,
                expires_in_seconds: ttl,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppError;
    use crate::features::stats::models::ActivityKind;
    use crate::shared::test_helpers::{image_request, TestContext};

    fn downloads(rows: &[crate::features::stats::models::ActivityLog]) -> usize {
        rows.iter()
            .filter(|a| a.kind == ActivityKind::Download)
            .count()
    }

    #[tokio::test]
    async fn test_download_logs_activity_and_hints_filename() {
        let ctx = TestContext::new();
        let uploaded = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &[]))
            .await
            .unwrap();

        let response = ctx
            .download_service()
            .request_download(1, uploaded.file_id)
            .await
            .unwrap();

        assert_eq!(response.file_name, "photo.jpg");
        assert_eq!(response.expires_in_seconds, ctx.config.download_url_expiry_secs);
        assert!(response.download_url.contains(&uploaded.storage_key));
        assert!(response.download_url.contains("photo.jpg"));
        assert_eq!(downloads(&ctx.store.activity_rows(1).await), 1);
    }

    #[tokio::test]
    async fn test_forbidden_download_writes_no_activity() {
        let ctx = TestContext::new();
        let uploaded = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &[]))
            .await
            .unwrap();

        let err = ctx
            .download_service()
            .request_download(2, uploaded.file_id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(downloads(&ctx.store.activity_rows(1).await), 0);
        assert!(ctx.store.activity_rows(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_deleted_files_are_not_found() {
        let ctx = TestContext::new();
        let service = ctx.download_service();

        let err = service.request_download(1, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let uploaded = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &[]))
            .await
            .unwrap();
        ctx.file_service()
            .delete_file(1, uploaded.file_id)
            .await
            .unwrap();

        let err = service
            .request_download(1, uploaded.file_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(downloads(&ctx.store.activity_rows(1).await), 0);
    }

    #[tokio::test]
    async fn test_issuer_failure_is_upstream() {
        let ctx = TestContext::new();
        let uploaded = ctx
            .upload_service()
            .request_upload(1, image_request("photo.jpg", &[]))
            .await
            .unwrap();
        ctx.issuer.fail_downloads(true);

        let err = ctx
            .download_service()
            .request_download(1, uploaded.file_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
