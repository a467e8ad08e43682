#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::sync::{Arc, Mutex};

#[cfg(test)]
use async_trait::async_trait;
#[cfg(test)]
use axum::Router;

#[cfg(test)]
use crate::core::config::MediaConfig;
#[cfg(test)]
use crate::core::error::{AppError, Result};
#[cfg(test)]
use crate::features::favorites::FavoriteService;
#[cfg(test)]
use crate::features::files::dtos::UploadRequestDto;
#[cfg(test)]
use crate::features::files::models::FileType;
#[cfg(test)]
use crate::features::files::{DownloadService, FileService, ListingService, UploadService};
#[cfg(test)]
use crate::features::stats::StatsService;
#[cfg(test)]
use crate::modules::metadata::MemoryMetadataStore;
#[cfg(test)]
use crate::modules::storage::{content_disposition, PresignedUrlIssuer};

/// Presigned URL issuer that fabricates URLs and can be told to fail
#[cfg(test)]
#[derive(Default)]
pub struct StubIssuer {
    fail_uploads: AtomicBool,
    fail_thumbnails: AtomicBool,
    fail_downloads: AtomicBool,
    deleted: Mutex<Vec<String>>,
}

#[cfg(test)]
impl StubIssuer {
    /// Fail upload URLs for primary objects
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_thumbnails(&self, fail: bool) {
        self.fail_thumbnails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl PresignedUrlIssuer for StubIssuer {
    async fn issue_upload_url(
        &self,
        key: &str,
        content_type: &str,
        ttl_secs: u32,
    ) -> Result<String> {
        let failing = if key.starts_with("thumbnails/") {
            &self.fail_thumbnails
        } else {
            &self.fail_uploads
        };
        if failing.load(Ordering::SeqCst) {
            return Err(AppError::Upstream(
                "Failed to generate upload URL".to_string(),
            ));
        }
        Ok(format!(
            "https://storage.test/media/{}?X-Amz-Expires={}&content-type={}",
            key,
            ttl_secs,
            urlencoding::encode(content_type)
        ))
    }

    async fn issue_download_url(
        &self,
        key: &str,
        ttl_secs: u32,
        filename_hint: Option<&str>,
    ) -> Result<String> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(AppError::Upstream(
                "Failed to generate download URL".to_string(),
            ));
        }
        let mut url = format!(
            "https://storage.test/media/{}?X-Amz-Expires={}",
            key, ttl_secs
        );
        if let Some(name) = filename_hint {
            url.push_str("&response-content-disposition=");
            url.push_str(&urlencoding::encode(&content_disposition(name)));
        }
        Ok(url)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(key.to_string());
        }
        Ok(())
    }
}

/// In-memory store, stub issuer and config wired the way `main` wires them
#[cfg(test)]
pub struct TestContext {
    pub store: Arc<MemoryMetadataStore>,
    pub issuer: Arc<StubIssuer>,
    pub config: Arc<MediaConfig>,
}

#[cfg(test)]
impl TestContext {
    pub fn new() -> Self {
        Self::with_config(MediaConfig::default())
    }

    pub fn with_config(config: MediaConfig) -> Self {
        Self {
            store: Arc::new(MemoryMetadataStore::new()),
            issuer: Arc::new(StubIssuer::default()),
            config: Arc::new(config),
        }
    }

    pub fn upload_service(&self) -> UploadService {
        UploadService::new(
            self.store.clone(),
            self.issuer.clone(),
            self.config.clone(),
        )
    }

    pub fn download_service(&self) -> DownloadService {
        DownloadService::new(
            self.store.clone(),
            self.issuer.clone(),
            self.config.clone(),
        )
    }

    pub fn listing_service(&self) -> ListingService {
        ListingService::new(self.store.clone(), self.config.clone())
    }

    pub fn file_service(&self) -> FileService {
        FileService::new(
            self.store.clone(),
            self.issuer.clone(),
            self.config.clone(),
        )
    }

    pub fn favorite_service(&self) -> FavoriteService {
        FavoriteService::new(
            self.store.clone(),
            self.issuer.clone(),
            self.config.clone(),
        )
    }

    pub fn stats_service(&self) -> StatsService {
        StatsService::new(self.store.clone(), self.config.clone())
    }

    /// Full API router (identity middleware included) over this context
    pub fn router(&self) -> Router {
        crate::api_router(crate::build_services(
            self.store.clone(),
            self.issuer.clone(),
            self.config.clone(),
        ))
    }
}

#[cfg(test)]
pub fn upload_request(
    file_name: &str,
    content_type: &str,
    file_type: FileType,
    file_size_bytes: i64,
) -> UploadRequestDto {
    UploadRequestDto {
        file_name: file_name.to_string(),
        content_type: content_type.to_string(),
        file_type,
        file_size_bytes,
        tags: vec![],
        duration: None,
    }
}

/// 1 KiB JPEG upload with the given tags
#[cfg(test)]
pub fn image_request(file_name: &str, tags: &[&str]) -> UploadRequestDto {
    UploadRequestDto {
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..upload_request(file_name, "image/jpeg", FileType::Image, 1024)
    }
}

/// Image upload with a generated file name and tags
#[cfg(test)]
pub fn fake_image_request() -> UploadRequestDto {
    use fake::faker::filesystem::en::FileName;
    use fake::faker::lorem::en::Words;
    use fake::Fake;

    let name: String = FileName().fake();
    let tags: Vec<String> = Words(1..4).fake();
    UploadRequestDto {
        tags,
        ..upload_request(&name, "image/jpeg", FileType::Image, (1i64..4096).fake::<i64>())
    }
}
