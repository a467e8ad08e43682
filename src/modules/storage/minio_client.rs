//! MinIO/S3-compatible storage client
//!
//! Issues presigned PUT/GET URLs and deletes objects for any S3-compatible
//! storage service. Uses the rust-s3 crate for lightweight S3 operations.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header::CONTENT_TYPE, HeaderMap, HeaderValue};
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::{debug, info, warn};

use super::issuer::{content_disposition, PresignedUrlIssuer};
use crate::core::config::MinIOConfig;
use crate::core::error::{AppError, Result, ValidationError};

/// MinIO/S3-compatible storage client
pub struct MinIOClient {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
}

impl MinIOClient {
    /// Create a new MinIO client from configuration and make sure the bucket exists
    pub async fn new(config: MinIOConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create MinIO bucket: {}", e)))?;

        // Use path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        let client = Self {
            bucket,
            region,
            credentials,
            endpoint: config.endpoint,
        };

        client.ensure_bucket_exists().await;

        info!(
            "MinIO client initialized for endpoint: {}, bucket: {}",
            client.endpoint,
            client.bucket.name()
        );

        Ok(client)
    }

    /// Ensure the bucket exists, create if not
    async fn ensure_bucket_exists(&self) {
        // MinIO answers with an error when the bucket is already there
        match Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await
        {
            Ok(_) => info!("Bucket '{}' created successfully", self.bucket.name()),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
            }
        }
    }

    /// Get the bucket name
    pub fn bucket_name(&self) -> String {
        self.bucket.name()
    }
}

/// Headers signed into a presigned PUT; the uploader must send the same Content-Type
fn upload_headers(content_type: &str) -> Result<HeaderMap> {
    let value = HeaderValue::from_str(content_type).map_err(|_| {
        AppError::Validation(ValidationError::InvalidRequest(format!(
            "Content type '{}' is not a valid header value",
            content_type
        )))
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, value);
    Ok(headers)
}

#[async_trait]
impl PresignedUrlIssuer for MinIOClient {
    async fn issue_upload_url(
        &self,
        key: &str,
        content_type: &str,
        ttl_secs: u32,
    ) -> Result<String> {
        let headers = upload_headers(content_type)?;
        let url = self
            .bucket
            .presign_put(key, ttl_secs, Some(headers), None)
            .await
            .map_err(|e| {
                warn!("Presign PUT failed: {}", e);
                AppError::Upstream("Failed to generate upload URL".to_string())
            })?;

        debug!(
            "Issued upload URL for {} valid for {}s",
            content_type, ttl_secs
        );
        Ok(url)
    }

    async fn issue_download_url(
        &self,
        key: &str,
        ttl_secs: u32,
        filename_hint: Option<&str>,
    ) -> Result<String> {
        let queries = filename_hint.map(|name| {
            let mut queries = HashMap::new();
            queries.insert(
                "response-content-disposition".to_string(),
                content_disposition(name),
            );
            queries
        });

        let url = self
            .bucket
            .presign_get(key, ttl_secs, queries)
            .await
            .map_err(|e| {
                warn!("Presign GET failed: {}", e);
                AppError::Upstream("Failed to generate download URL".to_string())
            })?;

        Ok(url)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.bucket.delete_object(key).await.map_err(|e| {
            warn!("Object deletion failed: {}", e);
            AppError::Upstream("Failed to delete stored object".to_string())
        })?;

        debug!("Deleted object from bucket '{}'", self.bucket.name());
        Ok(())
    }
}
