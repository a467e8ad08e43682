use async_trait::async_trait;

use crate::core::error::Result;

/// The narrow object-storage contract the media services depend on
#[async_trait]
pub trait PresignedUrlIssuer: Send + Sync {
    /// URL authorizing a single PUT of `key` with the declared content type
    async fn issue_upload_url(&self, key: &str, content_type: &str, ttl_secs: u32)
        -> Result<String>;

    /// URL authorizing GET of `key`; `filename_hint` becomes the suggested
    /// download name on the receiving client
    async fn issue_download_url(
        &self,
        key: &str,
        ttl_secs: u32,
        filename_hint: Option<&str>,
    ) -> Result<String>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// `Content-Disposition` value forcing a download under `file_name`
///
/// Carries an ASCII fallback plus the RFC 5987 encoded original.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}
