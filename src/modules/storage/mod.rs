//! Storage module for media objects
//!
//! File bytes never pass through this service: callers receive presigned
//! URLs and talk to the MinIO/S3-compatible store directly.

mod issuer;
mod minio_client;

pub use issuer::{content_disposition, PresignedUrlIssuer};
pub use minio_client::MinIOClient;
