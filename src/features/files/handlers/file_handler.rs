use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::{AppJson, AppPath, AppQuery};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::files::dtos::{
    BatchUploadRequestDto, BatchUploadResponseDto, DeleteFileResponseDto, DownloadResponseDto,
    FileFilter, FileListQuery, FileListResponseDto, FileResponseDto, TagResponseDto,
    UpdateTagsDto, UploadRequestDto, UploadResponseDto,
};
use crate::features::files::services::{
    DownloadService, FileService, ListingService, UploadService,
};
use crate::shared::types::{ApiResponse, Meta};

/// Shared state for file routes
#[derive(Clone)]
pub struct FileState {
    pub upload_service: Arc<UploadService>,
    pub download_service: Arc<DownloadService>,
    pub listing_service: Arc<ListingService>,
    pub file_service: Arc<FileService>,
}

/// Request a presigned upload URL
///
/// Records the file metadata and tags, then returns a PUT URL for the object
/// (and for its thumbnail when thumbnails are enabled).
#[utoipa::path(
    post,
    path = "/api/files/upload-url",
    tag = "files",
    request_body = UploadRequestDto,
    responses(
        (status = 201, description = "Upload slot issued", body = ApiResponse<UploadResponseDto>),
        (status = 400, description = "Invalid content type, size or tags"),
        (status = 401, description = "Missing user identity"),
        (status = 502, description = "Upload URL could not be generated")
    ),
    security(("user_id" = []))
)]
pub async fn request_upload_url(
    user: AuthenticatedUser,
    State(state): State<FileState>,
    AppJson(dto): AppJson<UploadRequestDto>,
) -> Result<(StatusCode, Json<ApiResponse<UploadResponseDto>>)> {
    let slot = state.upload_service.request_upload(user.user_id, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(slot), None, None)),
    ))
}

/// Request presigned upload URLs for up to 30 files
///
/// Items that fail are counted in `failed_count` and omitted from `results`.
#[utoipa::path(
    post,
    path = "/api/files/batch-upload-url",
    tag = "files",
    request_body = BatchUploadRequestDto,
    responses(
        (status = 200, description = "Batch processed", body = ApiResponse<BatchUploadResponseDto>),
        (status = 400, description = "Empty or oversized batch"),
        (status = 401, description = "Missing user identity")
    ),
    security(("user_id" = []))
)]
pub async fn request_batch_upload_urls(
    user: AuthenticatedUser,
    State(state): State<FileState>,
    AppJson(dto): AppJson<BatchUploadRequestDto>,
) -> Result<Json<ApiResponse<BatchUploadResponseDto>>> {
    let batch = state
        .upload_service
        .request_batch_upload(user.user_id, dto)
        .await?;
    Ok(Json(ApiResponse::success(Some(batch), None, None)))
}

/// Issue a fresh upload URL for an existing file
#[utoipa::path(
    post,
    path = "/api/files/{id}/upload-url",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Upload URL reissued", body = ApiResponse<UploadResponseDto>),
        (status = 403, description = "File belongs to another user"),
        (status = 404, description = "File not found"),
        (status = 502, description = "Upload URL could not be generated")
    ),
    security(("user_id" = []))
)]
pub async fn retry_upload_url(
    user: AuthenticatedUser,
    State(state): State<FileState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<UploadResponseDto>>> {
    let slot = state.upload_service.retry_upload_url(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(Some(slot), None, None)))
}

/// List the caller's files
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(FileListQuery),
    responses(
        (status = 200, description = "Page of files", body = ApiResponse<FileListResponseDto>),
        (status = 400, description = "Invalid filter")
    ),
    security(("user_id" = []))
)]
pub async fn list_files(
    user: AuthenticatedUser,
    State(state): State<FileState>,
    AppQuery(query): AppQuery<FileListQuery>,
) -> Result<Json<ApiResponse<FileListResponseDto>>> {
    let filter = FileFilter::try_from(query)?;
    let page = state.listing_service.list_files(user.user_id, filter).await?;
    let total = page.pagination.total_items;
    Ok(Json(ApiResponse::success(
        Some(page),
        None,
        Some(Meta { total }),
    )))
}

/// Get a file's metadata
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File found", body = ApiResponse<FileResponseDto>),
        (status = 403, description = "File belongs to another user"),
        (status = 404, description = "File not found")
    ),
    security(("user_id" = []))
)]
pub async fn get_file(
    user: AuthenticatedUser,
    State(state): State<FileState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<FileResponseDto>>> {
    let file = state.file_service.get_file(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(Some(file), None, None)))
}

/// Request a presigned download URL
#[utoipa::path(
    get,
    path = "/api/files/{id}/download",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Download URL issued", body = ApiResponse<DownloadResponseDto>),
        (status = 403, description = "File belongs to another user"),
        (status = 404, description = "File not found"),
        (status = 502, description = "Download URL could not be generated")
    ),
    security(("user_id" = []))
)]
pub async fn download_file(
    user: AuthenticatedUser,
    State(state): State<FileState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<DownloadResponseDto>>> {
    let download = state
        .download_service
        .request_download(user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(Some(download), None, None)))
}

/// Replace a file's tags
#[utoipa::path(
    put,
    path = "/api/files/{id}/tags",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    request_body = UpdateTagsDto,
    responses(
        (status = 200, description = "Tags replaced", body = ApiResponse<FileResponseDto>),
        (status = 400, description = "Invalid tags"),
        (status = 403, description = "File belongs to another user"),
        (status = 404, description = "File not found")
    ),
    security(("user_id" = []))
)]
pub async fn update_file_tags(
    user: AuthenticatedUser,
    State(state): State<FileState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(dto): AppJson<UpdateTagsDto>,
) -> Result<Json<ApiResponse<FileResponseDto>>> {
    let file = state.file_service.update_tags(user.user_id, id, dto).await?;
    Ok(Json(ApiResponse::success(Some(file), None, None)))
}

/// Delete a file
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File deleted", body = ApiResponse<DeleteFileResponseDto>),
        (status = 403, description = "File belongs to another user"),
        (status = 404, description = "File not found")
    ),
    security(("user_id" = []))
)]
pub async fn delete_file(
    user: AuthenticatedUser,
    State(state): State<FileState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<DeleteFileResponseDto>>> {
    let result = state.file_service.delete_file(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(
        Some(result),
        Some("File deleted successfully".to_string()),
        None,
    )))
}

/// List the caller's tags with file counts
#[utoipa::path(
    get,
    path = "/api/tags",
    tag = "files",
    responses(
        (status = 200, description = "Tags", body = ApiResponse<Vec<TagResponseDto>>)
    ),
    security(("user_id" = []))
)]
pub async fn list_tags(
    user: AuthenticatedUser,
    State(state): State<FileState>,
) -> Result<Json<ApiResponse<Vec<TagResponseDto>>>> {
    let tags = state.file_service.list_tags(user.user_id).await?;
    let total = tags.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(tags),
        None,
        Some(Meta { total }),
    )))
}
