use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth;
use crate::features::favorites::{dtos as favorites_dtos, handlers as favorites_handlers};
use crate::features::files::{dtos as files_dtos, handlers as files_handlers, models as files_models};
use crate::features::stats::{dtos as stats_dtos, handlers as stats_handlers};
use crate::shared::types::{ApiResponse, Meta, PaginationMeta, SortDirection};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Files
        files_handlers::request_upload_url,
        files_handlers::request_batch_upload_urls,
        files_handlers::retry_upload_url,
        files_handlers::list_files,
        files_handlers::get_file,
        files_handlers::download_file,
        files_handlers::update_file_tags,
        files_handlers::delete_file,
        files_handlers::list_tags,
        // Favorites
        favorites_handlers::add_favorite,
        favorites_handlers::remove_favorite,
        favorites_handlers::list_favorites,
        // Stats
        stats_handlers::get_user_stats,
        stats_handlers::get_activity_history,
    ),
    components(
        schemas(
            // Shared
            Meta,
            PaginationMeta,
            SortDirection,
            auth::model::AuthenticatedUser,
            // Files
            files_models::FileType,
            files_models::UrlStatus,
            files_dtos::FileSort,
            files_dtos::UploadRequestDto,
            files_dtos::BatchUploadRequestDto,
            files_dtos::UpdateTagsDto,
            files_dtos::UploadResponseDto,
            files_dtos::BatchUploadResponseDto,
            files_dtos::DownloadResponseDto,
            files_dtos::FileTagDto,
            files_dtos::FileResponseDto,
            files_dtos::FileListResponseDto,
            files_dtos::TagResponseDto,
            files_dtos::DeleteFileResponseDto,
            ApiResponse<files_dtos::UploadResponseDto>,
            ApiResponse<files_dtos::BatchUploadResponseDto>,
            ApiResponse<files_dtos::DownloadResponseDto>,
            ApiResponse<files_dtos::FileResponseDto>,
            ApiResponse<files_dtos::FileListResponseDto>,
            ApiResponse<Vec<files_dtos::TagResponseDto>>,
            ApiResponse<files_dtos::DeleteFileResponseDto>,
            // Favorites
            favorites_dtos::FavoriteSort,
            favorites_dtos::FavoriteResponseDto,
            favorites_dtos::FavoriteItemDto,
            favorites_dtos::FavoriteListResponseDto,
            ApiResponse<favorites_dtos::FavoriteResponseDto>,
            ApiResponse<favorites_dtos::FavoriteListResponseDto>,
            // Stats
            stats_dtos::UserStatsDto,
            stats_dtos::DailyHistoryDto,
            stats_dtos::ActivityHistoryDto,
            ApiResponse<stats_dtos::UserStatsDto>,
            ApiResponse<stats_dtos::ActivityHistoryDto>,
        )
    ),
    tags(
        (name = "files", description = "Presigned uploads, downloads, listing and tags"),
        (name = "favorites", description = "Per-user favorite files"),
        (name = "stats", description = "Storage usage and activity history"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Media Vault API",
        version = "0.1.0",
        description = "Presigned-URL media storage with tags, favorites and activity stats",
    )
)]
pub struct ApiDoc;

/// Documents the gateway-provided `X-User-Id` header
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-User-Id"))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/api/files/upload-url",
            "/api/files/batch-upload-url",
            "/api/files/{id}/upload-url",
            "/api/files",
            "/api/files/{id}",
            "/api/files/{id}/download",
            "/api/files/{id}/tags",
            "/api/tags",
            "/api/favorites",
            "/api/favorites/{file_id}",
            "/api/stats",
            "/api/stats/activity",
        ] {
            assert!(paths.contains(&expected), "missing {}", expected);
        }
    }
}
