use std::sync::Arc;

use axum::{
    extract::State,
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::{AppPath, AppQuery};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::favorites::dtos::{
    FavoriteFilter, FavoriteListQuery, FavoriteListResponseDto, FavoriteResponseDto,
};
use crate::features::favorites::services::FavoriteService;
use crate::shared::types::{ApiResponse, Meta};

/// Mark a file as favorite
///
/// Idempotent: favoriting twice returns the original `favorited_at`.
#[utoipa::path(
    post,
    path = "/api/favorites/{file_id}",
    tag = "favorites",
    params(("file_id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File favorited", body = ApiResponse<FavoriteResponseDto>),
        (status = 403, description = "File belongs to another user"),
        (status = 404, description = "File not found")
    ),
    security(("user_id" = []))
)]
pub async fn add_favorite(
    user: AuthenticatedUser,
    State(service): State<Arc<FavoriteService>>,
    AppPath(file_id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<FavoriteResponseDto>>> {
    let result = service.add(user.user_id, file_id).await?;
    Ok(Json(ApiResponse::success(Some(result), None, None)))
}

/// Remove a file from favorites
#[utoipa::path(
    delete,
    path = "/api/favorites/{file_id}",
    tag = "favorites",
    params(("file_id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Favorite removed (or was never set)", body = ApiResponse<FavoriteResponseDto>)
    ),
    security(("user_id" = []))
)]
pub async fn remove_favorite(
    user: AuthenticatedUser,
    State(service): State<Arc<FavoriteService>>,
    AppPath(file_id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<FavoriteResponseDto>>> {
    let result = service.remove(user.user_id, file_id).await?;
    Ok(Json(ApiResponse::success(Some(result), None, None)))
}

/// List favorites with fresh access URLs
#[utoipa::path(
    get,
    path = "/api/favorites",
    tag = "favorites",
    params(FavoriteListQuery),
    responses(
        (status = 200, description = "Page of favorites", body = ApiResponse<FavoriteListResponseDto>),
        (status = 400, description = "Invalid filter")
    ),
    security(("user_id" = []))
)]
pub async fn list_favorites(
    user: AuthenticatedUser,
    State(service): State<Arc<FavoriteService>>,
    AppQuery(query): AppQuery<FavoriteListQuery>,
) -> Result<Json<ApiResponse<FavoriteListResponseDto>>> {
    let filter = FavoriteFilter::try_from(query)?;
    let page = service.list(user.user_id, filter).await?;
    let total = page.pagination.total_items;
    Ok(Json(ApiResponse::success(
        Some(page),
        None,
        Some(Meta { total }),
    )))
}
