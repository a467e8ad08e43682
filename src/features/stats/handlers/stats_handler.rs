use std::sync::Arc;

use axum::{
    extract::State,
    Json,
};

use crate::core::error::Result;
use crate::core::extractor::AppQuery;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::stats::dtos::{ActivityHistoryDto, ActivityHistoryQuery, UserStatsDto};
use crate::features::stats::services::StatsService;
use crate::shared::types::ApiResponse;

/// Storage usage and this month's activity counters
#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "stats",
    responses(
        (status = 200, description = "User statistics", body = ApiResponse<UserStatsDto>)
    ),
    security(("user_id" = []))
)]
pub async fn get_user_stats(
    user: AuthenticatedUser,
    State(service): State<Arc<StatsService>>,
) -> Result<Json<ApiResponse<UserStatsDto>>> {
    let stats = service.get_user_stats(user.user_id).await?;
    Ok(Json(ApiResponse::success(Some(stats), None, None)))
}

/// Per-day activity for a month
#[utoipa::path(
    get,
    path = "/api/stats/activity",
    tag = "stats",
    params(ActivityHistoryQuery),
    responses(
        (status = 200, description = "Activity by day", body = ApiResponse<ActivityHistoryDto>),
        (status = 400, description = "Malformed month")
    ),
    security(("user_id" = []))
)]
pub async fn get_activity_history(
    user: AuthenticatedUser,
    State(service): State<Arc<StatsService>>,
    AppQuery(query): AppQuery<ActivityHistoryQuery>,
) -> Result<Json<ApiResponse<ActivityHistoryDto>>> {
    let history = service
        .get_activity_history(user.user_id, query.month.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(Some(history), None, None)))
}
