use std::sync::Arc;

use axum::{routing::get, Router};

use crate::features::stats::handlers;
use crate::features::stats::services::StatsService;

/// Create routes for the stats feature
pub fn routes(service: Arc<StatsService>) -> Router {
    Router::new()
        .route("/api/stats", get(handlers::get_user_stats))
        .route("/api/stats/activity", get(handlers::get_activity_history))
        .with_state(service)
}
