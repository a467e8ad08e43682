use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::favorites::handlers;
use crate::features::favorites::services::FavoriteService;

/// Create routes for the favorites feature
pub fn routes(service: Arc<FavoriteService>) -> Router {
    Router::new()
        .route("/api/favorites", get(handlers::list_favorites))
        .route(
            "/api/favorites/{file_id}",
            post(handlers::add_favorite).delete(handlers::remove_favorite),
        )
        .with_state(service)
}
