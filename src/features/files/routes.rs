use axum::{
    routing::{get, post, put},
    Router,
};

use crate::features::files::handlers::{self, FileState};

/// Create routes for the files feature
///
/// All routes need the identity middleware applied by the caller
pub fn routes(state: FileState) -> Router {
    Router::new()
        .route("/api/files/upload-url", post(handlers::request_upload_url))
        .route(
            "/api/files/batch-upload-url",
            post(handlers::request_batch_upload_urls),
        )
        .route("/api/files", get(handlers::list_files))
        .route(
            "/api/files/{id}",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        .route("/api/files/{id}/upload-url", post(handlers::retry_upload_url))
        .route("/api/files/{id}/download", get(handlers::download_file))
        .route("/api/files/{id}/tags", put(handlers::update_file_tags))
        .route("/api/tags", get(handlers::list_tags))
        .with_state(state)
}
