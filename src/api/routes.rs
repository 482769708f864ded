use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Room for multipart boundaries and the text fields next to the file part.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize + MULTIPART_OVERHEAD;

    Router::new()
        // Owner-scoped files
        .route("/files", get(handlers::list_files))
        .route(
            "/files/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/download/:id", get(handlers::download_file))
        .route("/files/:id", delete(handlers::delete_file))
        .route(
            "/files/share/:id",
            post(handlers::enable_share).delete(handlers::disable_share),
        )
        // Anonymous share downloads
        .route("/public/download/:public_key", get(handlers::public_download))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
