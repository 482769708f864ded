use axum::extract::{Path, State};
use axum::response::Response;
use std::sync::Arc;

use super::download_response;
use crate::api::response::ApiError;
use crate::AppState;

/// Serve a shared file by its public key. No authentication.
/// Route: GET /public/download/:public_key
pub async fn public_download(
    State(state): State<Arc<AppState>>,
    Path(public_key): Path<String>,
) -> Result<Response, ApiError> {
    let download = state
        .files
        .download_public(&public_key)
        .await
        .map_err(|e| ApiError::from_service(e, state.config.expose_errors))?;

    // Short cache: sharing can be revoked
    Ok(download_response(download, "public, max-age=300"))
}
