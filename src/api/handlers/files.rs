use std::str::FromStr;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::download_response;
use crate::api::response::{
    multipart_error, next_field, ApiError, AppQuery, JSend, JSendPaginated, Pagination,
};
use crate::api::AuthUser;
use crate::service::NewUpload;
use crate::storage::models::{ContentCategory, FileRecord};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

/// Client-facing projection of a file record. Owner and object key stay internal.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileResponse {
    pub category: ContentCategory,
    pub created_at: String,
    pub description: String,
    pub id: String,
    pub is_public: bool,
    pub mime_type: String,
    pub name: String,
    pub original_name: String,
    pub public_key: Option<String>,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareResponse {
    pub public_key: String,
    pub public_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_limit() -> u32 {
    50
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JSend<FileResponse>>), ApiError> {
    let mut file_chunks: Option<Vec<Bytes>> = None;
    let mut upload = NewUpload::default();

    while let Some(mut field) = next_field(&mut multipart).await? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                upload.declared_name = field.file_name().unwrap_or("file").to_string();
                upload.declared_mime = field.content_type().map(|s| s.to_string());

                // Chunks are handed over as received; the service does the one bounded copy
                let mut chunks = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    chunks.push(chunk);
                }
                file_chunks = Some(chunks);
            }
            "title" => {
                upload.title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid title: {e}")))?,
                );
            }
            "description" => {
                upload.description = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid description: {e}")))?,
                );
            }
            "content_type" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid content_type: {e}")))?;
                if !text.trim().is_empty() {
                    upload.category = ContentCategory::from_str(&text)
                        .map_err(|e| ApiError::bad_request(e.to_string()))?;
                }
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let chunks = file_chunks.ok_or_else(|| ApiError::bad_request("file field is required"))?;
    let body = futures::stream::iter(chunks.into_iter().map(Ok::<Bytes, std::io::Error>));

    let record = state
        .files
        .upload(&user.id, upload, body)
        .await
        .map_err(|e| ApiError::from_service(e, state.config.expose_errors))?;

    Ok((
        StatusCode::CREATED,
        JSend::success(file_to_response(&record)),
    ))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let category = params
        .category
        .as_deref()
        .map(ContentCategory::from_str)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let files: Vec<FileRecord> = state
        .files
        .list(&user.id)
        .await
        .map_err(|e| ApiError::from_service(e, state.config.expose_errors))?
        .into_iter()
        .filter(|f| category.map_or(true, |c| f.category == c))
        .collect();

    let total = files.len() as u64;
    let items: Vec<FileResponse> = files
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(file_to_response)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let download = state
        .files
        .download_private(&id, &user.id)
        .await
        .map_err(|e| ApiError::from_service(e, state.config.expose_errors))?;

    Ok(download_response(download, "private, no-store"))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state
        .files
        .delete(&id, &user.id)
        .await
        .map_err(|e| ApiError::from_service(e, state.config.expose_errors))?;

    Ok(JSend::success(()))
}

pub async fn enable_share(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<ShareResponse>>, ApiError> {
    let public_key = state
        .files
        .enable_share(&id, &user.id)
        .await
        .map_err(|e| ApiError::from_service(e, state.config.expose_errors))?;

    Ok(JSend::success(ShareResponse {
        public_url: state.config.public_url(&public_key),
        public_key,
    }))
}

pub async fn disable_share(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state
        .files
        .disable_share(&id, &user.id)
        .await
        .map_err(|e| ApiError::from_service(e, state.config.expose_errors))?;

    Ok(JSend::success(()))
}

// ============================================================================
// Helpers
// ============================================================================

fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        category: file.category,
        created_at: file.created_at.to_rfc3339(),
        description: file.description.clone(),
        id: file.id.clone(),
        is_public: file.is_public,
        mime_type: file.mime_type.clone(),
        name: file.display_name.clone(),
        original_name: file.original_name.clone(),
        public_key: file.public_key.clone(),
        size_bytes: file.size_bytes,
    }
}
