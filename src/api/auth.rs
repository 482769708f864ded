use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::identity::bearer_token;
use crate::service::ServiceError;
use crate::AppState;

/// The authenticated requester, resolved from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let id = bearer_token(header)
            .and_then(|token| state.identity.resolve(token))
            .map_err(|e| ApiError::from_service(ServiceError::from(e), false))?;

        Ok(AuthUser { id })
    }
}
