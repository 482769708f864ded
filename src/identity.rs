//! Bearer-token identity resolution. Tokens are issued elsewhere; this only verifies them.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Resolves an opaque bearer token to the id of the authenticated user.
pub trait Identity: Send + Sync {
    fn resolve(&self, token: &str) -> Result<String, IdentityError>;
}

/// The issuer encodes user ids either as numbers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct Claims {
    id: UserId,
}

/// Verifies HS256-signed JWTs and reads the user id from the `id` claim.
pub struct JwtIdentity {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentity {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl Identity for JwtIdentity {
    fn resolve(&self, token: &str) -> Result<String, IdentityError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;

        let id = match data.claims.id {
            UserId::Number(n) => n.to_string(),
            UserId::Text(s) => s,
        };

        if id.trim().is_empty() {
            return Err(IdentityError::InvalidToken("empty id claim".to_string()));
        }
        Ok(id)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, IdentityError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(IdentityError::MissingToken)
}
