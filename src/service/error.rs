use thiserror::Error;

use crate::identity::IdentityError;

/// Outcome taxonomy of the coordinators. Collaborator errors are mapped into
/// these variants and never returned as-is.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Upload exceeds the maximum size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("Authentication required")]
    Unauthenticated,
    #[error("File not found")]
    NotFound,
    #[error("Content rejected: {}", .0.join(", "))]
    RejectedContent(Vec<String>),
    #[error("Content scan timed out")]
    ScanTimeout,
    #[error("Failed to store file content: {0}")]
    StorageWrite(String),
    #[error("Failed to read file content: {0}")]
    StorageRead(String),
    #[error("Failed to write file metadata: {0}")]
    CatalogWrite(String),
    #[error("Failed to read file metadata: {0}")]
    CatalogRead(String),
    /// A generated key was already taken. Retried inside the coordinators.
    #[error("Generated key already in use")]
    KeyCollision,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<IdentityError> for ServiceError {
    fn from(e: IdentityError) -> Self {
        tracing::debug!(error = %e, "Rejected request identity");
        ServiceError::Unauthenticated
    }
}
