use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use super::db::DatabaseError;
use super::models::{FileRecord, ShareUpdate};

/// Unique constraints enforced by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    FileId,
    ObjectKey,
    PublicKey,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Constraint::FileId => "id",
            Constraint::ObjectKey => "object_key",
            Constraint::PublicKey => "public_key",
        })
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unique constraint violated on {0}")]
    Conflict(Constraint),
    #[error("Catalog backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for CatalogError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Conflict(constraint) => CatalogError::Conflict(constraint),
            other => CatalogError::Backend(other.to_string()),
        }
    }
}

/// Transactional metadata store for file records.
///
/// Every lookup except `find_by_public_key` is scoped by owner: a record owned by
/// someone else is reported exactly like a missing one.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Insert a new record. Fails with `Conflict` if the id, object key or public key is taken.
    async fn insert(&self, file: &FileRecord) -> Result<(), CatalogError>;

    async fn find_by_id_and_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<FileRecord>, CatalogError>;

    /// Only resolves records that are currently public.
    async fn find_by_public_key(&self, public_key: &str)
        -> Result<Option<FileRecord>, CatalogError>;

    /// Owner's records, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, CatalogError>;

    /// Apply a visibility change and return the stored record, or `None` if no record matches.
    /// An already-issued public key is kept even if `update` carries a different one.
    async fn update_share(
        &self,
        id: &str,
        owner_id: &str,
        update: &ShareUpdate,
    ) -> Result<Option<FileRecord>, CatalogError>;

    /// Remove a record. Returns false if no record matches.
    async fn delete(&self, id: &str, owner_id: &str) -> Result<bool, CatalogError>;
}
