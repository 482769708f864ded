mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Object content as an ordered stream of chunks. An `Err` item ends the stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Wrap an in-memory buffer as a single-chunk stream.
pub fn bytes_stream(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Abstraction over object storage backends.
/// Keys are opaque -- the raw blobs are meaningless without the catalog.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create-only write: an existing key fails with `AlreadyExists` and is left untouched.
    async fn put(&self, key: &str, data: ByteStream) -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<ByteStream, ObjectStoreError>;
    /// Deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// Keys must be a single flat path segment of `[A-Za-z0-9._-]`, not starting with a dot.
pub fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(ObjectStoreError::InvalidKey(key.to_string()))
    }
}
