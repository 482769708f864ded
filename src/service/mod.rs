//! Storage coordination: keeps the object store and the catalog consistent
//! across upload, download, deletion and sharing.
//!
//! Writes span two systems with no shared transaction, so each path orders its
//! steps so that a failure never leaves a catalog row pointing at missing bytes:
//! - upload writes the object first and deletes it again if the catalog insert fails
//! - deletion removes the object best-effort, then the row
//! - sharing only touches the catalog

mod deletion;
mod error;
pub mod keys;
mod retrieval;
mod sharing;
mod upload;

pub use error::ServiceError;
pub use retrieval::Download;
pub use upload::NewUpload;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::object_store::ObjectStore;
use crate::scan::ScanGate;
use crate::storage::models::FileRecord;
use crate::storage::Catalog;

/// Limits applied by the coordinators.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub max_upload_size: u64,
    pub scan_timeout: Duration,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_upload_size: config.max_upload_size,
            scan_timeout: Duration::from_millis(config.scan.timeout_ms),
        }
    }
}

/// File operations over injected collaborators. Holds no mutable state of its
/// own, so one instance serves all requests concurrently.
pub struct FileService {
    catalog: Arc<dyn Catalog>,
    object_store: Arc<dyn ObjectStore>,
    scanner: Arc<dyn ScanGate>,
    settings: ServiceSettings,
}

impl FileService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        object_store: Arc<dyn ObjectStore>,
        scanner: Arc<dyn ScanGate>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            catalog,
            object_store,
            scanner,
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// List the requester's files, newest first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<FileRecord>, ServiceError> {
        self.catalog
            .list_by_owner(owner_id)
            .await
            .map_err(|e| ServiceError::CatalogRead(e.to_string()))
    }

    /// Look up a file scoped to its owner. Someone else's file is `NotFound`.
    async fn find_owned(&self, file_id: &str, owner_id: &str) -> Result<FileRecord, ServiceError> {
        self.catalog
            .find_by_id_and_owner(file_id, owner_id)
            .await
            .map_err(|e| ServiceError::CatalogRead(e.to_string()))?
            .ok_or(ServiceError::NotFound)
    }
}
