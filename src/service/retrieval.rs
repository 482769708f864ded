use tracing::{debug, error};

use super::{FileService, ServiceError};
use crate::object_store::{ByteStream, ObjectStoreError};
use crate::storage::models::{Disposition, FileRecord};

/// A resolved download: the catalog record plus the streamed object content.
pub struct Download {
    pub file: FileRecord,
    pub body: ByteStream,
    pub disposition: Disposition,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("file", &self.file)
            .field("disposition", &self.disposition)
            .finish_non_exhaustive()
    }
}

impl FileService {
    /// Owner download. Always served as an attachment.
    pub async fn download_private(
        &self,
        file_id: &str,
        requester_id: &str,
    ) -> Result<Download, ServiceError> {
        let file = self.find_owned(file_id, requester_id).await?;
        let body = self.open_object(&file).await?;

        debug!(file_id, "Serving private download");
        Ok(Download {
            file,
            body,
            disposition: Disposition::Attachment,
        })
    }

    /// Anonymous download through a share key. Files that are not currently
    /// public are reported as `NotFound`, whatever the key.
    pub async fn download_public(&self, public_key: &str) -> Result<Download, ServiceError> {
        if public_key.trim().is_empty() {
            return Err(ServiceError::NotFound);
        }

        let file = self
            .catalog
            .find_by_public_key(public_key)
            .await
            .map_err(|e| ServiceError::CatalogRead(e.to_string()))?
            .ok_or(ServiceError::NotFound)?;
        let body = self.open_object(&file).await?;

        debug!(file_id = %file.id, "Serving public download");
        let disposition = file.category.disposition();
        Ok(Download {
            file,
            body,
            disposition,
        })
    }

    /// A cataloged object that is missing from the store is a server fault, not a 404.
    async fn open_object(&self, file: &FileRecord) -> Result<ByteStream, ServiceError> {
        self.object_store
            .get(&file.object_key)
            .await
            .map_err(|e| match e {
                ObjectStoreError::NotFound(_) => {
                    error!(
                        file_id = %file.id,
                        object_key = %file.object_key,
                        "Catalog references a missing object"
                    );
                    ServiceError::StorageRead(format!("object {} is missing", file.object_key))
                }
                other => {
                    error!(file_id = %file.id, error = %other, "Object store read failed");
                    ServiceError::StorageRead(other.to_string())
                }
            })
    }
}
