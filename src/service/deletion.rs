use tracing::{info, warn};

use super::{FileService, ServiceError};

impl FileService {
    /// Delete an owned file: object first (best-effort), then the catalog row.
    ///
    /// A failed object delete never blocks metadata cleanup. Repeating the call
    /// after success yields `NotFound`.
    pub async fn delete(&self, file_id: &str, requester_id: &str) -> Result<(), ServiceError> {
        let file = self.find_owned(file_id, requester_id).await?;

        if let Err(e) = self.object_store.delete(&file.object_key).await {
            warn!(
                file_id,
                object_key = %file.object_key,
                error = %e,
                "Failed to delete object, removing catalog row anyway"
            );
        }

        match self.catalog.delete(file_id, requester_id).await {
            Ok(true) => {
                info!(file_id, "Deleted file");
                Ok(())
            }
            // Removed by a concurrent delete between lookup and now
            Ok(false) => Err(ServiceError::NotFound),
            Err(e) => Err(ServiceError::CatalogWrite(e.to_string())),
        }
    }
}
