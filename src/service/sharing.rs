use tracing::info;

use super::keys::{new_public_key, retry_key_collisions};
use super::{FileService, ServiceError};
use crate::storage::models::{FileRecord, ShareUpdate};
use crate::storage::{CatalogError, Constraint};

impl FileService {
    /// Make a file public and return its share key.
    ///
    /// Idempotent: a file keeps the first key ever issued to it, including
    /// across disable/enable cycles and concurrent calls.
    pub async fn enable_share(
        &self,
        file_id: &str,
        requester_id: &str,
    ) -> Result<String, ServiceError> {
        let file = self.find_owned(file_id, requester_id).await?;

        if file.is_public {
            if let Some(key) = file.public_key {
                return Ok(key);
            }
        }

        let existing = file.public_key;
        let record = retry_key_collisions(
            "public key",
            || match existing {
                Some(ref key) => Ok(key.clone()),
                None => new_public_key(),
            },
            move |public_key| {
                self.apply_share(file_id, requester_id, ShareUpdate::Enable { public_key })
            },
        )
        .await?;

        let key = record
            .public_key
            .ok_or_else(|| ServiceError::Internal("share enabled without a key".to_string()))?;
        info!(file_id, "Enabled public sharing");
        Ok(key)
    }

    /// Make a file private again. The key is retained for a later re-enable.
    pub async fn disable_share(&self, file_id: &str, requester_id: &str) -> Result<(), ServiceError> {
        self.apply_share(file_id, requester_id, ShareUpdate::Disable)
            .await?;
        info!(file_id, "Disabled public sharing");
        Ok(())
    }

    async fn apply_share(
        &self,
        file_id: &str,
        requester_id: &str,
        update: ShareUpdate,
    ) -> Result<FileRecord, ServiceError> {
        match self.catalog.update_share(file_id, requester_id, &update).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(ServiceError::NotFound),
            Err(CatalogError::Conflict(Constraint::PublicKey)) => Err(ServiceError::KeyCollision),
            Err(e) => Err(ServiceError::CatalogWrite(e.to_string())),
        }
    }
}
