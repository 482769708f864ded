use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use super::keys::{new_object_key, retry_key_collisions};
use super::{FileService, ServiceError};
use crate::object_store::{bytes_stream, ObjectStoreError};
use crate::scan::ScanVerdict;
use crate::storage::models::{ContentCategory, FileRecord};

const FALLBACK_MIME: &str = "application/octet-stream";

/// Stored name for uploads that arrive without one.
const DEFAULT_NAME: &str = "file";

/// Client-declared attributes of an upload. None of them are checked against the bytes.
#[derive(Debug, Clone, Default)]
pub struct NewUpload {
    pub declared_name: String,
    pub declared_mime: Option<String>,
    pub declared_size: Option<u64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: ContentCategory,
}

impl NewUpload {
    /// Declared type, else a guess from the file name, else octet-stream.
    fn mime_type(&self) -> String {
        self.declared_mime
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty() && *ct != FALLBACK_MIME)
            .map(|ct| ct.to_string())
            .or_else(|| {
                mime_guess::from_path(&self.declared_name)
                    .first()
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| FALLBACK_MIME.to_string())
    }
}

async fn next_chunk<S>(body: &mut std::pin::Pin<&mut S>) -> Result<Option<Bytes>, ServiceError>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    body.next()
        .await
        .transpose()
        .map_err(|e| ServiceError::InvalidInput(format!("failed to read upload: {e}")))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

impl FileService {
    /// Scan, store and catalog an upload.
    ///
    /// On success exactly one object and one catalog row exist. On failure
    /// neither does, except when the compensating delete itself fails; that
    /// object is unreferenced and logged for reconciliation.
    pub async fn upload<S>(
        &self,
        owner_id: &str,
        mut upload: NewUpload,
        body: S,
    ) -> Result<FileRecord, ServiceError>
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send,
    {
        if owner_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("owner id is required".to_string()));
        }
        if upload.declared_name.trim().is_empty() {
            upload.declared_name = DEFAULT_NAME.to_string();
        }

        let data = self.read_body(body).await?;

        // Phase 1: scan before anything durable happens
        self.scan(owner_id, &data).await?;

        // Phase 2: write the bytes (create-only, fresh key per attempt)
        let object_key = self.put_object(&data).await?;

        // Phase 3: catalog insert, undoing phase 2 on failure
        let record = FileRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            object_key,
            display_name: non_empty(upload.title.as_deref())
                .unwrap_or_else(|| upload.declared_name.clone()),
            description: non_empty(upload.description.as_deref()).unwrap_or_default(),
            category: upload.category,
            size_bytes: upload.declared_size.unwrap_or(data.len() as u64),
            mime_type: upload.mime_type(),
            original_name: upload.declared_name,
            is_public: false,
            public_key: None,
            created_at: Utc::now(),
        };

        if let Err(e) = self.catalog.insert(&record).await {
            error!(
                owner_id,
                object_key = %record.object_key,
                error = %e,
                "Catalog insert failed after storing object, rolling back"
            );
            self.discard_object(&record.object_key).await;
            return Err(ServiceError::CatalogWrite(e.to_string()));
        }

        info!(
            file_id = %record.id,
            owner_id,
            size = record.size_bytes,
            "Uploaded file"
        );
        Ok(record)
    }

    /// Collect the body, refusing anything over the limit. A single-chunk body
    /// is returned as is, without copying.
    async fn read_body<S>(&self, body: S) -> Result<Bytes, ServiceError>
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send,
    {
        let limit = self.settings.max_upload_size;
        let mut body = std::pin::pin!(body);

        let first = match next_chunk(&mut body).await? {
            Some(chunk) => chunk,
            None => return Ok(Bytes::new()),
        };
        if first.len() as u64 > limit {
            return Err(ServiceError::PayloadTooLarge { limit });
        }

        let second = match next_chunk(&mut body).await? {
            Some(chunk) => chunk,
            None => return Ok(first),
        };

        let mut buf = BytesMut::with_capacity(first.len() + second.len());
        buf.extend_from_slice(&first);

        let mut next = Some(second);
        while let Some(chunk) = next {
            if (buf.len() + chunk.len()) as u64 > limit {
                return Err(ServiceError::PayloadTooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
            next = next_chunk(&mut body).await?;
        }

        Ok(buf.freeze())
    }

    /// Fails closed: a timeout or scanner fault rejects the upload.
    async fn scan(&self, owner_id: &str, data: &Bytes) -> Result<(), ServiceError> {
        let verdict =
            match tokio::time::timeout(self.settings.scan_timeout, self.scanner.scan(data)).await {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(e)) => {
                    error!(owner_id, error = %e, "Content scan failed");
                    return Err(ServiceError::Internal(format!("content scan failed: {e}")));
                }
                Err(_) => {
                    warn!(
                        owner_id,
                        timeout_ms = self.settings.scan_timeout.as_millis() as u64,
                        "Content scan timed out"
                    );
                    return Err(ServiceError::ScanTimeout);
                }
            };

        match verdict {
            ScanVerdict::Accept => Ok(()),
            ScanVerdict::Reject(reasons) => {
                warn!(owner_id, ?reasons, "Upload rejected by content scan");
                Err(ServiceError::RejectedContent(reasons))
            }
        }
    }

    async fn put_object(&self, data: &Bytes) -> Result<String, ServiceError> {
        let store = &self.object_store;
        retry_key_collisions(
            "object key",
            || Ok(new_object_key()),
            |key| {
                let body = bytes_stream(data.clone());
                async move {
                    match store.put(&key, body).await {
                        Ok(()) => {
                            debug!(object_key = %key, "Stored object");
                            Ok(key)
                        }
                        Err(ObjectStoreError::AlreadyExists(_)) => Err(ServiceError::KeyCollision),
                        Err(e) => {
                            error!(object_key = %key, error = %e, "Object store write failed");
                            Err(ServiceError::StorageWrite(e.to_string()))
                        }
                    }
                }
            },
        )
        .await
    }

    /// Compensating delete after a failed catalog insert. Failure leaks an
    /// unreferenced object but does not change the caller's error.
    async fn discard_object(&self, object_key: &str) {
        match self.object_store.delete(object_key).await {
            Ok(()) => debug!(object_key, "Rolled back stored object"),
            Err(e) => error!(
                object_key,
                error = %e,
                "Compensating delete failed, object is orphaned"
            ),
        }
    }
}
