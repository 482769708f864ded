use async_trait::async_trait;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::{validate_key, ByteStream, ObjectStore, ObjectStoreError};

/// Local filesystem object store for development and testing.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

async fn write_stream(file: &mut tokio::fs::File, data: &mut ByteStream) -> std::io::Result<()> {
    while let Some(chunk) = data.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    file.sync_all().await
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, mut data: ByteStream) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ObjectStoreError::AlreadyExists(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = write_stream(&mut file, &mut data).await {
            drop(file);
            // Never leave a truncated blob behind
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ByteStream, ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(ReaderStream::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
