use async_trait::async_trait;
use redb::{ReadableTable, WriteTransaction};

use super::catalog::{Catalog, CatalogError, Constraint};
use super::db::{Database, DatabaseError};
use super::models::{FileRecord, ShareUpdate};
use super::tables::*;

fn load_owned(
    write_txn: &WriteTransaction,
    id: &str,
    owner_id: &str,
) -> Result<Option<FileRecord>, DatabaseError> {
    let table = write_txn.open_table(FILES)?;
    let file = match table.get(id)? {
        Some(data) => Some(rmp_serde::from_slice::<FileRecord>(data.value())?),
        None => None,
    };
    Ok(file.filter(|f| f.owner_id == owner_id))
}

fn store(write_txn: &WriteTransaction, file: &FileRecord) -> Result<(), DatabaseError> {
    let mut table = write_txn.open_table(FILES)?;
    let data = rmp_serde::to_vec_named(file)?;
    table.insert(file.id.as_str(), data.as_slice())?;
    Ok(())
}

fn insert_in(write_txn: &WriteTransaction, file: &FileRecord) -> Result<(), DatabaseError> {
    {
        let table = write_txn.open_table(FILES)?;
        if table.get(file.id.as_str())?.is_some() {
            return Err(DatabaseError::Conflict(Constraint::FileId));
        }
    }

    {
        let mut object_keys = write_txn.open_table(OBJECT_KEYS)?;
        if object_keys.get(file.object_key.as_str())?.is_some() {
            return Err(DatabaseError::Conflict(Constraint::ObjectKey));
        }
        object_keys.insert(file.object_key.as_str(), file.id.as_str())?;
    }

    if let Some(ref public_key) = file.public_key {
        let mut public_keys = write_txn.open_table(PUBLIC_KEYS)?;
        if public_keys.get(public_key.as_str())?.is_some() {
            return Err(DatabaseError::Conflict(Constraint::PublicKey));
        }
        public_keys.insert(public_key.as_str(), file.id.as_str())?;
    }

    store(write_txn, file)?;

    // Maintain owner index
    let mut owner_table = write_txn.open_table(OWNER_FILES)?;
    let mut file_ids: Vec<String> = match owner_table.get(file.owner_id.as_str())? {
        Some(data) => rmp_serde::from_slice(data.value())?,
        None => Vec::new(),
    };
    if !file_ids.contains(&file.id) {
        file_ids.push(file.id.clone());
        let index_data = rmp_serde::to_vec_named(&file_ids)?;
        owner_table.insert(file.owner_id.as_str(), index_data.as_slice())?;
    }

    Ok(())
}

fn update_share_in(
    write_txn: &WriteTransaction,
    id: &str,
    owner_id: &str,
    update: &ShareUpdate,
) -> Result<Option<FileRecord>, DatabaseError> {
    let mut file = match load_owned(write_txn, id, owner_id)? {
        Some(file) => file,
        None => return Ok(None),
    };

    match update {
        ShareUpdate::Enable { public_key } => {
            // An issued key is permanent; a racing second key is simply dropped
            if file.public_key.is_none() {
                let mut public_keys = write_txn.open_table(PUBLIC_KEYS)?;
                if public_keys.get(public_key.as_str())?.is_some() {
                    return Err(DatabaseError::Conflict(Constraint::PublicKey));
                }
                public_keys.insert(public_key.as_str(), id)?;
                file.public_key = Some(public_key.clone());
            }
            file.is_public = true;
        }
        ShareUpdate::Disable => {
            file.is_public = false;
        }
    }

    store(write_txn, &file)?;
    Ok(Some(file))
}

fn delete_in(write_txn: &WriteTransaction, id: &str, owner_id: &str) -> Result<bool, DatabaseError> {
    if load_owned(write_txn, id, owner_id)?.is_none() {
        return Ok(false);
    }

    {
        let mut table = write_txn.open_table(FILES)?;
        table.remove(id)?;
    }

    // Object and public key index entries are left in place as tombstones so
    // neither key can ever be handed to another record.
    let file_ids: Option<Vec<String>> = {
        let owner_table = write_txn.open_table(OWNER_FILES)?;
        let result = match owner_table.get(owner_id)? {
            Some(data) => Some(rmp_serde::from_slice(data.value())?),
            None => None,
        };
        result
    };

    if let Some(mut ids) = file_ids {
        ids.retain(|fid| fid != id);
        let mut owner_table = write_txn.open_table(OWNER_FILES)?;
        if ids.is_empty() {
            owner_table.remove(owner_id)?;
        } else {
            let data = rmp_serde::to_vec_named(&ids)?;
            owner_table.insert(owner_id, data.as_slice())?;
        }
    }

    Ok(true)
}

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Insert a new file record, enforcing id, object key and public key uniqueness
    pub fn insert_file(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(!file.object_key.is_empty(), "object key must not be empty");

        let write_txn = self.begin_write()?;
        let outcome = insert_in(&write_txn, file);
        Self::finish(write_txn, outcome)
    }

    /// Get a file by id, only if it belongs to `owner_id`
    pub fn get_file_for_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file).filter(|f| f.owner_id == owner_id))
            }
            None => Ok(None),
        }
    }

    /// Resolve a public key to a file that is currently shared
    pub fn get_public_file(&self, public_key: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let key_table = read_txn.open_table(PUBLIC_KEYS)?;

        let id = match key_table.get(public_key)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let files_table = read_txn.open_table(FILES)?;
        match files_table.get(id.as_str())? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file)
                    .filter(|f| f.is_public && f.public_key.as_deref() == Some(public_key)))
            }
            None => Ok(None),
        }
    }

    /// Get all files for an owner, newest first
    pub fn get_files_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }

    /// Apply a visibility change to an owned file
    pub fn update_share(
        &self,
        id: &str,
        owner_id: &str,
        update: &ShareUpdate,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;
        let outcome = update_share_in(&write_txn, id, owner_id, update);
        Self::finish(write_txn, outcome)
    }

    /// Delete an owned file and clean up the owner index
    pub fn delete_file(&self, id: &str, owner_id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let outcome = delete_in(&write_txn, id, owner_id);
        Self::finish(write_txn, outcome)
    }
}

#[async_trait]
impl Catalog for Database {
    async fn insert(&self, file: &FileRecord) -> Result<(), CatalogError> {
        Ok(self.insert_file(file)?)
    }

    async fn find_by_id_and_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<FileRecord>, CatalogError> {
        Ok(self.get_file_for_owner(id, owner_id)?)
    }

    async fn find_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<FileRecord>, CatalogError> {
        Ok(self.get_public_file(public_key)?)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, CatalogError> {
        Ok(self.get_files_by_owner(owner_id)?)
    }

    async fn update_share(
        &self,
        id: &str,
        owner_id: &str,
        update: &ShareUpdate,
    ) -> Result<Option<FileRecord>, CatalogError> {
        Ok(Database::update_share(self, id, owner_id, update)?)
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<bool, CatalogError> {
        Ok(self.delete_file(id, owner_id)?)
    }
}
