//! Collaborator doubles for exercising the coordinators' failure paths.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use filebox::object_store::{ByteStream, LocalStore, ObjectStore, ObjectStoreError};
use filebox::scan::{NoopScanner, ScanError, ScanGate, ScanVerdict};
use filebox::service::{FileService, NewUpload, ServiceSettings};
use filebox::storage::models::{ContentCategory, FileRecord, ShareUpdate};
use filebox::storage::{Catalog, CatalogError, Constraint, Database};

pub const MAX_UPLOAD: u64 = 1024;

/// Catalog over a real database with switchable faults.
pub struct FlakyCatalog {
    pub inner: Database,
    pub fail_inserts: AtomicBool,
    pub fail_deletes: AtomicBool,
    /// Number of upcoming share enables answered with a public key conflict.
    pub share_conflicts: AtomicUsize,
    pub attempted_keys: Mutex<Vec<String>>,
    pub attempted_public_keys: Mutex<Vec<String>>,
}

impl FlakyCatalog {
    pub fn new(inner: Database) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            share_conflicts: AtomicUsize::new(0),
            attempted_keys: Mutex::new(Vec::new()),
            attempted_public_keys: Mutex::new(Vec::new()),
        }
    }
}

/// Decrement `counter` if it is positive, reporting whether it was.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Catalog for FlakyCatalog {
    async fn insert(&self, file: &FileRecord) -> Result<(), CatalogError> {
        self.attempted_keys
            .lock()
            .unwrap()
            .push(file.object_key.clone());
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(CatalogError::Backend("catalog unavailable".to_string()));
        }
        Catalog::insert(&self.inner, file).await
    }

    async fn find_by_id_and_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<FileRecord>, CatalogError> {
        self.inner.find_by_id_and_owner(id, owner_id).await
    }

    async fn find_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<FileRecord>, CatalogError> {
        self.inner.find_by_public_key(public_key).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, CatalogError> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn update_share(
        &self,
        id: &str,
        owner_id: &str,
        update: &ShareUpdate,
    ) -> Result<Option<FileRecord>, CatalogError> {
        if let ShareUpdate::Enable { public_key } = update {
            self.attempted_public_keys
                .lock()
                .unwrap()
                .push(public_key.clone());
            if take_one(&self.share_conflicts) {
                return Err(CatalogError::Conflict(Constraint::PublicKey));
            }
        }
        Catalog::update_share(&self.inner, id, owner_id, update).await
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<bool, CatalogError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CatalogError::Backend("catalog unavailable".to_string()));
        }
        Catalog::delete(&self.inner, id, owner_id).await
    }
}

/// Local store that counts writes and can be told to refuse puts or fail deletes.
pub struct CountingStore {
    pub inner: LocalStore,
    pub puts: AtomicUsize,
    /// Number of upcoming puts answered with `AlreadyExists`.
    pub taken_keys: AtomicUsize,
    pub put_keys: Mutex<Vec<String>>,
    pub fail_deletes: AtomicBool,
}

impl CountingStore {
    pub fn new(inner: LocalStore) -> Self {
        Self {
            inner,
            puts: AtomicUsize::new(0),
            taken_keys: AtomicUsize::new(0),
            put_keys: Mutex::new(Vec::new()),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Whether an object is stored under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        match self.inner.get(key).await {
            Ok(_) => true,
            Err(ObjectStoreError::NotFound(_)) => false,
            Err(e) => panic!("unexpected store error: {e}"),
        }
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn put(&self, key: &str, data: ByteStream) -> Result<(), ObjectStoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.put_keys.lock().unwrap().push(key.to_string());
        if take_one(&self.taken_keys) {
            return Err(ObjectStoreError::AlreadyExists(key.to_string()));
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<ByteStream, ObjectStoreError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend("delete refused".to_string()));
        }
        self.inner.delete(key).await
    }
}

/// Rejects every upload with fixed reasons.
pub struct RejectingScanner(pub Vec<String>);

#[async_trait]
impl ScanGate for RejectingScanner {
    async fn scan(&self, _data: &Bytes) -> Result<ScanVerdict, ScanError> {
        Ok(ScanVerdict::Reject(self.0.clone()))
    }
}

/// Never answers.
pub struct HangingScanner;

#[async_trait]
impl ScanGate for HangingScanner {
    async fn scan(&self, _data: &Bytes) -> Result<ScanVerdict, ScanError> {
        std::future::pending().await
    }
}

/// Fails as if the scanner daemon were unreachable.
pub struct BrokenScanner;

#[async_trait]
impl ScanGate for BrokenScanner {
    async fn scan(&self, _data: &Bytes) -> Result<ScanVerdict, ScanError> {
        Err(ScanError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }
}

pub struct Harness {
    pub _dir: tempfile::TempDir,
    pub catalog: Arc<FlakyCatalog>,
    pub store: Arc<CountingStore>,
    pub service: Arc<FileService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_scanner(Arc::new(NoopScanner))
    }

    pub fn with_scanner(scanner: Arc<dyn ScanGate>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(FlakyCatalog::new(
            Database::open(dir.path().join("data")).unwrap(),
        ));
        let store = Arc::new(CountingStore::new(
            LocalStore::new(dir.path().join("objects")).unwrap(),
        ));
        let service = Arc::new(FileService::new(
            catalog.clone(),
            store.clone(),
            scanner,
            ServiceSettings {
                max_upload_size: MAX_UPLOAD,
                scan_timeout: Duration::from_millis(100),
            },
        ));

        Self {
            _dir: dir,
            catalog,
            store,
            service,
        }
    }

    /// Number of objects physically present in the store.
    pub fn object_count(&self) -> usize {
        std::fs::read_dir(self._dir.path().join("objects"))
            .unwrap()
            .count()
    }
}

pub fn new_upload(name: &str, category: ContentCategory) -> NewUpload {
    NewUpload {
        declared_name: name.to_string(),
        category,
        ..Default::default()
    }
}

pub async fn read_all(body: ByteStream) -> Vec<u8> {
    use futures::TryStreamExt;
    body.map_ok(|chunk| chunk.to_vec())
        .try_concat()
        .await
        .unwrap()
}
