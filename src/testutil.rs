//! Shared test helpers for unit tests that need a full application state.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{encode, EncodingKey, Header};

use crate::config::{AuthConfig, Config, NodeConfig, ScanConfig, StorageConfig};
use crate::identity::JwtIdentity;
use crate::object_store::LocalStore;
use crate::scan::ScanGate;
use crate::service::{FileService, ServiceSettings};
use crate::storage::Database;
use crate::AppState;

pub const TEST_SECRET: &str = "filebox-test-secret";

/// Create a test AppState with a temporary catalog, local object store and the given scanner.
pub fn test_state(temp_dir: &tempfile::TempDir, scanner: Arc<dyn ScanGate>) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig::default(),
        scan: ScanConfig::default(),
        auth: AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
        },
        max_upload_size: 1024 * 1024, // 1MB for tests
        public_base_url: "http://files.test".to_string(),
        expose_errors: false,
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store = LocalStore::new(&files_dir).expect("Failed to create test object store");

    let files = FileService::new(
        Arc::new(db),
        Arc::new(object_store),
        scanner,
        ServiceSettings {
            max_upload_size: config.max_upload_size,
            scan_timeout: Duration::from_secs(5),
        },
    );

    Arc::new(AppState {
        identity: Arc::new(JwtIdentity::new(TEST_SECRET)),
        config,
        files,
    })
}

/// `Authorization` header value for a user id, signed with the test secret.
pub fn bearer_for(user_id: &str) -> String {
    let claims = serde_json::json!({
        "id": user_id,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token");
    format!("Bearer {token}")
}
