use crate::scan::CLAMD_DEFAULT_STREAM_MAX;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub scan: ScanConfig,
    pub auth: AuthConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Base URL used to build public share links (no trailing slash)
    pub public_base_url: String,
    /// Include internal error details in 5xx responses. Development only.
    pub expose_errors: bool,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanBackend {
    Clamd,
    None,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub backend: ScanBackend,
    /// clamd TCP address (host:port)
    pub clamd_address: String,
    pub timeout_ms: u64,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the token issuer
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024; // 100 MiB

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            gcs_bucket: None,
            gcs_credentials_file: None,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            backend: ScanBackend::None,
            clamd_address: "127.0.0.1:3310".to_string(),
            timeout_ms: 60_000,
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE);

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => StorageBackend::Gcs,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let gcs_bucket = std::env::var("GCS_BUCKET").ok();
        let gcs_credentials_file = std::env::var("GCS_CREDENTIALS_FILE").ok();

        let scan_defaults = ScanConfig::default();
        let scan_backend = match std::env::var("SCAN_BACKEND")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "clamd" => ScanBackend::Clamd,
            _ => ScanBackend::None,
        };
        let clamd_address = std::env::var("CLAMD_ADDRESS").unwrap_or(scan_defaults.clamd_address);
        let scan_timeout_ms = std::env::var("SCAN_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(scan_defaults.timeout_ms);

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                gcs_bucket,
                gcs_credentials_file,
            },
            scan: ScanConfig {
                backend: scan_backend,
                clamd_address,
                timeout_ms: scan_timeout_ms,
            },
            auth: AuthConfig { jwt_secret },
            max_upload_size,
            public_base_url,
            expose_errors: env_flag("EXPOSE_ERRORS"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.storage.backend, StorageBackend::Gcs) && self.storage.gcs_bucket.is_none()
        {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT_SECRET must be set".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.scan.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "SCAN_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.scan.backend == ScanBackend::None {
            tracing::warn!("SCAN_BACKEND is not set; uploads are stored without a content scan");
        }

        if self.exceeds_clamd_stream_limit() {
            tracing::warn!(
                max_upload_size = self.max_upload_size,
                clamd_default = CLAMD_DEFAULT_STREAM_MAX,
                "MAX_UPLOAD_SIZE is above clamd's default StreamMaxLength; raise it in clamd.conf \
                 or larger uploads will be refused by the scanner"
            );
        }

        Ok(())
    }

    /// Whether accepted uploads can be larger than a stock clamd will scan.
    pub fn exceeds_clamd_stream_limit(&self) -> bool {
        self.scan.backend == ScanBackend::Clamd && self.max_upload_size > CLAMD_DEFAULT_STREAM_MAX
    }

    /// Absolute or relative URL under which a share key can be downloaded.
    pub fn public_url(&self, public_key: &str) -> String {
        format!("{}/public/download/{public_key}", self.public_base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            node: NodeConfig {
                bind_address: "127.0.0.1:0".to_string(),
                data_dir: "./data".to_string(),
            },
            storage: StorageConfig::default(),
            scan: ScanConfig::default(),
            auth: AuthConfig {
                jwt_secret: "secret".to_string(),
            },
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            public_base_url: String::new(),
            expose_errors: false,
        }
    }

    #[test]
    fn default_limits() {
        assert_eq!(DEFAULT_MAX_UPLOAD_SIZE, 104_857_600);
        assert_eq!(ScanConfig::default().timeout_ms, 60_000);
        assert!(config().validate().is_ok());
    }

    #[test]
    fn gcs_requires_bucket() {
        let mut config = config();
        config.storage.backend = StorageBackend::Gcs;
        assert!(config.validate().is_err());

        config.storage.gcs_bucket = Some("filebox".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn secret_is_required_and_redacted() {
        let mut config = config();
        let debug = format!("{:?}", config.auth);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("\"secret\""));

        config.auth.jwt_secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn flags_uploads_above_clamd_stream_limit() {
        let mut config = config();
        assert!(!config.exceeds_clamd_stream_limit());

        config.scan.backend = ScanBackend::Clamd;
        assert!(config.exceeds_clamd_stream_limit());

        config.max_upload_size = CLAMD_DEFAULT_STREAM_MAX;
        assert!(!config.exceeds_clamd_stream_limit());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builds_public_urls() {
        let mut config = config();
        assert_eq!(config.public_url("abc"), "/public/download/abc");

        config.public_base_url = "https://files.example.com".to_string();
        assert_eq!(
            config.public_url("abc"),
            "https://files.example.com/public/download/abc"
        );
    }
}
