use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{validate_key, ByteStream, ObjectStore, ObjectStoreError};

/// Access tokens live for an hour; refresh well before that.
const TOKEN_REFRESH_AFTER: Duration = Duration::from_secs(50 * 60);

/// Google Cloud Storage object store backend, scoped to a single bucket.
pub struct GcsStore {
    bucket: String,
    client: Client,
    access_token: RwLock<CachedToken>,
    credentials_file: Option<String>,
}

struct CachedToken {
    value: String,
    fetched_at: Instant,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GcsStore {
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        let store = Self {
            bucket: bucket.to_string(),
            client,
            access_token: RwLock::new(CachedToken {
                value: String::new(),
                fetched_at: Instant::now(),
            }),
            credentials_file: credentials_file.map(|s| s.to_string()),
        };

        store.refresh_token().await?;
        Ok(store)
    }

    async fn refresh_token(&self) -> Result<String, anyhow::Error> {
        let token = if let Some(ref creds_path) = self.credentials_file {
            self.token_from_service_account(creds_path).await?
        } else {
            self.token_from_metadata_server().await?
        };

        let mut lock = self.access_token.write().await;
        *lock = CachedToken {
            value: token.clone(),
            fetched_at: Instant::now(),
        };
        Ok(token)
    }

    async fn token(&self) -> Result<String, ObjectStoreError> {
        {
            let cached = self.access_token.read().await;
            if !cached.value.is_empty() && cached.fetched_at.elapsed() < TOKEN_REFRESH_AFTER {
                return Ok(cached.value.clone());
            }
        }

        tracing::debug!(bucket = %self.bucket, "Refreshing GCS access token");
        self.refresh_token()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("GCS token refresh failed: {e}")))
    }

    async fn token_from_service_account(&self, path: &str) -> Result<String, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    async fn token_from_metadata_server(&self) -> Result<String, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    /// `ifGenerationMatch=0` makes the upload fail with 412 when the object already exists.
    fn upload_url(&self, key: &str) -> String {
        format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{}/o?uploadType=media&ifGenerationMatch=0&name={}",
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}",
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn media_url(&self, key: &str) -> String {
        format!("{}?alt=media", self.object_url(key))
    }
}

async fn backend_failure(action: &str, resp: reqwest::Response) -> ObjectStoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    ObjectStoreError::Backend(format!("GCS {action} failed ({status}): {body}"))
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, data: ByteStream) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        let token = self.token().await?;

        let resp = self
            .client
            .post(self.upload_url(key))
            .bearer_auth(&token)
            .header("Content-Type", "application/octet-stream")
            .body(Body::wrap_stream(data))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::PRECONDITION_FAILED {
            return Err(ObjectStoreError::AlreadyExists(key.to_string()));
        }

        if !resp.status().is_success() {
            return Err(backend_failure("upload", resp).await);
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ByteStream, ObjectStoreError> {
        validate_key(key)?;
        let token = self.token().await?;

        let resp = self
            .client
            .get(self.media_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            return Err(backend_failure("download", resp).await);
        }

        Ok(Box::pin(resp.bytes_stream().map_err(std::io::Error::other)))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        let token = self.token().await?;

        let resp = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        // 404 is fine -- object already gone
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            return Err(backend_failure("delete", resp).await);
        }

        Ok(())
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    // Strip PEM armor and decode the base64 DER body
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}
