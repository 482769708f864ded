//! Generation of object keys and public share keys.

use std::future::Future;

use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};

use super::ServiceError;

/// Attempts per operation before a run of key collisions is reported as internal.
pub const MAX_KEY_ATTEMPTS: u32 = 5;

/// Public share keys are 8 random bytes, hex encoded.
const PUBLIC_KEY_BYTES: usize = 8;

/// Millisecond timestamp plus a random UUID: sortable, and unique even for
/// concurrent uploads within the same millisecond.
pub fn new_object_key() -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

pub fn new_public_key() -> Result<String, ServiceError> {
    let mut bytes = [0u8; PUBLIC_KEY_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| ServiceError::Internal("system random source unavailable".to_string()))?;
    Ok(hex::encode(bytes))
}

/// Run `attempt` with freshly generated keys until it stops reporting
/// `KeyCollision`, at most `MAX_KEY_ATTEMPTS` times.
pub async fn retry_key_collisions<T, G, F, Fut>(
    kind: &'static str,
    mut generate: G,
    mut attempt: F,
) -> Result<T, ServiceError>
where
    G: FnMut() -> Result<String, ServiceError>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    for n in 1..=MAX_KEY_ATTEMPTS {
        match attempt(generate()?).await {
            Err(ServiceError::KeyCollision) => {
                tracing::warn!(kind, attempt = n, "Key collision, retrying with a fresh key");
            }
            other => return other,
        }
    }

    tracing::error!(
        kind,
        attempts = MAX_KEY_ATTEMPTS,
        "Giving up after repeated key collisions"
    );
    Err(ServiceError::Internal(format!("could not allocate a unique {kind}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn object_keys_are_unique_and_storable() {
        let keys: HashSet<String> = (0..1000).map(|_| new_object_key()).collect();
        assert_eq!(keys.len(), 1000);
        for key in &keys {
            crate::object_store::validate_key(key).unwrap();
        }
    }

    #[test]
    fn public_keys_are_hex() {
        let key = new_public_key().unwrap();
        assert_eq!(key.len(), PUBLIC_KEY_BYTES * 2);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, new_public_key().unwrap());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_key_collisions(
            "test key",
            || Ok(format!("k{}", calls.load(Ordering::SeqCst))),
            |key| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ServiceError::KeyCollision)
                    } else {
                        Ok(key)
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(result, "k2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn bounded_attempts_surface_internal() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_key_collisions(
            "test key",
            || Ok("same".to_string()),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::KeyCollision) }
            },
        )
        .await;

        assert!(matches!(result, Err(ServiceError::Internal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_KEY_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_key_collisions(
            "test key",
            || Ok("k".to_string()),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::StorageWrite("disk full".to_string())) }
            },
        )
        .await;

        assert!(matches!(result, Err(ServiceError::StorageWrite(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
