use bytes::Bytes;
use filebox::object_store::{bytes_stream, ByteStream, LocalStore, ObjectStore, ObjectStoreError};
use futures::{stream, StreamExt, TryStreamExt};

async fn stored(store: &LocalStore, key: &str) -> bool {
    match store.get(key).await {
        Ok(_) => true,
        Err(ObjectStoreError::NotFound(_)) => false,
        Err(e) => panic!("unexpected error: {e}"),
    }
}

async fn collect(body: ByteStream) -> Vec<u8> {
    body.map_ok(|chunk| chunk.to_vec())
        .try_concat()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_local_store_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store
        .put("test-key", bytes_stream(Bytes::from("hello world")))
        .await
        .unwrap();

    let retrieved = collect(store.get("test-key").await.unwrap()).await;
    assert_eq!(retrieved, b"hello world");
}

#[tokio::test]
async fn test_local_store_multi_chunk_put() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let chunks: Vec<std::io::Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"first ")),
        Ok(Bytes::from_static(b"second ")),
        Ok(Bytes::from_static(b"third")),
    ];
    store
        .put("chunked", stream::iter(chunks).boxed())
        .await
        .unwrap();

    let retrieved = collect(store.get("chunked").await.unwrap()).await;
    assert_eq!(retrieved, b"first second third");
}

#[tokio::test]
async fn test_local_store_put_is_create_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store
        .put("taken", bytes_stream(Bytes::from("original")))
        .await
        .unwrap();

    let result = store
        .put("taken", bytes_stream(Bytes::from("replacement")))
        .await;
    assert!(matches!(result, Err(ObjectStoreError::AlreadyExists(_))));

    let retrieved = collect(store.get("taken").await.unwrap()).await;
    assert_eq!(retrieved, b"original");
}

#[tokio::test]
async fn test_local_store_failed_stream_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let chunks: Vec<std::io::Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"partial")),
        Err(std::io::Error::other("client went away")),
    ];
    let result = store.put("broken", stream::iter(chunks).boxed()).await;
    assert!(result.is_err());
    assert!(!stored(&store, "broken").await);
}

#[tokio::test]
async fn test_local_store_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store
        .put("to-delete", bytes_stream(Bytes::from("data")))
        .await
        .unwrap();
    store.delete("to-delete").await.unwrap();
    assert!(!stored(&store, "to-delete").await);
}

#[tokio::test]
async fn test_local_store_delete_nonexistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.delete("nonexistent").await.unwrap();
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.get("missing").await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_rejects_path_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("objects")).unwrap();

    let result = store
        .put("../escape", bytes_stream(Bytes::from("data")))
        .await;
    assert!(matches!(result, Err(ObjectStoreError::InvalidKey(_))));
    assert!(!dir.path().join("escape").exists());

    assert!(matches!(
        store.get("a/b").await,
        Err(ObjectStoreError::InvalidKey(_))
    ));
}
