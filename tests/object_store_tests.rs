use bytes::Bytes;
use link_sharer::object_store::{LocalStore, ObjectStore, ObjectStoreError};

#[tokio::test]
async fn test_local_store_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let data = Bytes::from(r#"{"queries":[]}"#);
    store.put("47DEQpj8HBS", data.clone()).await.unwrap();

    let retrieved = store.get("47DEQpj8HBS").await.unwrap();
    assert_eq!(retrieved, data);
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.get("missing").await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("key", Bytes::from("first")).await.unwrap();
    store.put("key", Bytes::from("second")).await.unwrap();

    let data = store.get("key").await.unwrap();
    assert_eq!(data, Bytes::from("second"));
}

#[tokio::test]
async fn test_local_store_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("abc-_123", Bytes::from("data")).await.unwrap();

    let entries: Vec<_> = std::fs::read_dir(store.base_path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec!["abc-_123".to_string()]);
}

#[tokio::test]
async fn test_local_store_rejects_path_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("objects")).unwrap();

    let result = store.put("../escape", Bytes::from("data")).await;
    assert!(matches!(result, Err(ObjectStoreError::Backend(_))));
    assert!(!dir.path().join("escape").exists());

    // Lookups of such names simply miss.
    let result = store.get("../escape").await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}
