use std::collections::HashSet;
use std::time::Duration;

use polybucket::config::{load_config, save_config, AppConfig};
use polybucket::{create_storage, StorageError, StorageOptions, StorageProvider, StorageSelector};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn local_provider_end_to_end() {
    let temp = TempDir::new().unwrap();
    let storage = create_storage(&StorageOptions::local(temp.path().join("data"))).unwrap();
    assert_eq!(storage.provider(), StorageProvider::Local);
    let cancel = CancellationToken::new();

    let mut a: &[u8] = b"hello";
    let mut b: &[u8] = b"world";
    storage.upload("docs", "a.txt", &mut a, &cancel).await.unwrap();
    storage.upload("docs", "b.txt", &mut b, &cancel).await.unwrap();

    let keys: HashSet<String> = storage.list("docs", None, &cancel).await.unwrap().into_iter().collect();
    let expected: HashSet<String> = ["a.txt", "b.txt"].iter().map(|s| s.to_string()).collect();
    assert_eq!(keys, expected);

    let mut out = Vec::new();
    storage.download("docs", "a.txt", &mut out, &cancel).await.unwrap();
    assert_eq!(out, b"hello");

    assert!(storage.exists("docs", "b.txt", &cancel).await.unwrap());
    let url = storage
        .presigned_url("docs", "b.txt", Duration::from_secs(60))
        .await
        .unwrap();
    assert!(url.ends_with("b.txt"));

    storage.delete("docs", "a.txt", &cancel).await.unwrap();
    assert!(!storage.exists("docs", "a.txt", &cancel).await.unwrap());

    let err = storage.delete("docs", "missing.txt", &cancel).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn provider_is_chosen_from_config_file() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.json");

    let mut config = AppConfig::default();
    config.object_storage.local_storage_path = temp.path().join("objects");
    save_config(&config_path, &config).unwrap();

    let loaded = load_config(&config_path).unwrap();
    let storage = StorageSelector::default().select(&loaded.object_storage).unwrap();
    assert_eq!(storage.provider(), StorageProvider::Local);

    let mut data: &[u8] = b"payload";
    storage
        .upload("bucket", "nested/key.bin", &mut data, &CancellationToken::new())
        .await
        .unwrap();
    assert!(temp.path().join("objects/bucket/nested/key.bin").exists());
}

#[test]
fn unsupported_provider_fails_at_selection() {
    let options = StorageOptions {
        provider: StorageProvider::DigitalOcean,
        ..StorageOptions::default()
    };
    match create_storage(&options) {
        Err(StorageError::UnsupportedProvider(name)) => assert_eq!(name, "digital_ocean"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("digital ocean should not be selectable"),
    }
}
