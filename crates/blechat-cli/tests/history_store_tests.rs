//! File-backed history store behaviour

use blechat_cli::FileHistoryStore;
use blechat_core::{BlechatError, HistoryStore, Message, Timestamp};
use tempfile::TempDir;

fn conversation() -> Vec<Message> {
    vec![
        Message::local("hello", Timestamp::new(1_000)),
        Message::remote("Echo: hello", Timestamp::new(1_300)),
    ]
}

#[tokio::test]
async fn test_missing_history_loads_empty() {
    let dir = TempDir::new().unwrap();
    let store = FileHistoryStore::new(dir.path());

    let messages = store.load("mock-alpha").await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_saved_history_loads_back() {
    let dir = TempDir::new().unwrap();
    let store = FileHistoryStore::new(dir.path().join("nested").join("history"));
    let messages = conversation();

    store.save("AA:BB:CC:DD:EE:FF", &messages).await.unwrap();

    assert!(store.path_for("AA:BB:CC:DD:EE:FF").exists());
    assert_eq!(store.load("AA:BB:CC:DD:EE:FF").await.unwrap(), messages);
    assert!(store.load("mock-beta").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_replaces_previous_history() {
    let dir = TempDir::new().unwrap();
    let store = FileHistoryStore::new(dir.path());
    let messages = conversation();

    store.save("mock-alpha", &messages).await.unwrap();
    store.save("mock-alpha", &messages[..1]).await.unwrap();

    assert_eq!(store.load("mock-alpha").await.unwrap(), messages[..1].to_vec());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1);
}

#[tokio::test]
async fn test_corrupt_history_is_a_storage_error() {
    let dir = TempDir::new().unwrap();
    let store = FileHistoryStore::new(dir.path());
    std::fs::write(store.path_for("mock-alpha"), "not json").unwrap();

    let result = store.load("mock-alpha").await;
    assert!(matches!(result, Err(BlechatError::Storage(_))));
}
