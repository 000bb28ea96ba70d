use slop_core::config::{EndpointConfig, EndpointKind, SettingsStore};
use slop_core::session::SessionStore;
use slop_infrastructure::FileKeyValueStore;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_sessions_persist_across_store_instances() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.toml");

    let id = {
        let store = SessionStore::new(Arc::new(FileKeyValueStore::open(&path).await.unwrap()));
        let mut session = store.create_new().await.unwrap();
        session.prompt_input = "write a story about a lighthouse keeper".to_string();
        let mut history = session.history();
        history.append("---\nname: x\n---\nBody");
        session.set_history(history);
        store.save(&mut session).await.unwrap();
        session.id
    };

    let store = SessionStore::new(Arc::new(FileKeyValueStore::open(&path).await.unwrap()));
    assert_eq!(store.current_id().await.unwrap(), Some(id.clone()));

    let loaded = store.get(&id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "write a story about a lighthou...");
    assert_eq!(loaded.result_history, vec!["---\nname: x\n---\nBody".to_string()]);
    assert_eq!(loaded.current_history_index, 0);
}

#[tokio::test]
async fn test_settings_persist_without_key() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.toml");
    let kv = Arc::new(FileKeyValueStore::open(&path).await.unwrap());
    let settings = SettingsStore::new(kv.clone());

    let endpoint = EndpointConfig::new("http://remote:8080/v1/", "qwen", "sk-123");
    settings.save_endpoint(EndpointKind::Chat, &endpoint).await.unwrap();

    let loaded = SettingsStore::new(Arc::new(FileKeyValueStore::open(&path).await.unwrap()))
        .load_client_config()
        .await
        .unwrap();
    assert_eq!(loaded.chat.base_url, "http://remote:8080/v1");
    assert_eq!(loaded.chat.model, "qwen");
    assert_eq!(loaded.chat.api_key, "");
    assert!(!std::fs::read_to_string(&path).unwrap().contains("sk-123"));
}
