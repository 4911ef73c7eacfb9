//! Integration tests for logging functionality
//!
//! A process can install only one global subscriber, so everything that
//! depends on an installed subscriber lives in a single test.

use cosmos_repository::adapters::memory::InMemoryStore;
use cosmos_repository::config::{CosmosDbConfig, LoggingConfig};
use cosmos_repository::core::DocumentRepository;
use cosmos_repository::domain::RepositoryError;
use cosmos_repository::logging::init_logging;
use serde_json::{json, Value};
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_path, "./logs");
    assert_eq!(config.local_rotation, "daily");
    assert_eq!(config.file_prefix, "cosmos-repository.log");
}

#[test]
fn test_invalid_level_is_rejected() {
    let result = init_logging("loud", &LoggingConfig::default());
    assert!(matches!(result, Err(RepositoryError::Configuration(_))));
}

#[test]
fn test_invalid_rotation_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = LoggingConfig {
        local_enabled: true,
        local_path: temp_dir.path().to_string_lossy().to_string(),
        local_rotation: "weekly".to_string(),
        file_prefix: "rotation.log".to_string(),
    };

    let result = init_logging("info", &config);
    assert!(matches!(result, Err(RepositoryError::Configuration(_))));
}

#[tokio::test]
async fn test_file_logging_captures_repository_events() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("logs");
    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_dir.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
        file_prefix: "repository.log".to_string(),
    };

    let guard = init_logging("debug", &config).unwrap();
    assert!(log_dir.exists());

    let store = InMemoryStore::new();
    let cosmos = CosmosDbConfig::new("https://local.documents.azure.com:443/", "key", "logging-test");
    let mut repo = DocumentRepository::<Value>::with_connector(cosmos, store);
    repo.init("db1", "cont1").await.unwrap();
    repo.create_item(&json!({"id": "a", "pk": "p"}), "a", "p")
        .await
        .unwrap();
    assert!(repo.read_item("missing", "p").await.unwrap().is_not_found());
    let matched = repo
        .query_items_with_parameters("SELECT * FROM c WHERE c.pk = @pk", &[("@pk", json!("p"))])
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);

    // A second global subscriber is refused
    assert!(init_logging("info", &LoggingConfig::default()).is_err());

    drop(guard);

    let log_file = log_dir.join("repository.log");
    assert!(log_file.exists());

    if std::env::var("RUST_LOG").is_err() {
        let contents = std::fs::read_to_string(&log_file).unwrap();
        assert!(contents.contains("Logging initialized"));
        assert!(contents.contains("Item not found"));
        assert!(contents.contains("query_items_with_parameters"));
    }
}
