//! Integration tests for the document repository against the in-memory store

use cosmos_repository::adapters::database::ContainerRef;
use cosmos_repository::adapters::memory::{ChargeSchedule, InMemoryStore, StoreOperation};
use cosmos_repository::config::CosmosDbConfig;
use cosmos_repository::core::DocumentRepository;
use cosmos_repository::domain::{
    ContainerId, CosmosDbError, CreateOutcome, DatabaseId, Lookup, RepositoryError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use test_case::test_case;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Order {
    id: String,
    pk: String,
    total: u32,
}

fn order(id: &str, pk: &str, total: u32) -> Order {
    Order {
        id: id.to_string(),
        pk: pk.to_string(),
        total,
    }
}

fn config() -> CosmosDbConfig {
    CosmosDbConfig::new("https://e.documents.azure.com:443/", "K", "N")
}

fn target() -> ContainerRef {
    ContainerRef::new(
        DatabaseId::new("db1").unwrap(),
        ContainerId::new("cont1").unwrap(),
    )
}

async fn initialized(store: &InMemoryStore) -> DocumentRepository<Order> {
    let mut repo = DocumentRepository::with_connector(config(), store.clone());
    repo.init("db1", "cont1").await.unwrap();
    repo
}

fn status(err: &RepositoryError) -> Option<u16> {
    err.as_cosmos().and_then(CosmosDbError::status)
}

#[tokio::test]
async fn test_create_then_read_returns_same_item() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;

    let item = order("x", "p", 10);
    let outcome = repo.create_item(&item, "x", "p").await.unwrap();
    assert_eq!(outcome, CreateOutcome::Created);

    let read = repo.read_item("x", "p").await.unwrap();
    assert_eq!(read, Lookup::Found(item));
    assert!(repo.total_request_charge() > 0.0);
    assert_eq!(repo.metrics().request_count, 2);
}

#[tokio::test]
async fn test_init_provisions_database_and_container() {
    let store = InMemoryStore::new();
    let config = config()
        .with_partition_key_path("/tenant")
        .with_throughput(None);
    let mut repo = DocumentRepository::<Order>::with_connector(config, store.clone());

    repo.init("db1", "cont1").await.unwrap();

    assert!(repo.is_initialized());
    assert_eq!(repo.database_id().map(DatabaseId::as_str), Some("db1"));
    assert_eq!(repo.container_id().map(ContainerId::as_str), Some("cont1"));
    assert!(store.container_exists(&target()));
    assert_eq!(
        store.container_partition_key_path(&target()).as_deref(),
        Some("/tenant")
    );
    assert_eq!(store.container_throughput(&target()), None);
    assert_eq!(store.connect_count(), 1);
}

#[tokio::test]
async fn test_init_twice_keeps_existing_items() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;
    repo.create_item(&order("x", "p", 1), "x", "p").await.unwrap();

    let again = initialized(&store).await;
    assert!(again.read_item("x", "p").await.unwrap().is_found());
    assert_eq!(store.container_throughput(&target()), Some(400));
}

#[tokio::test]
async fn test_init_failure_leaves_repository_uninitialized() {
    let store = InMemoryStore::new();
    store.inject_failure(
        StoreOperation::CreateDatabase,
        CosmosDbError::from_status(503, "Service unavailable"),
    );
    let mut repo = DocumentRepository::<Order>::with_connector(config(), store.clone());

    let err = repo.init("db1", "cont1").await.unwrap_err();

    assert_eq!(status(&err), Some(503));
    assert!(!repo.is_initialized());
}

#[tokio::test]
async fn test_load_makes_no_remote_calls() {
    let store = InMemoryStore::new();
    let mut repo = DocumentRepository::<Order>::with_connector(config(), store.clone());

    repo.load("db1", "cont1").unwrap();

    assert!(repo.is_initialized());
    assert_eq!(store.connect_count(), 1);
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn test_load_of_missing_container_fails_on_query() {
    let store = InMemoryStore::new();
    let mut repo = DocumentRepository::<Order>::with_connector(config(), store.clone());
    repo.load("db1", "cont1").unwrap();

    let err = repo.query_items("SELECT * FROM c").await.unwrap_err();
    assert!(err.is_not_found());
}

#[test_case("", "K", "N" ; "missing endpoint")]
#[test_case("https://e.documents.azure.com:443/", "", "N" ; "missing key")]
#[test_case("https://e.documents.azure.com:443/", "K", "  " ; "missing name")]
#[tokio::test]
async fn test_init_with_missing_settings_never_connects(endpoint: &str, key: &str, name: &str) {
    let store = InMemoryStore::new();
    let config = CosmosDbConfig::new(endpoint, key, name);
    let mut repo = DocumentRepository::<Order>::with_connector(config, store.clone());

    let err = repo.init("db1", "cont1").await.unwrap_err();
    assert!(matches!(err, RepositoryError::Configuration(_)));

    let err = repo.load("db1", "cont1").unwrap_err();
    assert!(matches!(err, RepositoryError::Configuration(_)));

    assert!(!repo.is_initialized());
    assert_eq!(store.connect_count(), 0);
    assert_eq!(store.total_calls(), 0);
}

#[test_case("", "cont1" ; "missing database id")]
#[test_case("db1", " " ; "missing container id")]
#[tokio::test]
async fn test_init_with_blank_identifiers_fails(database: &str, container: &str) {
    let store = InMemoryStore::new();
    let mut repo = DocumentRepository::<Order>::with_connector(config(), store.clone());

    let err = repo.init(database, container).await.unwrap_err();

    assert!(matches!(err, RepositoryError::Configuration(_)));
    assert_eq!(store.connect_count(), 0);
}

#[tokio::test]
async fn test_operations_before_init_are_rejected() {
    let store = InMemoryStore::new();
    let repo = DocumentRepository::<Order>::with_connector(config(), store.clone());
    let item = order("x", "p", 1);

    let results = [
        repo.create_item(&item, "x", "p").await.map(|_| ()),
        repo.read_item("x", "p").await.map(|_| ()),
        repo.update_item(&item, "x", "p").await.map(|_| ()),
        repo.delete_item("x", "p").await.map(|_| ()),
        repo.query_items("SELECT * FROM c").await.map(|_| ()),
        repo.query_documents("SELECT * FROM c").await.map(|_| ()),
    ];

    for result in results {
        assert!(matches!(result, Err(RepositoryError::Uninitialized(_))));
    }
    assert_eq!(store.total_calls(), 0);
    assert_eq!(repo.metrics().request_count, 0);
}

#[tokio::test]
async fn test_create_twice_leaves_first_item_unchanged() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;

    let first = repo.create_item(&order("x", "p", 1), "x", "p").await.unwrap();
    let after_first = repo.metrics();
    let second = repo.create_item(&order("x", "p", 99), "x", "p").await.unwrap();
    let after_second = repo.metrics();

    assert_eq!(first, CreateOutcome::Created);
    assert_eq!(second, CreateOutcome::AlreadyExists);
    assert_eq!(after_second.request_count, after_first.request_count + 1);
    assert!(
        (after_second.total_request_charge
            - after_first.total_request_charge
            - ChargeSchedule::default().read)
            .abs()
            < 1e-9
    );
    assert_eq!(
        store.document(&target(), "x", "p"),
        Some(json!({"id": "x", "pk": "p", "total": 1}))
    );
    assert_eq!(store.item_count(&target()), 1);
}

#[tokio::test]
async fn test_same_id_in_other_partition_is_a_new_item() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;

    repo.create_item(&order("x", "p", 1), "x", "p").await.unwrap();
    let outcome = repo.create_item(&order("x", "q", 2), "x", "q").await.unwrap();

    assert_eq!(outcome, CreateOutcome::Created);
    assert_eq!(store.item_count(&target()), 2);
}

#[tokio::test]
async fn test_stored_document_of_wrong_shape_is_a_serialization_error() {
    let store = InMemoryStore::new();
    let mut raw = DocumentRepository::<Value>::with_connector(config(), store.clone());
    raw.init("db1", "cont1").await.unwrap();
    raw.create_item(&json!({"id": "bad", "pk": "p", "total": "lots"}), "bad", "p")
        .await
        .unwrap();
    let repo = initialized(&store).await;

    let read = repo.read_item("bad", "p").await;
    let query = repo.query_items("SELECT * FROM c").await;

    assert!(matches!(read, Err(RepositoryError::Serialization(_))));
    assert!(matches!(query, Err(RepositoryError::Serialization(_))));
    assert_eq!(
        store.document(&target(), "bad", "p"),
        Some(json!({"id": "bad", "pk": "p", "total": "lots"}))
    );
}

#[tokio::test]
async fn test_read_missing_item_returns_not_found() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;

    let read = repo.read_item("nope", "p").await.unwrap();

    assert!(read.is_not_found());
    assert_eq!(read.unwrap_or_default(), Order::default());
}

#[tokio::test]
async fn test_update_replaces_existing_item() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;
    repo.create_item(&order("x", "p", 1), "x", "p").await.unwrap();

    let updated = repo.update_item(&order("x", "p", 2), "x", "p").await.unwrap();

    assert_eq!(updated, Lookup::Found(order("x", "p", 2)));
    assert_eq!(
        repo.read_item("x", "p").await.unwrap().into_option(),
        Some(order("x", "p", 2))
    );
}

#[tokio::test]
async fn test_update_missing_item_does_not_create_it() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;

    let updated = repo.update_item(&order("x", "p", 2), "x", "p").await.unwrap();

    assert!(updated.is_not_found());
    assert_eq!(store.item_count(&target()), 0);
}

#[tokio::test]
async fn test_delete_existing_and_missing_items() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;
    repo.create_item(&order("x", "p", 1), "x", "p").await.unwrap();

    assert!(repo.delete_item("x", "p").await.unwrap().is_found());
    assert!(repo.delete_item("x", "p").await.unwrap().is_not_found());
    assert_eq!(store.item_count(&target()), 0);
}

#[tokio::test]
async fn test_item_id_mismatch_is_rejected_locally() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;
    let calls_before = store.total_calls();

    let err = repo.create_item(&order("x", "p", 1), "y", "p").await.unwrap_err();

    assert!(matches!(err, RepositoryError::InvalidArgument(_)));
    assert_eq!(store.total_calls(), calls_before);
}

#[tokio::test]
async fn test_partition_key_mismatch_is_reported() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;

    let err = repo.create_item(&order("x", "p", 1), "x", "other").await.unwrap_err();

    assert_eq!(status(&err), Some(400));
}

#[tokio::test]
async fn test_query_concatenates_pages_and_sums_charges() {
    let store = InMemoryStore::with_page_size(2);
    let repo = initialized(&store).await;
    for i in 0..5 {
        let id = format!("o-{i}");
        repo.create_item(&order(&id, "p", i), &id, "p").await.unwrap();
    }
    let before = repo.metrics();

    let orders = repo.query_items("SELECT * FROM c").await.unwrap();

    let totals: Vec<u32> = orders.iter().map(|o| o.total).collect();
    assert_eq!(totals, vec![0, 1, 2, 3, 4]);

    // pages of 2, 2 and 1 documents
    let charges = ChargeSchedule::default();
    let expected = 3.0 * charges.query_page + 5.0 * charges.query_document;
    let after = repo.metrics();
    assert!((after.total_request_charge - before.total_request_charge - expected).abs() < 1e-9);
    assert_eq!(after.request_count - before.request_count, 3);
    assert_eq!(store.call_count(StoreOperation::Query), 1);
}

#[tokio::test]
async fn test_query_documents_returns_raw_values() {
    let store = InMemoryStore::with_page_size(1);
    let repo = initialized(&store).await;
    repo.create_item(&order("a", "p", 1), "a", "p").await.unwrap();
    repo.create_item(&order("b", "q", 2), "b", "q").await.unwrap();

    let documents: Vec<Value> = repo
        .query_documents("SELECT * FROM c ORDER BY c.total DESC")
        .await
        .unwrap();

    assert_eq!(
        documents,
        vec![
            json!({"id": "b", "pk": "q", "total": 2}),
            json!({"id": "a", "pk": "p", "total": 1}),
        ]
    );
}

#[tokio::test]
async fn test_query_with_no_results_is_empty() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;

    let orders = repo
        .query_items("SELECT * FROM c WHERE c.pk = 'none'")
        .await
        .unwrap();

    assert!(orders.is_empty());
    assert_eq!(repo.metrics().request_count, 1);
}

#[tokio::test]
async fn test_query_with_parameters() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;
    repo.create_item(&order("a", "p", 5), "a", "p").await.unwrap();
    repo.create_item(&order("b", "p", 50), "b", "p").await.unwrap();
    repo.create_item(&order("c", "q", 500), "c", "q").await.unwrap();

    let orders = repo
        .query_items_with_parameters(
            "SELECT * FROM c WHERE c.pk = @pk AND c.total > @min",
            &[("@pk", json!("p")), ("@min", json!(10))],
        )
        .await
        .unwrap();

    assert_eq!(orders, vec![order("b", "p", 50)]);
}

#[tokio::test]
async fn test_query_parameter_names_need_at_sign() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;
    let calls_before = store.total_calls();

    let err = repo
        .query_items_with_parameters("SELECT * FROM c WHERE c.pk = @pk", &[("pk", json!("p"))])
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::InvalidArgument(_)));
    assert_eq!(store.total_calls(), calls_before);
}

#[tokio::test]
async fn test_malformed_query_is_an_error() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;

    let err = repo.query_items("SELECT FROM").await.unwrap_err();

    assert_eq!(status(&err), Some(400));
}

#[test_case(StoreOperation::Create ; "create")]
#[test_case(StoreOperation::Read ; "read")]
#[test_case(StoreOperation::Replace ; "replace")]
#[test_case(StoreOperation::Delete ; "delete")]
#[test_case(StoreOperation::Query ; "query")]
#[tokio::test]
async fn test_service_errors_propagate(operation: StoreOperation) {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;
    store.inject_failure(operation, CosmosDbError::from_status(503, "Service unavailable"));
    let item = order("x", "p", 1);

    let result = match operation {
        StoreOperation::Create => repo.create_item(&item, "x", "p").await.map(|_| ()),
        StoreOperation::Read => repo.read_item("x", "p").await.map(|_| ()),
        StoreOperation::Replace => repo.update_item(&item, "x", "p").await.map(|_| ()),
        StoreOperation::Delete => repo.delete_item("x", "p").await.map(|_| ()),
        _ => repo.query_items("SELECT * FROM c").await.map(|_| ()),
    };

    let err = result.unwrap_err();
    assert_eq!(status(&err), Some(503));
    assert_eq!(repo.total_request_charge(), 0.0);
}

#[tokio::test]
async fn test_throttling_propagates() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;
    store.inject_failure(
        StoreOperation::Read,
        CosmosDbError::from_status(429, "Request rate is large"),
    );

    let err = repo.read_item("x", "p").await.unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::CosmosDb(CosmosDbError::Throttled(_))
    ));
    assert_eq!(repo.metrics().request_count, 1);
}

#[tokio::test]
async fn test_query_not_found_is_not_absorbed() {
    let store = InMemoryStore::new();
    let repo = initialized(&store).await;
    store.inject_failure(StoreOperation::Query, CosmosDbError::from_status(404, "gone"));

    let err = repo.query_documents("SELECT * FROM c").await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_charges_follow_schedule() {
    let charges = ChargeSchedule {
        metadata: 1.0,
        read: 2.0,
        write: 10.0,
        delete: 7.0,
        query_page: 3.0,
        query_document: 1.0,
    };
    let store = InMemoryStore::with_options(10, charges);
    let repo = initialized(&store).await;

    repo.create_item(&order("x", "p", 1), "x", "p").await.unwrap();
    repo.read_item("x", "p").await.unwrap();
    repo.update_item(&order("x", "p", 2), "x", "p").await.unwrap();
    repo.delete_item("x", "p").await.unwrap();

    // init is not counted
    assert!((repo.total_request_charge() - 29.0).abs() < 1e-9);
    assert_eq!(repo.metrics().request_count, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_accumulate_exact_totals() {
    let store = InMemoryStore::new();
    let repo = Arc::new(initialized(&store).await);

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                let id = format!("o-{i}");
                let pk = format!("p-{}", i % 5);
                repo.create_item(&order(&id, &pk, i), &id, &pk).await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), CreateOutcome::Created);
    }

    let metrics = repo.metrics();
    assert_eq!(metrics.request_count, 50);
    assert!((metrics.total_request_charge - 50.0 * ChargeSchedule::default().write).abs() < 1e-9);
    assert_eq!(store.item_count(&target()), 50);
}

#[tokio::test]
async fn test_untyped_repository() {
    let store = InMemoryStore::new();
    let mut repo = DocumentRepository::<Value>::with_connector(config(), store.clone());
    repo.init("db1", "cont1").await.unwrap();

    let outcome = repo
        .create_item(&json!({"pk": "p", "tags": ["a", "b"]}), "doc-1", "p")
        .await
        .unwrap();
    assert_eq!(outcome, CreateOutcome::Created);

    let stored = repo.read_item("doc-1", "p").await.unwrap().into_option();
    assert_eq!(
        stored,
        Some(json!({"id": "doc-1", "pk": "p", "tags": ["a", "b"]}))
    );
}
