//! In-memory document store
//!
//! Behaves like a single Cosmos DB account: databases hold containers, items
//! are keyed by partition key and id, creating a duplicate leaves the stored
//! item alone and is billed like a point read, touching a missing item (or container) is a not-found, and every response
//! carries a deterministic request charge. Query results are split into pages
//! of a configurable size.
//!
//! Clones share the same data, so a store handed to a repository through
//! [`StoreConnector`] can still be inspected by the test that created it.

use super::query::CompiledQuery;
use crate::adapters::database::{
    ContainerRef, DocumentStore, PageStream, QueryPage, QuerySpec, StoreConnector, StoreResponse,
};
use crate::config::CosmosDbConfig;
use crate::domain::{
    ContainerId, CosmosDbError, CreateOutcome, DatabaseId, ItemId, PartitionKeyValue,
    RepositoryError, Result,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default number of documents per query page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Request charges reported by the in-memory store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeSchedule {
    /// Database or container read/creation
    pub metadata: f64,
    /// Point read; also billed for a create that finds the item present
    pub read: f64,
    /// Create or replace
    pub write: f64,
    /// Delete
    pub delete: f64,
    /// Fixed cost of each query page
    pub query_page: f64,
    /// Additional cost per document returned by a query
    pub query_document: f64,
}

impl Default for ChargeSchedule {
    fn default() -> Self {
        Self {
            metadata: 1.0,
            read: 1.0,
            write: 5.5,
            delete: 5.5,
            query_page: 2.5,
            query_document: 0.5,
        }
    }
}

/// Store operations, used for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// `create_database_if_not_exists`
    CreateDatabase,
    /// `create_container_if_not_exists`
    CreateContainer,
    /// `create_item`
    Create,
    /// `read_item`
    Read,
    /// `replace_item`
    Replace,
    /// `delete_item`
    Delete,
    /// `query_items`
    Query,
}

#[derive(Debug)]
struct ContainerState {
    partition_key_path: String,
    throughput: Option<usize>,
    next_sequence: u64,
    // (partition key, id) -> (insertion sequence, document)
    items: BTreeMap<(String, String), (u64, Value)>,
}

impl ContainerState {
    fn new(partition_key_path: &str, throughput: Option<usize>) -> Self {
        Self {
            partition_key_path: partition_key_path.to_string(),
            throughput,
            next_sequence: 0,
            items: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeMap<DatabaseId, BTreeMap<ContainerId, ContainerState>>,
}

impl State {
    fn container(&self, container: &ContainerRef) -> Result<&ContainerState> {
        self.databases
            .get(&container.database)
            .and_then(|db| db.get(&container.container))
            .ok_or_else(|| missing_container(container))
    }

    fn container_mut(&mut self, container: &ContainerRef) -> Result<&mut ContainerState> {
        self.databases
            .get_mut(&container.database)
            .and_then(|db| db.get_mut(&container.container))
            .ok_or_else(|| missing_container(container))
    }
}

fn missing_container(container: &ContainerRef) -> RepositoryError {
    CosmosDbError::NotFound(format!("Container {container} does not exist")).into()
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    page_size: usize,
    charges: ChargeSchedule,
    connects: AtomicUsize,
    calls: Mutex<HashMap<StoreOperation, usize>>,
    failures: Mutex<HashMap<StoreOperation, VecDeque<CosmosDbError>>>,
}

/// In-process [`DocumentStore`] and [`StoreConnector`]
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryStore {
    /// Creates an empty store with the default page size and charges
    pub fn new() -> Self {
        Self::with_options(DEFAULT_PAGE_SIZE, ChargeSchedule::default())
    }

    /// Creates an empty store with a page size and charge schedule
    ///
    /// A page size of zero is treated as one.
    pub fn with_options(page_size: usize, charges: ChargeSchedule) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                page_size: page_size.max(1),
                charges,
                connects: AtomicUsize::new(0),
                calls: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Sets the query page size, keeping the charge schedule
    pub fn with_page_size(page_size: usize) -> Self {
        Self::with_options(page_size, ChargeSchedule::default())
    }

    /// Charge schedule in use
    pub fn charges(&self) -> ChargeSchedule {
        self.inner.charges
    }

    /// Query page size in use
    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Makes the next call of `operation` fail with `error`
    ///
    /// Injected failures queue up and are consumed one per call.
    pub fn inject_failure(&self, operation: StoreOperation, error: CosmosDbError) {
        lock(&self.inner.failures)
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of calls made for `operation`
    pub fn call_count(&self, operation: StoreOperation) -> usize {
        lock(&self.inner.calls).get(&operation).copied().unwrap_or(0)
    }

    /// Total number of store calls across all operations
    pub fn total_calls(&self) -> usize {
        lock(&self.inner.calls).values().sum()
    }

    /// Number of times [`StoreConnector::connect`] handed out this store
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Whether the container exists
    pub fn container_exists(&self, container: &ContainerRef) -> bool {
        lock(&self.inner.state).container(container).is_ok()
    }

    /// Throughput the container was created with
    pub fn container_throughput(&self, container: &ContainerRef) -> Option<usize> {
        lock(&self.inner.state)
            .container(container)
            .ok()
            .and_then(|c| c.throughput)
    }

    /// Partition key path the container was created with
    pub fn container_partition_key_path(&self, container: &ContainerRef) -> Option<String> {
        lock(&self.inner.state)
            .container(container)
            .ok()
            .map(|c| c.partition_key_path.clone())
    }

    /// Number of items stored in the container
    pub fn item_count(&self, container: &ContainerRef) -> usize {
        lock(&self.inner.state)
            .container(container)
            .map(|c| c.items.len())
            .unwrap_or(0)
    }

    /// Raw stored document, bypassing charges and call counting
    pub fn document(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Option<Value> {
        lock(&self.inner.state).container(container).ok().and_then(|c| {
            c.items
                .get(&(partition_key.to_string(), id.to_string()))
                .map(|(_, doc)| doc.clone())
        })
    }

    fn begin(&self, operation: StoreOperation) -> Result<()> {
        *lock(&self.inner.calls).entry(operation).or_insert(0) += 1;

        let injected = lock(&self.inner.failures)
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match injected {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

fn document_id(item: &Value) -> Result<String> {
    match item.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        _ => Err(CosmosDbError::InvalidRequest(
            "The input content is invalid because the required property 'id' is missing"
                .to_string(),
        )
        .into()),
    }
}

/// The document's partition key must match the one passed with the request
fn check_partition_key(
    item: &Value,
    partition_key_path: &str,
    partition_key: &PartitionKeyValue,
) -> Result<()> {
    let extracted = partition_key_path
        .trim_start_matches('/')
        .split('/')
        .try_fold(item, |current, segment| current.get(segment));

    match extracted {
        Some(Value::String(value)) if value == partition_key.as_str() => Ok(()),
        _ => Err(CosmosDbError::InvalidRequest(format!(
            "PartitionKey extracted from document at {partition_key_path} doesn't match the one specified ({partition_key})"
        ))
        .into()),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_database_if_not_exists(
        &self,
        database: &DatabaseId,
    ) -> Result<StoreResponse<()>> {
        self.begin(StoreOperation::CreateDatabase)?;
        lock(&self.inner.state)
            .databases
            .entry(database.clone())
            .or_default();
        Ok(StoreResponse::new((), self.inner.charges.metadata))
    }

    async fn create_container_if_not_exists(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
        throughput: Option<usize>,
    ) -> Result<StoreResponse<()>> {
        self.begin(StoreOperation::CreateContainer)?;
        let mut state = lock(&self.inner.state);
        let database = state.databases.get_mut(&container.database).ok_or_else(|| {
            CosmosDbError::NotFound(format!("Database {} does not exist", container.database))
        })?;
        database
            .entry(container.container.clone())
            .or_insert_with(|| ContainerState::new(partition_key_path, throughput));
        Ok(StoreResponse::new((), self.inner.charges.metadata))
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKeyValue,
        item: Value,
    ) -> Result<StoreResponse<CreateOutcome>> {
        self.begin(StoreOperation::Create)?;
        let id = document_id(&item)?;
        let mut state = lock(&self.inner.state);
        let target = state.container_mut(container)?;
        check_partition_key(&item, &target.partition_key_path, partition_key)?;

        let key = (partition_key.as_str().to_string(), id);
        if target.items.contains_key(&key) {
            return Ok(StoreResponse::new(
                CreateOutcome::AlreadyExists,
                self.inner.charges.read,
            ));
        }

        let sequence = target.next_sequence;
        target.next_sequence += 1;
        target.items.insert(key, (sequence, item));
        Ok(StoreResponse::new(
            CreateOutcome::Created,
            self.inner.charges.write,
        ))
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &ItemId,
        partition_key: &PartitionKeyValue,
    ) -> Result<StoreResponse<Value>> {
        self.begin(StoreOperation::Read)?;
        let state = lock(&self.inner.state);
        let target = state.container(container)?;
        let key = (partition_key.as_str().to_string(), id.as_str().to_string());
        let (_, document) = target.items.get(&key).ok_or_else(|| {
            CosmosDbError::NotFound(format!("Entity with the specified id does not exist. id={id}"))
        })?;
        Ok(StoreResponse::new(document.clone(), self.inner.charges.read))
    }

    async fn replace_item(
        &self,
        container: &ContainerRef,
        id: &ItemId,
        partition_key: &PartitionKeyValue,
        item: Value,
    ) -> Result<StoreResponse<()>> {
        self.begin(StoreOperation::Replace)?;
        let body_id = document_id(&item)?;
        if body_id != id.as_str() {
            return Err(CosmosDbError::InvalidRequest(format!(
                "Document id '{body_id}' does not match the id in the request ({id})"
            ))
            .into());
        }

        let mut state = lock(&self.inner.state);
        let target = state.container_mut(container)?;
        check_partition_key(&item, &target.partition_key_path, partition_key)?;

        let key = (partition_key.as_str().to_string(), body_id);
        match target.items.get_mut(&key) {
            Some((_, document)) => {
                *document = item;
                Ok(StoreResponse::new((), self.inner.charges.write))
            }
            None => Err(CosmosDbError::NotFound(format!(
                "Entity with the specified id does not exist. id={id}"
            ))
            .into()),
        }
    }

    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &ItemId,
        partition_key: &PartitionKeyValue,
    ) -> Result<StoreResponse<()>> {
        self.begin(StoreOperation::Delete)?;
        let mut state = lock(&self.inner.state);
        let target = state.container_mut(container)?;
        let key = (partition_key.as_str().to_string(), id.as_str().to_string());
        match target.items.remove(&key) {
            Some(_) => Ok(StoreResponse::new((), self.inner.charges.delete)),
            None => Err(CosmosDbError::NotFound(format!(
                "Entity with the specified id does not exist. id={id}"
            ))
            .into()),
        }
    }

    fn query_items(&self, container: &ContainerRef, query: QuerySpec) -> Result<PageStream<'_>> {
        self.begin(StoreOperation::Query)?;
        let compiled = CompiledQuery::compile(&query)
            .map_err(|e| CosmosDbError::InvalidRequest(format!("Syntax error: {e}")))?;

        let mut matched: Vec<(u64, Value)> = {
            let state = lock(&self.inner.state);
            state
                .container(container)?
                .items
                .values()
                .filter(|(_, doc)| compiled.matches(doc))
                .cloned()
                .collect()
        };
        matched.sort_by_key(|(sequence, _)| *sequence);
        let mut documents: Vec<Value> = matched.into_iter().map(|(_, doc)| doc).collect();
        compiled.sort(&mut documents);

        let charges = self.inner.charges;
        let page_of = move |documents: Vec<Value>| QueryPage {
            request_charge: charges.query_page + charges.query_document * documents.len() as f64,
            documents,
        };

        // An empty result is still one (empty) page.
        let pages: Vec<Result<QueryPage>> = if documents.is_empty() {
            vec![Ok(page_of(Vec::new()))]
        } else {
            documents
                .chunks(self.inner.page_size)
                .map(|chunk| Ok(page_of(chunk.to_vec())))
                .collect()
        };

        Ok(stream::iter(pages).boxed())
    }
}

impl StoreConnector for InMemoryStore {
    fn connect(&self, config: &CosmosDbConfig) -> Result<Arc<dyn DocumentStore>> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(application = %config.name, "Connected to in-memory store");
        Ok(Arc::new(self.clone()))
    }
}
