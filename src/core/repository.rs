//! Typed document repository
//!
//! [`DocumentRepository`] wraps one Cosmos DB container. It owns the client
//! configuration, connects through a [`StoreConnector`] during
//! [`init`](DocumentRepository::init) or [`load`](DocumentRepository::load),
//! and then offers create, read, update, delete and query operations on items
//! of type `T`.
//!
//! Every remote call is timed, and its request charge is added to the
//! repository's running totals (see [`RequestMetrics`]). Not-found responses
//! on point operations are part of normal control flow and come back as
//! [`Lookup::NotFound`]; everything else the service rejects is logged and
//! returned as an error.

use crate::adapters::cosmosdb::CosmosConnector;
use crate::adapters::database::{
    ContainerRef, DocumentStore, QuerySpec, StoreConnector, StoreResponse,
};
use crate::config::CosmosDbConfig;
use crate::core::metrics::{MetricsSnapshot, RequestMetrics};
use crate::domain::{
    ContainerId, CreateOutcome, DatabaseId, ItemId, Lookup, PartitionKeyValue, RepositoryError,
    Result,
};
use crate::{log_not_found, log_operation_complete, log_operation_failed};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

const UNINITIALIZED_MESSAGE: &str = "Cosmos container not initialized. Call init() or load() first";

struct Session {
    store: Arc<dyn DocumentStore>,
    target: ContainerRef,
}

/// Repository for items of type `T` stored in one Cosmos DB container
///
/// # Example
///
/// ```rust,no_run
/// use cosmos_repository::config::CosmosDbConfig;
/// use cosmos_repository::core::DocumentRepository;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Order {
///     id: String,
///     pk: String,
///     total: u32,
/// }
///
/// # async fn example() -> cosmos_repository::domain::Result<()> {
/// let config = CosmosDbConfig::new(
///     "https://myaccount.documents.azure.com:443/",
///     "account-key",
///     "orders-service",
/// );
/// let mut orders = DocumentRepository::<Order>::new(config);
/// orders.init("shop", "orders").await?;
///
/// let order = Order { id: "o-1".into(), pk: "c-9".into(), total: 42 };
/// orders.create_item(&order, "o-1", "c-9").await?;
///
/// let found = orders.read_item("o-1", "c-9").await?;
/// assert!(found.is_found());
/// println!("spent {} RU", orders.total_request_charge());
/// # Ok(())
/// # }
/// ```
pub struct DocumentRepository<T> {
    config: CosmosDbConfig,
    connector: Arc<dyn StoreConnector>,
    session: Option<Session>,
    metrics: RequestMetrics,
    _item: PhantomData<fn() -> T>,
}

impl<T> DocumentRepository<T> {
    /// Creates a repository that connects to Azure Cosmos DB
    ///
    /// Nothing is validated or contacted until `init` or `load`.
    pub fn new(config: CosmosDbConfig) -> Self {
        Self::with_connector(config, CosmosConnector)
    }

    /// Creates a repository that obtains its store from `connector`
    pub fn with_connector(config: CosmosDbConfig, connector: impl StoreConnector + 'static) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
            session: None,
            metrics: RequestMetrics::new(),
            _item: PhantomData,
        }
    }

    /// Client configuration; fixed for the lifetime of the repository
    pub fn config(&self) -> &CosmosDbConfig {
        &self.config
    }

    /// Whether `init` or `load` has completed
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Database in use, once initialized
    pub fn database_id(&self) -> Option<&DatabaseId> {
        self.session.as_ref().map(|s| &s.target.database)
    }

    /// Container in use, once initialized
    pub fn container_id(&self) -> Option<&ContainerId> {
        self.session.as_ref().map(|s| &s.target.container)
    }

    /// Current telemetry totals
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Request units consumed by this repository so far
    pub fn total_request_charge(&self) -> f64 {
        self.metrics.total_request_charge()
    }

    /// Time spent in remote calls by this repository so far
    pub fn total_request_time(&self) -> Duration {
        self.metrics.total_request_time()
    }

    /// Creates the database and container if needed and binds the repository to them
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Configuration`] if endpoint, key, name or
    /// either identifier is empty; no connection is attempted in that case.
    /// Remote failures are returned as [`RepositoryError::CosmosDb`] and leave
    /// the repository uninitialized.
    pub async fn init(&mut self, database_id: &str, container_id: &str) -> Result<()> {
        let target = self.check_settings(database_id, container_id)?;
        let store = self.connector.connect(&self.config)?;

        let database = store
            .create_database_if_not_exists(&target.database)
            .await
            .inspect_err(|e| log_operation_failed!("create_database", e))?;
        tracing::info!(
            database = %target.database,
            request_charge = database.request_charge,
            "Database ready"
        );

        let container = store
            .create_container_if_not_exists(
                &target,
                &self.config.partition_key_path,
                self.config.throughput,
            )
            .await
            .inspect_err(|e| log_operation_failed!("create_container", e))?;
        tracing::info!(
            container = %target,
            partition_key_path = %self.config.partition_key_path,
            throughput = ?self.config.throughput,
            request_charge = container.request_charge,
            "Container ready"
        );

        self.session = Some(Session { store, target });
        Ok(())
    }

    /// Binds the repository to an existing database and container without
    /// contacting the service
    ///
    /// A missing database or container surfaces on the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Configuration`] under the same conditions
    /// as [`init`](Self::init).
    pub fn load(&mut self, database_id: &str, container_id: &str) -> Result<()> {
        let target = self.check_settings(database_id, container_id)?;
        let store = self.connector.connect(&self.config)?;
        tracing::info!(container = %target, "Container loaded");
        self.session = Some(Session { store, target });
        Ok(())
    }

    fn check_settings(&self, database_id: &str, container_id: &str) -> Result<ContainerRef> {
        let mut missing = self.config.missing_settings();
        if database_id.trim().is_empty() {
            missing.push("database_id");
        }
        if container_id.trim().is_empty() {
            missing.push("container_id");
        }

        if !missing.is_empty() {
            let message = format!(
                "Endpoint, key, name, database id and container id are required; missing: {}",
                missing.join(", ")
            );
            tracing::error!(application = %self.config.name, "{}", message);
            return Err(RepositoryError::Configuration(message));
        }

        let database = DatabaseId::new(database_id).map_err(RepositoryError::Configuration)?;
        let container = ContainerId::new(container_id).map_err(RepositoryError::Configuration)?;
        Ok(ContainerRef::new(database, container))
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or_else(|| {
            tracing::error!(application = %self.config.name, "{}", UNINITIALIZED_MESSAGE);
            RepositoryError::Uninitialized(UNINITIALIZED_MESSAGE.to_string())
        })
    }

    /// Runs one remote call and accounts for it
    async fn timed<R>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<StoreResponse<R>>>,
    ) -> Result<StoreResponse<R>> {
        let started = Instant::now();
        let result = call.await;
        let elapsed = started.elapsed();

        match &result {
            Ok(response) => {
                self.metrics.record(response.request_charge, elapsed);
                log_operation_complete!(operation, response.request_charge, elapsed);
            }
            Err(_) => self.metrics.record_failure(elapsed),
        }
        result
    }
}

impl<T> DocumentRepository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Creates an item unless one with the same id already exists in the partition
    ///
    /// An existing item is left untouched and reported as
    /// [`CreateOutcome::AlreadyExists`]. The item must serialize to a JSON
    /// object; if it has no `id` property, `id` is added to the stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is uninitialized, the item's `id`
    /// property disagrees with `id`, or the service rejects the request.
    pub async fn create_item(&self, item: &T, id: &str, partition_key: &str) -> Result<CreateOutcome> {
        const OPERATION: &str = "create_item";
        let session = self.session()?;
        let (id, partition_key) = address(id, partition_key)?;
        let document = to_document(item, &id)?;

        let result = self
            .timed(
                OPERATION,
                session.store.create_item(&session.target, &partition_key, document),
            )
            .await;

        match result {
            Ok(response) => {
                if response.body == CreateOutcome::AlreadyExists {
                    tracing::debug!(
                        operation = OPERATION,
                        id = %id,
                        partition_key = %partition_key,
                        "Item already exists, left unchanged"
                    );
                }
                Ok(response.body)
            }
            Err(e) => {
                log_operation_failed!(OPERATION, &e);
                Err(e)
            }
        }
    }

    /// Reads an item by id and partition key
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is uninitialized, the stored
    /// document does not deserialize into `T`, or the service fails with
    /// anything other than not-found.
    pub async fn read_item(&self, id: &str, partition_key: &str) -> Result<Lookup<T>> {
        const OPERATION: &str = "read_item";
        let session = self.session()?;
        let (id, partition_key) = address(id, partition_key)?;

        let result = self
            .timed(
                OPERATION,
                session.store.read_item(&session.target, &id, &partition_key),
            )
            .await;

        match result {
            Ok(response) => from_document(response.body)
                .map(Lookup::Found)
                .inspect_err(|e| log_operation_failed!(OPERATION, e)),
            Err(e) if e.is_not_found() => {
                log_not_found!(OPERATION, id, partition_key);
                Ok(Lookup::NotFound)
            }
            Err(e) => {
                log_operation_failed!(OPERATION, &e);
                Err(e)
            }
        }
    }

    /// Replaces an existing item; the last writer wins
    ///
    /// Returns the item as written, or [`Lookup::NotFound`] if there was
    /// nothing to replace. The service acknowledges the write without echoing
    /// the document back, so the result is `item` with `id` filled in.
    ///
    /// # Errors
    ///
    /// Same conditions as [`create_item`](Self::create_item), except that a
    /// missing item is not an error.
    pub async fn update_item(&self, item: &T, id: &str, partition_key: &str) -> Result<Lookup<T>> {
        const OPERATION: &str = "update_item";
        let session = self.session()?;
        let (id, partition_key) = address(id, partition_key)?;
        let document = to_document(item, &id)?;
        let stored = document.clone();

        let result = self
            .timed(
                OPERATION,
                session
                    .store
                    .replace_item(&session.target, &id, &partition_key, document),
            )
            .await;

        match result {
            Ok(_) => from_document(stored)
                .map(Lookup::Found)
                .inspect_err(|e| log_operation_failed!(OPERATION, e)),
            Err(e) if e.is_not_found() => {
                log_not_found!(OPERATION, id, partition_key);
                Ok(Lookup::NotFound)
            }
            Err(e) => {
                log_operation_failed!(OPERATION, &e);
                Err(e)
            }
        }
    }

    /// Deletes an item; deleting a missing item is a no-op
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is uninitialized or the service
    /// fails with anything other than not-found.
    pub async fn delete_item(&self, id: &str, partition_key: &str) -> Result<Lookup<()>> {
        const OPERATION: &str = "delete_item";
        let session = self.session()?;
        let (id, partition_key) = address(id, partition_key)?;

        let result = self
            .timed(
                OPERATION,
                session.store.delete_item(&session.target, &id, &partition_key),
            )
            .await;

        match result {
            Ok(_) => Ok(Lookup::Found(())),
            Err(e) if e.is_not_found() => {
                log_not_found!(OPERATION, id, partition_key);
                Ok(Lookup::NotFound)
            }
            Err(e) => {
                log_operation_failed!(OPERATION, &e);
                Err(e)
            }
        }
    }

    /// Runs a cross-partition query and returns every matching item
    ///
    /// All pages are fetched in order and buffered; each page's charge and
    /// time are added to the totals as it arrives.
    ///
    /// # Errors
    ///
    /// Any failure, including not-found, is returned. Pages fetched before
    /// the failure stay accounted for.
    pub async fn query_items(&self, query: &str) -> Result<Vec<T>> {
        self.collect_pages("query_items", QuerySpec::new(query), from_document)
            .await
    }

    /// Runs a parameterized cross-partition query
    ///
    /// Parameter names include the leading `@`, matching their use in the
    /// query text: `SELECT * FROM c WHERE c.status = @status`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidArgument`] for a parameter name
    /// without `@`, otherwise as [`query_items`](Self::query_items).
    pub async fn query_items_with_parameters(
        &self,
        query: &str,
        parameters: &[(&str, Value)],
    ) -> Result<Vec<T>> {
        let mut spec = QuerySpec::new(query);
        for (name, value) in parameters {
            if !name.starts_with('@') || name.len() < 2 {
                return Err(RepositoryError::InvalidArgument(format!(
                    "Query parameter name '{name}' must start with '@'"
                )));
            }
            spec = spec.with_parameter(*name, value.clone());
        }
        self.collect_pages("query_items_with_parameters", spec, from_document)
            .await
    }

    /// Runs a cross-partition query and returns the raw documents
    ///
    /// # Errors
    ///
    /// As [`query_items`](Self::query_items).
    pub async fn query_documents(&self, query: &str) -> Result<Vec<Value>> {
        self.collect_pages("query_documents", QuerySpec::new(query), Ok)
            .await
    }

    async fn collect_pages<U>(
        &self,
        operation: &'static str,
        query: QuerySpec,
        mut convert: impl FnMut(Value) -> Result<U> + Send,
    ) -> Result<Vec<U>> {
        let session = self.session()?;
        let mut pages = session
            .store
            .query_items(&session.target, query)
            .inspect_err(|e| log_operation_failed!(operation, e))?;

        let mut items = Vec::new();
        let mut page_count = 0usize;
        loop {
            let started = Instant::now();
            let next = pages.next().await;
            let elapsed = started.elapsed();

            let page = match next {
                None => break,
                Some(Ok(page)) => page,
                Some(Err(e)) => {
                    self.metrics.record_failure(elapsed);
                    log_operation_failed!(operation, &e);
                    return Err(e);
                }
            };

            self.metrics.record(page.request_charge, elapsed);
            log_operation_complete!(operation, page.request_charge, elapsed);
            page_count += 1;

            items.reserve(page.documents.len());
            for document in page.documents {
                let item = convert(document).inspect_err(|e| log_operation_failed!(operation, e))?;
                items.push(item);
            }
        }

        tracing::debug!(
            operation,
            pages = page_count,
            items = items.len(),
            "Query drained"
        );
        Ok(items)
    }
}

impl<T> fmt::Debug for DocumentRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentRepository")
            .field("config", &self.config)
            .field("container", &self.session.as_ref().map(|s| &s.target))
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

fn address(id: &str, partition_key: &str) -> Result<(ItemId, PartitionKeyValue)> {
    let id = ItemId::new(id).map_err(RepositoryError::InvalidArgument)?;
    let partition_key =
        PartitionKeyValue::new(partition_key).map_err(RepositoryError::InvalidArgument)?;
    Ok((id, partition_key))
}

fn to_document<T: Serialize>(item: &T, id: &ItemId) -> Result<Value> {
    let mut document = serde_json::to_value(item)?;
    let Some(fields) = document.as_object_mut() else {
        return Err(RepositoryError::InvalidArgument(
            "Items must serialize to a JSON object".to_string(),
        ));
    };

    match fields.get("id") {
        None => {
            fields.insert("id".to_string(), Value::String(id.as_str().to_string()));
        }
        Some(Value::String(existing)) if existing == id.as_str() => {}
        Some(other) => {
            return Err(RepositoryError::InvalidArgument(format!(
                "Item id property {other} does not match id '{id}'"
            )));
        }
    }
    Ok(document)
}

fn from_document<T: DeserializeOwned>(document: Value) -> Result<T> {
    serde_json::from_value(document)
        .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize item: {e}")))
}
