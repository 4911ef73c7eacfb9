//! Document store abstraction
//!
//! [`DocumentStore`] is the boundary between the repository and the remote
//! service. It deals in `serde_json::Value` documents; typed
//! (de)serialization happens in the repository. Every successful response
//! carries the request charge the service reported for it.

use crate::config::CosmosDbConfig;
use crate::domain::{ContainerId, CreateOutcome, DatabaseId, ItemId, PartitionKeyValue, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Address of a container inside a database
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    /// Database the container lives in
    pub database: DatabaseId,
    /// Container name
    pub container: ContainerId,
}

impl ContainerRef {
    /// Creates a container address
    pub fn new(database: DatabaseId, container: ContainerId) -> Self {
        Self {
            database,
            container,
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.container)
    }
}

/// A successful response from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse<T> {
    /// Response payload
    pub body: T,

    /// Request units charged for this request
    pub request_charge: f64,

    /// Service activity id, useful when raising support cases
    pub activity_id: Option<String>,
}

impl<T> StoreResponse<T> {
    /// Creates a response with a body and charge
    pub fn new(body: T, request_charge: f64) -> Self {
        Self {
            body,
            request_charge,
            activity_id: None,
        }
    }

    /// Sets the activity id
    pub fn with_activity_id(mut self, activity_id: Option<String>) -> Self {
        self.activity_id = activity_id;
        self
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    /// Documents on this page, in the order the service returned them
    pub documents: Vec<Value>,

    /// Request units charged for this page
    pub request_charge: f64,
}

/// A Cosmos DB SQL query with optional named parameters
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Query text, e.g. `SELECT * FROM c WHERE c.pk = @pk`
    pub text: String,

    /// Named parameters; names include the leading `@`
    pub parameters: Vec<(String, Value)>,
}

impl QuerySpec {
    /// Creates a query without parameters
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Adds a named parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.push((name.into(), value));
        self
    }

    /// Looks up a parameter value by name
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Stream of query pages; ends after the last page
pub type PageStream<'a> = BoxStream<'a, Result<QueryPage>>;

/// Remote document database operations used by the repository
///
/// Failures are reported as [`RepositoryError::CosmosDb`] with the
/// [`CosmosDbError`] variant chosen by HTTP status, so callers can branch on
/// not-found (404).
///
/// [`RepositoryError::CosmosDb`]: crate::domain::RepositoryError::CosmosDb
/// [`CosmosDbError`]: crate::domain::CosmosDbError
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates the database unless it already exists
    async fn create_database_if_not_exists(
        &self,
        database: &DatabaseId,
    ) -> Result<StoreResponse<()>>;

    /// Creates the container unless it already exists
    ///
    /// `partition_key_path` and `throughput` only apply when the container
    /// is created; an existing container keeps its settings.
    async fn create_container_if_not_exists(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
        throughput: Option<usize>,
    ) -> Result<StoreResponse<()>>;

    /// Creates a new item unless the id already exists in the partition
    ///
    /// An existing item is left untouched and reported as
    /// [`CreateOutcome::AlreadyExists`], carrying the charge billed for
    /// finding it.
    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKeyValue,
        item: Value,
    ) -> Result<StoreResponse<CreateOutcome>>;

    /// Reads an item
    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &ItemId,
        partition_key: &PartitionKeyValue,
    ) -> Result<StoreResponse<Value>>;

    /// Replaces an existing item unconditionally
    async fn replace_item(
        &self,
        container: &ContainerRef,
        id: &ItemId,
        partition_key: &PartitionKeyValue,
        item: Value,
    ) -> Result<StoreResponse<()>>;

    /// Deletes an item
    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &ItemId,
        partition_key: &PartitionKeyValue,
    ) -> Result<StoreResponse<()>>;

    /// Starts a cross-partition query and returns its pages
    fn query_items(&self, container: &ContainerRef, query: QuerySpec) -> Result<PageStream<'_>>;
}

/// Builds a [`DocumentStore`] from client configuration
///
/// The repository calls this from `init`/`load` after the configuration
/// passed validation.
pub trait StoreConnector: Send + Sync {
    /// Creates a store for the configured account
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    fn connect(&self, config: &CosmosDbConfig) -> Result<Arc<dyn DocumentStore>>;
}
