//! Cosmos DB store implementation
//!
//! [`CosmosDbStore`] implements [`DocumentStore`] on top of the
//! `azure_data_cosmos` SDK with key authentication. SDK errors are mapped to
//! [`CosmosDbError`] by HTTP status here, so nothing above this module sees
//! an SDK type.

use crate::adapters::database::{
    ContainerRef, DocumentStore, PageStream, QueryPage, QuerySpec, StoreConnector, StoreResponse,
};
use crate::config::CosmosDbConfig;
use crate::domain::{
    CosmosDbError, CreateOutcome, DatabaseId, ItemId, PartitionKeyValue, Result,
};
use async_trait::async_trait;
use azure_core::credentials::Secret;
use azure_core::http::headers::{HeaderName, Headers};
use azure_core::http::StatusCode;
use azure_data_cosmos::clients::ContainerClient;
use azure_data_cosmos::models::{
    ContainerProperties, IndexingPolicy, PartitionKeyDefinition, PartitionKeyKind,
    ThroughputProperties,
};
use azure_data_cosmos::{CosmosClient, CosmosClientOptions, CreateContainerOptions, PartitionKey};
use futures::stream::StreamExt;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

const REQUEST_CHARGE_HEADER: &str = "x-ms-request-charge";
const ACTIVITY_ID_HEADER: &str = "x-ms-activity-id";

/// Cosmos DB store backed by the Azure SDK
pub struct CosmosDbStore {
    client: CosmosClient,
}

impl CosmosDbStore {
    /// Create a new Cosmos DB store
    ///
    /// No request is sent; the first remote call happens on the first
    /// operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK rejects the endpoint or key.
    pub fn new(config: &CosmosDbConfig) -> Result<Self> {
        use secrecy::ExposeSecret;

        let key = Secret::new(config.key.expose_secret().as_ref().to_string());
        let client =
            CosmosClient::with_key(&config.endpoint, key, Some(CosmosClientOptions::default()))
                .map_err(|e| {
                    CosmosDbError::ConnectionFailed(format!("Failed to create Cosmos client: {e}"))
                })?;

        tracing::info!(
            endpoint = %config.endpoint,
            application = %config.name,
            connection_mode = %config.connection_mode,
            "Cosmos DB client created"
        );

        Ok(Self { client })
    }

    fn container_client(&self, container: &ContainerRef) -> ContainerClient {
        self.client
            .database_client(container.database.as_str())
            .container_client(container.container.as_str())
    }
}

/// Creates [`CosmosDbStore`]s; the connector used by
/// [`DocumentRepository::new`](crate::core::repository::DocumentRepository::new)
#[derive(Debug, Clone, Copy, Default)]
pub struct CosmosConnector;

impl StoreConnector for CosmosConnector {
    fn connect(&self, config: &CosmosDbConfig) -> Result<Arc<dyn DocumentStore>> {
        Ok(Arc::new(CosmosDbStore::new(config)?))
    }
}

fn request_charge(headers: &Headers) -> f64 {
    headers
        .get_optional_str(&HeaderName::from_static(REQUEST_CHARGE_HEADER))
        .and_then(|value| value.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn activity_id(headers: &Headers) -> Option<String> {
    headers
        .get_optional_str(&HeaderName::from_static(ACTIVITY_ID_HEADER))
        .map(str::to_string)
}

fn response_meta<T>(body: T, headers: &Headers) -> StoreResponse<T> {
    StoreResponse::new(body, request_charge(headers)).with_activity_id(activity_id(headers))
}

/// Maps an SDK error by HTTP status; `fallback` wraps errors that carry none
fn map_error(
    error: azure_core::Error,
    fallback: impl FnOnce(String) -> CosmosDbError,
) -> CosmosDbError {
    match error.http_status() {
        Some(status) => CosmosDbError::from_status(u16::from(status), error.to_string()),
        None => fallback(error.to_string()),
    }
}

fn is_not_found(error: &azure_core::Error) -> bool {
    error.http_status() == Some(StatusCode::NotFound)
}

#[async_trait]
impl DocumentStore for CosmosDbStore {
    async fn create_database_if_not_exists(
        &self,
        database: &DatabaseId,
    ) -> Result<StoreResponse<()>> {
        let database_client = self.client.database_client(database.as_str());

        match database_client.read(None).await {
            Ok(response) => {
                tracing::info!(database = %database, "Database already exists");
                Ok(response_meta((), response.headers()))
            }
            Err(e) if is_not_found(&e) => {
                tracing::info!(database = %database, "Creating database");

                let response = self
                    .client
                    .create_database(database.as_str(), None)
                    .await
                    .map_err(|e| map_error(e, CosmosDbError::DatabaseCreationFailed))?;

                tracing::info!(database = %database, "Database created successfully");
                Ok(response_meta((), response.headers()))
            }
            Err(e) => Err(map_error(e, CosmosDbError::ConnectionFailed).into()),
        }
    }

    async fn create_container_if_not_exists(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
        throughput: Option<usize>,
    ) -> Result<StoreResponse<()>> {
        let container_client = self.container_client(container);

        match container_client.read(None).await {
            Ok(response) => {
                tracing::info!(container = %container, "Container already exists");
                Ok(response_meta((), response.headers()))
            }
            Err(e) if is_not_found(&e) => {
                tracing::info!(
                    container = %container,
                    partition_key_path = %partition_key_path,
                    throughput = ?throughput,
                    "Creating container"
                );

                let properties = ContainerProperties {
                    id: Cow::Owned(container.container.as_str().to_string()),
                    partition_key: PartitionKeyDefinition {
                        paths: vec![partition_key_path.to_string()],
                        kind: PartitionKeyKind::Hash,
                        version: None,
                    },
                    indexing_policy: Some(IndexingPolicy::default()),
                    ..Default::default()
                };

                let options = throughput.map(|ru| CreateContainerOptions {
                    throughput: Some(ThroughputProperties::manual(ru as _)),
                    ..Default::default()
                });

                let response = self
                    .client
                    .database_client(container.database.as_str())
                    .create_container(properties, options)
                    .await
                    .map_err(|e| map_error(e, CosmosDbError::ContainerCreationFailed))?;

                tracing::info!(container = %container, "Container created successfully");
                Ok(response_meta((), response.headers()))
            }
            Err(e) => Err(map_error(e, CosmosDbError::ConnectionFailed).into()),
        }
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKeyValue,
        item: Value,
    ) -> Result<StoreResponse<CreateOutcome>> {
        let id = item
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CosmosDbError::InvalidRequest("The item has no string 'id' property".to_string())
            })?;
        let container_client = self.container_client(container);

        match container_client
            .create_item(PartitionKey::from(partition_key.as_str().to_string()), item, None)
            .await
        {
            Ok(response) => Ok(response_meta(CreateOutcome::Created, response.headers())),
            Err(e) if e.http_status() == Some(StatusCode::Conflict) => {
                // The conflict error carries no charge header; bill the lookup instead
                let existing = container_client
                    .read_item::<Value>(
                        PartitionKey::from(partition_key.as_str().to_string()),
                        &id,
                        None,
                    )
                    .await
                    .map_err(|e| map_error(e, CosmosDbError::ConnectionFailed))?;
                Ok(response_meta(CreateOutcome::AlreadyExists, existing.headers()))
            }
            Err(e) => Err(map_error(e, CosmosDbError::ConnectionFailed).into()),
        }
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &ItemId,
        partition_key: &PartitionKeyValue,
    ) -> Result<StoreResponse<Value>> {
        let response = self
            .container_client(container)
            .read_item::<Value>(
                PartitionKey::from(partition_key.as_str().to_string()),
                id.as_str(),
                None,
            )
            .await
            .map_err(|e| map_error(e, CosmosDbError::ConnectionFailed))?;

        let meta = response_meta((), response.headers());
        let body = response.into_body().map_err(|e| {
            CosmosDbError::QueryFailed(format!("Failed to deserialize item {id}: {e}"))
        })?;

        Ok(StoreResponse {
            body,
            request_charge: meta.request_charge,
            activity_id: meta.activity_id,
        })
    }

    async fn replace_item(
        &self,
        container: &ContainerRef,
        id: &ItemId,
        partition_key: &PartitionKeyValue,
        item: Value,
    ) -> Result<StoreResponse<()>> {
        let response = self
            .container_client(container)
            .replace_item(
                PartitionKey::from(partition_key.as_str().to_string()),
                id.as_str(),
                item,
                None,
            )
            .await
            .map_err(|e| map_error(e, CosmosDbError::ConnectionFailed))?;

        Ok(response_meta((), response.headers()))
    }

    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &ItemId,
        partition_key: &PartitionKeyValue,
    ) -> Result<StoreResponse<()>> {
        let response = self
            .container_client(container)
            .delete_item(
                PartitionKey::from(partition_key.as_str().to_string()),
                id.as_str(),
                None,
            )
            .await
            .map_err(|e| map_error(e, CosmosDbError::ConnectionFailed))?;

        Ok(response_meta((), response.headers()))
    }

    fn query_items(&self, container: &ContainerRef, query: QuerySpec) -> Result<PageStream<'_>> {
        let mut sdk_query = azure_data_cosmos::Query::from(query.text);
        for (name, value) in query.parameters {
            sdk_query = sdk_query.with_parameter(name.clone(), value).map_err(|e| {
                CosmosDbError::InvalidRequest(format!("Invalid query parameter {name}: {e}"))
            })?;
        }

        // An empty partition key fans the query out across partitions.
        let pager = self
            .container_client(container)
            .query_items::<Value>(sdk_query, (), None)
            .map_err(|e| map_error(e, CosmosDbError::QueryFailed))?;

        let pages = pager.into_pages().map(|page| -> Result<QueryPage> {
            let page = page.map_err(|e| map_error(e, CosmosDbError::QueryFailed))?;
            let request_charge = request_charge(page.headers());
            Ok(QueryPage {
                documents: page.into_items(),
                request_charge,
            })
        });

        Ok(pages.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_charge_parses_header() {
        let mut headers = Headers::new();
        headers.insert(HeaderName::from_static(REQUEST_CHARGE_HEADER), "5.71");
        headers.insert(HeaderName::from_static(ACTIVITY_ID_HEADER), "abc-123");

        assert!((request_charge(&headers) - 5.71).abs() < f64::EPSILON);
        assert_eq!(activity_id(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_request_charge_defaults_to_zero() {
        let headers = Headers::new();
        assert_eq!(request_charge(&headers), 0.0);
        assert!(activity_id(&headers).is_none());
    }

    #[test]
    fn test_store_creation_does_not_contact_service() {
        let config = CosmosDbConfig::new(
            "https://example.documents.azure.com:443/",
            "dGVzdC1rZXk=",
            "unit-test",
        );
        assert!(CosmosDbStore::new(&config).is_ok());
    }
}
