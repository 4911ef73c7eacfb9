//! Store integrations.
//!
//! - [`database`] - The [`DocumentStore`](database::DocumentStore) boundary (trait-based)
//! - [`cosmosdb`] - Azure Cosmos DB implementation
//! - [`memory`] - In-memory implementation for tests and local development
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate the vendor SDK and
//! enable testing against an in-process store. The repository only sees the
//! traits in [`database`]:
//!
//! ```rust
//! use cosmos_repository::adapters::memory::InMemoryStore;
//! use cosmos_repository::config::CosmosDbConfig;
//! use cosmos_repository::core::DocumentRepository;
//! use serde_json::Value;
//!
//! # async fn example() -> cosmos_repository::domain::Result<()> {
//! let store = InMemoryStore::new();
//! let config = CosmosDbConfig::new("https://local", "key", "example");
//! let mut repo = DocumentRepository::<Value>::with_connector(config, store.clone());
//! repo.init("db1", "cont1").await?;
//! # Ok(())
//! # }
//! ```

pub mod cosmosdb;
pub mod database;
pub mod memory;
