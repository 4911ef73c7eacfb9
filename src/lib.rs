// Cosmos Repository - Typed repository for Azure Cosmos DB containers
// Copyright (c) 2025 Cosmos Repository Contributors
// Licensed under the MIT License

//! # Cosmos Repository
//!
//! A thin, typed repository over a single Azure Cosmos DB container. It
//! prepares the database and container, performs create, read, update,
//! delete and query operations on serde types, and keeps running totals of
//! the request units and time those operations cost.
//!
//! ## Architecture
//!
//! - [`core`] - The [`DocumentRepository`](core::DocumentRepository) and its telemetry
//! - [`adapters`] - The document store boundary, with Cosmos DB and in-memory implementations
//! - [`domain`] - Identifiers, outcomes and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cosmos_repository::config::CosmosDbConfig;
//! use cosmos_repository::core::DocumentRepository;
//! use cosmos_repository::domain::CreateOutcome;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Customer {
//!     id: String,
//!     pk: String,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CosmosDbConfig::new(
//!         "https://myaccount.documents.azure.com:443/",
//!         std::env::var("COSMOS_KEY")?,
//!         "crm",
//!     );
//!
//!     let mut customers = DocumentRepository::<Customer>::new(config);
//!     customers.init("crm", "customers").await?;
//!
//!     let ada = Customer { id: "c-1".into(), pk: "eu".into(), name: "Ada".into() };
//!     if customers.create_item(&ada, "c-1", "eu").await? == CreateOutcome::AlreadyExists {
//!         println!("c-1 was already there");
//!     }
//!
//!     let stored = customers.read_item("c-1", "eu").await?.unwrap_or_default();
//!     println!("{} ({:.2} RU so far)", stored.name, customers.total_request_charge());
//!     Ok(())
//! }
//! ```
//!
//! ## Not Found Is Not an Error
//!
//! Point reads, updates and deletes of a missing item return
//! [`Lookup::NotFound`](domain::Lookup::NotFound) and log a warning.
//! Creating an item that already exists returns
//! [`CreateOutcome::AlreadyExists`](domain::CreateOutcome::AlreadyExists)
//! and leaves the stored item unchanged.
//!
//! ## Error Handling
//!
//! Everything else fails with [`domain::RepositoryError`]:
//!
//! ```rust,no_run
//! use cosmos_repository::domain::RepositoryError;
//!
//! fn example() -> Result<(), RepositoryError> {
//!     // Errors are converted with the ? operator
//!     let config = cosmos_repository::config::load_config("cosmos-repository.toml")?;
//!     println!("connecting to {}", config.cosmosdb.endpoint);
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! The repository logs through `tracing`. Install a subscriber with
//! [`logging::init_logging`], or any other subscriber; without one the
//! log calls do nothing.
//!
//! ## Testing Without an Account
//!
//! [`InMemoryStore`](adapters::memory::InMemoryStore) implements the same
//! store boundary as Cosmos DB and can be handed to
//! [`DocumentRepository::with_connector`](core::DocumentRepository::with_connector).

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
