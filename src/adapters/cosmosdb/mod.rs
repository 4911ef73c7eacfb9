//! Azure Cosmos DB integration
//!
//! This module provides the [`DocumentStore`](crate::adapters::database::DocumentStore)
//! implementation that talks to a Cosmos DB account.

pub mod client;

pub use client::{CosmosConnector, CosmosDbStore};
