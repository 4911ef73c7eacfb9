//! Domain types for the repository.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`DatabaseId`], [`ContainerId`], [`ItemId`], [`PartitionKeyValue`])
//! - **Operation outcomes** ([`Lookup`], [`CreateOutcome`])
//! - **Error types** ([`RepositoryError`], [`CosmosDbError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, RepositoryError>`]:
//!
//! ```rust
//! use cosmos_repository::domain::{ItemId, RepositoryError, Result};
//!
//! fn parse_id(raw: &str) -> Result<ItemId> {
//!     ItemId::new(raw).map_err(RepositoryError::Configuration)
//! }
//!
//! assert!(parse_id("").is_err());
//! ```

pub mod errors;
pub mod ids;
pub mod lookup;
pub mod result;

pub use errors::{CosmosDbError, RepositoryError};
pub use ids::{ContainerId, DatabaseId, ItemId, PartitionKeyValue};
pub use lookup::{CreateOutcome, Lookup};
pub use result::Result;
