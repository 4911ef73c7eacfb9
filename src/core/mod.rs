//! Core repository logic.
//!
//! # Modules
//!
//! - [`repository`] - The typed [`DocumentRepository`] and its operations
//! - [`metrics`] - Request charge and latency totals
//!
//! # Lifecycle
//!
//! 1. **Configure**: build a [`CosmosDbConfig`](crate::config::CosmosDbConfig)
//!    directly or load one with [`load_config`](crate::config::load_config)
//! 2. **Initialize**: `init` creates the database and container if needed,
//!    `load` binds to existing ones without a remote call
//! 3. **Operate**: create, read, update, delete and query items
//! 4. **Inspect**: read the accumulated request charge and time
//!
//! # Example
//!
//! ```rust,no_run
//! use cosmos_repository::config::load_config;
//! use cosmos_repository::core::DocumentRepository;
//! use serde_json::Value;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cosmos-repository.toml")?;
//!
//! let mut repo = DocumentRepository::<Value>::new(config.cosmosdb);
//! repo.init("inventory", "products").await?;
//!
//! let products = repo.query_items("SELECT * FROM c").await?;
//! println!(
//!     "{} products, {:.2} RU in {:?}",
//!     products.len(),
//!     repo.total_request_charge(),
//!     repo.total_request_time()
//! );
//! # Ok(())
//! # }
//! ```

pub mod metrics;
pub mod repository;

pub use metrics::{MetricsSnapshot, RequestMetrics};
pub use repository::DocumentRepository;
