//! Configuration management.
//!
//! A [`CosmosDbConfig`] can be built in code or loaded, together with the
//! logging settings, from a TOML file.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cosmos_repository::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cosmos.toml")?;
//! println!("Cosmos DB: {}", config.cosmosdb.endpoint);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [cosmosdb]
//! endpoint = "https://your-account.documents.azure.com:443/"
//! key = "${COSMOS_KEY}"
//! name = "orders-service"
//! partition_key_path = "/pk"     # default
//! throughput = 400               # default
//! connection_mode = "direct"     # default
//!
//! [logging]
//! local_enabled = true
//! local_path = "./logs"
//! local_rotation = "daily"
//! ```
//!
//! # Environment Variables
//!
//! `${VAR_NAME}` placeholders are substituted before parsing, and any
//! `COSMOS_REPO_<SECTION>_<KEY>` variable overrides the parsed value:
//!
//! ```bash
//! export COSMOS_KEY="secret-key"
//! export COSMOS_REPO_COSMOSDB_THROUGHPUT=1000
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_with_dotenv, parse_config};
pub use schema::{
    ApplicationConfig, ConnectionMode, CosmosDbConfig, LoggingConfig, RepositoryConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
