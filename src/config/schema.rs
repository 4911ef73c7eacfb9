//! Configuration schema types
//!
//! This module defines the configuration structure that maps to the TOML file
//! and the client configuration a [`DocumentRepository`] is built from.
//!
//! [`DocumentRepository`]: crate::core::repository::DocumentRepository

use crate::config::{secret_string, SecretString};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest manual throughput Cosmos DB accepts for a container
pub const MIN_THROUGHPUT: usize = 400;

/// Root configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Cosmos DB client settings
    pub cosmosdb: CosmosDbConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RepositoryConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.cosmosdb.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// How the client reaches the service
///
/// `azure_data_cosmos` talks to the gateway over HTTPS in both cases; the
/// mode is carried so that configuration files written for other SDKs load
/// unchanged, and it is reported in the connection log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Direct connectivity to backend replicas
    #[default]
    Direct,
    /// All requests routed through the gateway
    Gateway,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Direct => f.write_str("direct"),
            ConnectionMode::Gateway => f.write_str("gateway"),
        }
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(ConnectionMode::Direct),
            "gateway" => Ok(ConnectionMode::Gateway),
            other => Err(format!(
                "Invalid connection_mode '{other}'. Must be one of: direct, gateway"
            )),
        }
    }
}

/// Azure Cosmos DB client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosDbConfig {
    /// Cosmos DB account endpoint URL
    #[serde(default)]
    pub endpoint: String,

    /// Cosmos DB access key
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default = "empty_secret")]
    pub key: SecretString,

    /// Logical name of the calling application
    #[serde(default)]
    pub name: String,

    /// Partition key path used when a container is created
    #[serde(default = "default_partition_key_path")]
    pub partition_key_path: String,

    /// Manual throughput (RU/s) provisioned on a newly created container.
    /// `None` creates the container without dedicated throughput.
    #[serde(default = "default_throughput")]
    pub throughput: Option<usize>,

    /// Connection mode
    #[serde(default)]
    pub connection_mode: ConnectionMode,
}

impl CosmosDbConfig {
    /// Creates a configuration with the default partition key path (`/pk`),
    /// throughput (400) and connection mode (direct)
    pub fn new(
        endpoint: impl Into<String>,
        key: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: secret_string(key.into()),
            name: name.into(),
            partition_key_path: default_partition_key_path(),
            throughput: default_throughput(),
            connection_mode: ConnectionMode::default(),
        }
    }

    /// Sets the partition key path
    pub fn with_partition_key_path(mut self, path: impl Into<String>) -> Self {
        self.partition_key_path = path.into();
        self
    }

    /// Sets the provisioned throughput
    pub fn with_throughput(mut self, throughput: Option<usize>) -> Self {
        self.throughput = throughput;
        self
    }

    /// Sets the connection mode
    pub fn with_connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.connection_mode = mode;
        self
    }

    /// Returns the names of the required settings that are empty
    ///
    /// Endpoint, key and name must be present before the repository
    /// connects.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.endpoint.trim().is_empty() {
            missing.push("endpoint");
        }
        if self.key.expose_secret().is_empty() {
            missing.push("key");
        }
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        missing
    }

    /// Full validation applied to configuration files
    pub(crate) fn validate(&self) -> Result<(), String> {
        let missing = self.missing_settings();
        if !missing.is_empty() {
            return Err(format!(
                "cosmosdb settings cannot be empty: {}",
                missing.join(", ")
            ));
        }

        let url = url::Url::parse(&self.endpoint)
            .map_err(|e| format!("cosmosdb.endpoint is not a valid URL: {e}"))?;
        if url.scheme() != "https" {
            return Err("cosmosdb.endpoint must start with https://".to_string());
        }

        if !self.partition_key_path.starts_with('/') || self.partition_key_path.len() < 2 {
            return Err(format!(
                "cosmosdb.partition_key_path must look like '/property', got '{}'",
                self.partition_key_path
            ));
        }

        if let Some(throughput) = self.throughput {
            if throughput < MIN_THROUGHPUT {
                return Err(format!(
                    "cosmosdb.throughput must be at least {MIN_THROUGHPUT}, got {throughput}"
                ));
            }
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable JSON file logging in addition to the console
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Log file name prefix
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled".to_string());
        }

        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn empty_secret() -> SecretString {
    secret_string(String::new())
}

fn default_partition_key_path() -> String {
    "/pk".to_string()
}

fn default_throughput() -> Option<usize> {
    Some(MIN_THROUGHPUT)
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_file_prefix() -> String {
    "cosmos-repository.log".to_string()
}
