//! Domain error types
//!
//! This module defines the error hierarchy for the repository. Errors are
//! domain-specific and don't expose the Cosmos DB SDK's types; the adapter
//! maps SDK failures by HTTP status before they cross the store boundary.

use thiserror::Error;

/// Main repository error type
///
/// Every fallible operation in this crate returns this type.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Required settings are missing or invalid. Raised before any remote call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An item operation was attempted before `init` or `load`.
    #[error("Uninitialized: {0}")]
    Uninitialized(String),

    /// An id, partition key, item or query argument is unusable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A failure reported by (or while talking to) Cosmos DB
    #[error("Cosmos DB error: {0}")]
    CosmosDb(#[from] CosmosDbError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl RepositoryError {
    /// Returns the Cosmos DB error if this is a remote failure
    pub fn as_cosmos(&self) -> Option<&CosmosDbError> {
        match self {
            RepositoryError::CosmosDb(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the service reported the resource as missing (404)
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::CosmosDb(CosmosDbError::NotFound(_)))
    }

    /// Whether the service reported a conflict with an existing resource (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::CosmosDb(CosmosDbError::Conflict(_)))
    }
}

/// Cosmos DB-specific errors
///
/// Errors that occur when interacting with Azure Cosmos DB.
#[derive(Debug, Error)]
pub enum CosmosDbError {
    /// Failed to connect to Cosmos DB (no HTTP status available)
    #[error("Failed to connect to Cosmos DB: {0}")]
    ConnectionFailed(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict with an existing resource (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Throttling error (429)
    #[error("Request rate too large (429): {0}")]
    Throttled(String),

    /// Failed to create database
    #[error("Failed to create database: {0}")]
    DatabaseCreationFailed(String),

    /// Failed to create container
    #[error("Failed to create container: {0}")]
    ContainerCreationFailed(String),

    /// Failed to query documents
    #[error("Failed to query documents: {0}")]
    QueryFailed(String),

    /// The request was rejected locally before reaching the service
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other failed request
    #[error("Request failed: {status} - {message}")]
    RequestFailed { status: u16, message: String },
}

impl CosmosDbError {
    /// Builds an error from an HTTP status code and service message
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => CosmosDbError::NotFound(message),
            409 => CosmosDbError::Conflict(message),
            429 => CosmosDbError::Throttled(message),
            _ => CosmosDbError::RequestFailed { status, message },
        }
    }

    /// HTTP status code associated with this error, when there is one
    pub fn status(&self) -> Option<u16> {
        match self {
            CosmosDbError::NotFound(_) => Some(404),
            CosmosDbError::Conflict(_) => Some(409),
            CosmosDbError::Throttled(_) => Some(429),
            CosmosDbError::InvalidRequest(_) => Some(400),
            CosmosDbError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RepositoryError {
    fn from(err: toml::de::Error) -> Self {
        RepositoryError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Configuration("endpoint is empty".to_string());
        assert_eq!(err.to_string(), "Configuration error: endpoint is empty");
    }

    #[test]
    fn test_cosmosdb_error_conversion() {
        let cosmos_err = CosmosDbError::Throttled("retry after 5ms".to_string());
        let err: RepositoryError = cosmos_err.into();
        assert!(matches!(err, RepositoryError::CosmosDb(_)));
        assert_eq!(err.as_cosmos().and_then(CosmosDbError::status), Some(429));
    }

    #[test_case(404, 404 ; "not found")]
    #[test_case(409, 409 ; "conflict")]
    #[test_case(429, 429 ; "throttled")]
    #[test_case(503, 503 ; "service unavailable")]
    fn test_from_status_round_trips_status(status: u16, expected: u16) {
        assert_eq!(CosmosDbError::from_status(status, "msg").status(), Some(expected));
    }

    #[test]
    fn test_not_found_and_conflict_predicates() {
        let not_found: RepositoryError = CosmosDbError::from_status(404, "gone").into();
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let conflict: RepositoryError = CosmosDbError::from_status(409, "exists").into();
        assert!(conflict.is_conflict());

        let config = RepositoryError::Configuration("x".to_string());
        assert!(!config.is_not_found());
        assert!(config.as_cosmos().is_none());
    }

    #[test]
    fn test_connection_failure_has_no_status() {
        assert_eq!(CosmosDbError::ConnectionFailed("dns".to_string()).status(), None);
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: RepositoryError = json_err.into();
        assert!(matches!(err, RepositoryError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: RepositoryError = toml_err.into();
        assert!(matches!(err, RepositoryError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: RepositoryError = io_err.into();
        assert!(matches!(err, RepositoryError::Io(_)));
    }
}
