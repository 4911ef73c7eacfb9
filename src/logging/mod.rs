//! Logging and observability
//!
//! The repository reports through `tracing` with structured fields. This
//! module sets up a subscriber for binaries and tests that want one, and
//! provides the log macros shared by the repository and the adapters.
//!
//! # Example
//!
//! ```no_run
//! use cosmos_repository::logging::init_logging;
//! use cosmos_repository::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("debug", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the completion of a remote operation with its cost
///
/// # Example
///
/// ```no_run
/// use cosmos_repository::log_operation_complete;
/// use std::time::Duration;
///
/// log_operation_complete!("read_item", 1.0_f64, Duration::from_millis(12));
/// ```
#[macro_export]
macro_rules! log_operation_complete {
    ($operation:expr, $charge:expr, $elapsed:expr) => {
        tracing::debug!(
            operation = $operation,
            request_charge = $charge,
            elapsed_ms = $elapsed.as_secs_f64() * 1000.0,
            "Cosmos DB operation completed"
        )
    };
}

/// Log a not-found response that the caller receives as `Lookup::NotFound`
///
/// # Example
///
/// ```no_run
/// use cosmos_repository::log_not_found;
///
/// log_not_found!("read_item", "item-1", "pk-1");
/// ```
#[macro_export]
macro_rules! log_not_found {
    ($operation:expr, $id:expr, $partition_key:expr) => {
        tracing::warn!(
            operation = $operation,
            id = %$id,
            partition_key = %$partition_key,
            status = 404u16,
            "Item not found"
        )
    };
}

/// Log a failed remote operation before it is returned to the caller
///
/// # Example
///
/// ```no_run
/// use cosmos_repository::log_operation_failed;
/// use cosmos_repository::domain::RepositoryError;
///
/// let error = RepositoryError::Other("boom".to_string());
/// log_operation_failed!("query_items", &error);
/// ```
#[macro_export]
macro_rules! log_operation_failed {
    ($operation:expr, $error:expr) => {
        tracing::error!(
            operation = $operation,
            status = ?$error.as_cosmos().and_then(|e| e.status()),
            error = %$error,
            "Cosmos DB operation failed"
        )
    };
}
