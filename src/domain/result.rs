//! Result type alias for the repository

use super::errors::RepositoryError;

/// Result type alias using [`RepositoryError`] as the error type
///
/// # Examples
///
/// ```
/// use cosmos_repository::domain::result::Result;
/// use cosmos_repository::domain::errors::RepositoryError;
///
/// fn failing_function() -> Result<()> {
///     Err(RepositoryError::Uninitialized("call init first".to_string()))
/// }
///
/// assert!(failing_function().is_err());
/// ```
pub type Result<T> = std::result::Result<T, RepositoryError>;
