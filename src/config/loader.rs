//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::RepositoryConfig;
use super::secret_string;
use crate::domain::errors::RepositoryError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "COSMOS_REPO_";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`RepositoryConfig`]
/// 4. Applies environment variable overrides (`COSMOS_REPO_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`RepositoryError::Configuration`] if the file cannot be read,
/// references an unset variable, fails to parse, or fails validation.
///
/// # Examples
///
/// ```no_run
/// use cosmos_repository::config::load_config;
///
/// let config = load_config("cosmos.toml").expect("Failed to load config");
/// println!("{}", config.cosmosdb.endpoint);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<RepositoryConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(RepositoryError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        RepositoryError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Same as [`load_config`], but first loads a `.env` file from the current
/// directory (or its parents) if one exists
pub fn load_config_with_dotenv(path: impl AsRef<Path>) -> Result<RepositoryConfig> {
    match dotenvy::dotenv() {
        Ok(env_path) => {
            tracing::debug!(path = %env_path.display(), "Loaded .env file");
        }
        Err(e) if e.not_found() => {}
        Err(e) => {
            return Err(RepositoryError::Configuration(format!(
                "Failed to load .env file: {e}"
            )));
        }
    }

    load_config(path)
}

/// Parses configuration from TOML text, applying substitution, overrides and validation
pub fn parse_config(contents: &str) -> Result<RepositoryConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: RepositoryConfig = toml::from_str(&contents)
        .map_err(|e| RepositoryError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        RepositoryError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left alone.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| RepositoryError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(RepositoryError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}")).ok()
}

/// Applies environment variable overrides using the `COSMOS_REPO_*` prefix
///
/// Variables follow the pattern `COSMOS_REPO_<SECTION>_<KEY>`, for example
/// `COSMOS_REPO_COSMOSDB_ENDPOINT`.
fn apply_env_overrides(config: &mut RepositoryConfig) -> Result<()> {
    if let Some(val) = env_override("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    let cosmos = &mut config.cosmosdb;
    if let Some(val) = env_override("COSMOSDB_ENDPOINT") {
        cosmos.endpoint = val;
    }
    if let Some(val) = env_override("COSMOSDB_KEY") {
        cosmos.key = secret_string(val);
    }
    if let Some(val) = env_override("COSMOSDB_NAME") {
        cosmos.name = val;
    }
    if let Some(val) = env_override("COSMOSDB_PARTITION_KEY_PATH") {
        cosmos.partition_key_path = val;
    }
    if let Some(val) = env_override("COSMOSDB_THROUGHPUT") {
        cosmos.throughput = match val.trim() {
            "" | "none" => None,
            raw => Some(raw.parse().map_err(|e| {
                RepositoryError::Configuration(format!(
                    "{ENV_PREFIX}COSMOSDB_THROUGHPUT must be an integer or 'none': {e}"
                ))
            })?),
        };
    }
    if let Some(val) = env_override("COSMOSDB_CONNECTION_MODE") {
        cosmos.connection_mode = val.parse().map_err(RepositoryError::Configuration)?;
    }

    if let Some(val) = env_override("LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Some(val) = env_override("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = env_override("LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
