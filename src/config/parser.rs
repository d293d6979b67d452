use crate::config::env::apply_env_overrides;
use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Missing keys and sections take their built-in defaults. The file alone is
/// validated; environment overrides are not applied here.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so replicas running different configurations are easy to spot.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Resolves the effective configuration for the process
///
/// Layers, lowest priority first:
/// 1. Built-in defaults
/// 2. The TOML file at `path`, when given
/// 3. A `.env` file in the working directory, when present
/// 4. Process environment variables
///
/// # Returns
///
/// * `Ok((Config, Option<String>))` - The validated configuration and the file hash, if a file was read
/// * `Err(ConfigError)` - Any layer failed to load or the result is invalid
pub fn load_layered(path: Option<&Path>) -> Result<(Config, Option<String>), ConfigError> {
    let (mut config, hash) = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            (config, Some(compute_config_hash(path)?))
        }
        None => (Config::default(), None),
    };

    // A missing .env file is the normal production case
    let _ = dotenvy::dotenv();

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;

    Ok((config, hash))
}
