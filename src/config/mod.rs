//! Configuration module for the ingestion worker
//!
//! This module handles loading, layering, and validating configuration:
//! - Built-in defaults for every setting
//! - An optional TOML file
//! - Environment variable overrides (including a `.env` file)
//!
//! # Example
//!
//! ```no_run
//! use ingestion_worker::config::load_layered;
//! use std::path::Path;
//!
//! let (config, _hash) = load_layered(Some(Path::new("worker.toml"))).unwrap();
//! println!("Worker will run {} tasks at once", config.worker.concurrency);
//! ```

mod env;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ConversionConfig, CrawlerConfig, LlmConfig, QueueConfig, UserAgentConfig, WorkerConfig,
};

// Re-export loading functions
pub use env::apply_env_overrides;
pub use parser::{compute_config_hash, load_config, load_layered};
pub use validation::validate;
