//! Ingestion Worker: a queue-driven content ingestion service
//!
//! This crate consumes crawl and document-conversion tasks from a message queue,
//! runs them under a process-wide concurrency limit, and publishes the extracted
//! content (or a terminal failure) back to the queue.

pub mod config;
pub mod conversion;
pub mod crawler;
pub mod filter;
pub mod queue;
pub mod robots;
pub mod security;
pub mod testing;
pub mod url;
pub mod worker;

use std::time::Duration;
use thiserror::Error;

pub use conversion::ConversionError;
pub use filter::FilterError;
pub use queue::{PublishError, QueueError};
pub use worker::DecodeError;

/// Main error type for ingestion operations
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid task {id}: {reason}")]
    InvalidTask { id: String, reason: String },

    #[error("Deadline of {after:?} exceeded for {target}")]
    Timeout { target: String, after: Duration },

    #[error("Crawl failed for {url}: {message}")]
    Crawl { url: String, message: String },

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("No LLM credential available to filter {url}")]
    MissingCredential { url: String },

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Returns true if the failure should go through the attempt-based backoff path
    ///
    /// Deadlines and explicit engine failures are transient from the worker's point of
    /// view. Malformed tasks and missing credentials will fail identically on every
    /// redelivery, so they are reported immediately instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Crawl { .. } | Self::Conversion(_)
        )
    }

    /// Short, stable label for logs and statistics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidTask { .. } => "invalid_task",
            Self::Timeout { .. } => "timeout",
            Self::Crawl { .. } => "crawl",
            Self::Conversion(_) => "conversion",
            Self::MissingCredential { .. } => "missing_credential",
            Self::Publish(_) => "publish",
            Self::Queue(_) => "queue",
            Self::UrlError(_) | Self::UrlParse(_) => "url",
            Self::Reqwest(_) => "http",
            Self::Io(_) => "io",
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlOrchestrator, CrawlResult};
pub use worker::{ConcurrencyLimiter, Dispatcher, TaskEnvelope};
