//! File conversion for document tasks
//!
//! Document engines are blocking. The [`FileConverter`] runs them on tokio's
//! blocking threads, bounded by a fixed number of pool slots, so a slow
//! conversion never stalls task dispatch.

mod docling;
mod local;

pub use docling::DoclingServeEngine;
pub use local::LocalDocumentEngine;

use crate::config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Errors raised while converting a document
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Unsupported document: {0}")]
    Unsupported(String),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conversion engine error: {0}")]
    Engine(String),

    #[error("Conversion service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Conversion did not finish within {after:?}")]
    Timeout { after: Duration },

    #[error("Conversion worker failed: {0}")]
    Pool(String),
}

/// A converted document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    markdown: String,
}

impl Document {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
        }
    }

    pub fn export_to_markdown(&self) -> String {
        self.markdown.clone()
    }
}

/// A blocking document conversion engine
pub trait DocumentEngine: Send + Sync {
    fn convert(&self, path: &Path) -> Result<Document, ConversionError>;
}

/// Runs document conversions on a fixed-size pool of blocking workers
#[derive(Clone)]
pub struct FileConverter {
    engine: Arc<dyn DocumentEngine>,
    slots: Arc<Semaphore>,
    workers: usize,
    timeout: Duration,
}

impl FileConverter {
    /// Creates a converter
    ///
    /// # Arguments
    ///
    /// * `engine` - Blocking conversion engine
    /// * `workers` - Maximum number of simultaneous conversions
    /// * `timeout` - Deadline for one conversion once it has a worker
    pub fn new(engine: Arc<dyn DocumentEngine>, workers: usize, timeout: Duration) -> Self {
        let workers = workers.max(1);
        Self {
            engine,
            slots: Arc::new(Semaphore::new(workers)),
            workers,
            timeout,
        }
    }

    /// Builds the converter from configuration
    ///
    /// Uses docling-serve when `conversion.docling-url` is set, the local engine otherwise.
    pub fn from_config(config: &Config) -> Self {
        let engine: Arc<dyn DocumentEngine> = match &config.conversion.docling_url {
            Some(url) => {
                tracing::info!("Converting documents with docling-serve at {}", url);
                Arc::new(DoclingServeEngine::new(url, config.worker.conversion_timeout()))
            }
            None => {
                tracing::info!("Converting documents locally");
                Arc::new(LocalDocumentEngine)
            }
        };
        Self::new(
            engine,
            config.worker.conversion_workers as usize,
            config.worker.conversion_timeout(),
        )
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Converts the document at `path` to markdown
    ///
    /// Suspends until a pool worker is free, then until the conversion finishes.
    /// The deadline covers both waits. A conversion that outlives it keeps its
    /// worker until the engine returns, so the pool size stays a hard bound.
    pub async fn convert(&self, path: &str) -> Result<String, ConversionError> {
        let deadline = Instant::now() + self.timeout;

        let permit = match tokio::time::timeout_at(deadline, self.slots.clone().acquire_owned()).await {
            Err(_) => {
                tracing::warn!("No conversion worker became free for {} in {:?}", path, self.timeout);
                return Err(ConversionError::Timeout { after: self.timeout });
            }
            Ok(Err(e)) => return Err(ConversionError::Pool(e.to_string())),
            Ok(Ok(permit)) => permit,
        };

        tracing::info!("Starting conversion for {}", path);
        let engine = self.engine.clone();
        let file = PathBuf::from(path);
        let job = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            engine.convert(&file).map(|doc| doc.export_to_markdown())
        });

        match tokio::time::timeout_at(deadline, job).await {
            Err(_) => Err(ConversionError::Timeout { after: self.timeout }),
            Ok(Err(e)) => Err(ConversionError::Pool(e.to_string())),
            Ok(Ok(result)) => {
                if let Err(e) = &result {
                    tracing::error!("Conversion failed for {}: {}", path, e);
                }
                result
            }
        }
    }
}
