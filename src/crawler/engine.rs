//! Crawling engine boundary
//!
//! The orchestrator drives any engine implementing [`CrawlEngine`]. An engine
//! reports page-level failures (HTTP errors, robots denial, filter failures) as a
//! non-success [`EngineResult`]; an `Err` is reserved for the engine itself
//! breaking down.

use crate::crawler::selector::Strategy;
use crate::security::Credential;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Whether the engine may answer from its page cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Enabled,
    Bypass,
}

/// Per-fetch engine settings
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cache_mode: CacheMode,
    pub strategy: Strategy,
    /// Credential for [`Strategy::LlmFiltered`]; unused for pass-through
    pub credential: Option<Credential>,
    pub exclude_external_links: bool,
    pub page_timeout: Duration,
    pub check_robots_txt: bool,
}

impl RunConfig {
    /// Pass-through settings with the cache enabled and robots.txt unchecked
    pub fn pass_through(page_timeout: Duration) -> Self {
        Self {
            cache_mode: CacheMode::Enabled,
            strategy: Strategy::PassThrough,
            credential: None,
            exclude_external_links: false,
            page_timeout,
            check_robots_txt: false,
        }
    }
}

/// A link reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    pub href: String,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }
}

/// Links found in the page structure, split by whether they stay on the site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub internal: Vec<Link>,
    pub external: Vec<Link>,
}

/// Outcome of one engine fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineResult {
    pub success: bool,
    pub markdown: String,
    /// Final URL after redirects
    pub url: String,
    pub links: PageLinks,
    pub error_message: String,
}

impl EngineResult {
    pub fn success(url: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            success: true,
            markdown: markdown.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn failure(url: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            url: url.into(),
            error_message: error_message.into(),
            ..Default::default()
        }
    }

    pub fn with_links(mut self, links: PageLinks) -> Self {
        self.links = links;
        self
    }
}

/// Engine breakdown, as opposed to a failed page
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Crawling engine failed: {0}")]
    Internal(String),
}

/// Fetches and renders a single page
#[async_trait]
pub trait CrawlEngine: Send + Sync {
    async fn fetch(&self, url: &str, config: &RunConfig) -> Result<EngineResult, EngineError>;
}
