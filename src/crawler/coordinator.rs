//! Crawl orchestration for a single web task
//!
//! The orchestrator turns one target URL into an ordered list of crawl results:
//! - Best-effort discovery of the site's `llms.txt` manifest
//! - Content-filter selection and credential resolution
//! - The main page fetch under an outer deadline
//! - Metadata extraction for every fetched page

use crate::config::{Config, CrawlerConfig};
use crate::crawler::engine::{CacheMode, CrawlEngine, EngineResult, RunConfig};
use crate::crawler::metadata;
use crate::crawler::selector::ContentFilterSelector;
use crate::security::{resolve_credential, Credential};
use crate::url::{is_manifest_url, is_text_resource, manifest_url, parse_http_url, MANIFEST_FILE};
use crate::WorkerError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use url::Url;

/// One fetched page with its extracted metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub title: String,
    pub path: String,
    pub content: String,
    pub links: BTreeSet<String>,
}

/// Per-task options supplied alongside the target URL
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Task-supplied LLM credential; wins over the configured one
    pub api_key: Option<Credential>,
    /// Links matching any of these are dropped from every result
    pub exclusions: Vec<Regex>,
}

impl FetchOptions {
    pub fn with_api_key(mut self, api_key: Option<Credential>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Compiles link exclusion patterns
    ///
    /// # Returns
    ///
    /// * `Ok(FetchOptions)` - Options with the compiled patterns
    /// * `Err(regex::Error)` - A pattern failed to compile
    pub fn with_exclusions(mut self, patterns: &[String]) -> Result<Self, regex::Error> {
        self.exclusions = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }
}

/// Coordinates manifest discovery and the main fetch for web tasks
pub struct CrawlOrchestrator {
    engine: Arc<dyn CrawlEngine>,
    selector: ContentFilterSelector,
    settings: CrawlerConfig,
    default_credential: Option<Credential>,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `engine` - Crawling engine used for both the manifest and the main fetch
    /// * `selector` - Chooses the content-rendering strategy per URL
    /// * `settings` - Deadlines and engine flags
    /// * `default_credential` - Process-wide LLM credential
    pub fn new(
        engine: Arc<dyn CrawlEngine>,
        selector: ContentFilterSelector,
        settings: CrawlerConfig,
        default_credential: Option<Credential>,
    ) -> Self {
        Self {
            engine,
            selector,
            settings,
            default_credential,
        }
    }

    pub fn from_config(engine: Arc<dyn CrawlEngine>, config: &Config) -> Self {
        Self::new(
            engine,
            ContentFilterSelector::new(config.llm.chunk_token_threshold),
            config.crawler.clone(),
            config.llm.api_key.clone(),
        )
    }

    /// Fetches `url` with default options
    pub async fn fetch(&self, url: &str, depth: u32) -> Result<Vec<CrawlResult>, WorkerError> {
        self.fetch_with(url, depth, &FetchOptions::default()).await
    }

    /// Fetches `url` and, when available, its site manifest
    ///
    /// # Arguments
    ///
    /// * `url` - Target page
    /// * `depth` - Requested crawl depth; only the target page itself is fetched
    /// * `options` - Task credential and link exclusions
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<CrawlResult>)` - The manifest result (if found) followed by the page result
    /// * `Err(WorkerError::Timeout)` - The main fetch exceeded the crawl deadline
    /// * `Err(WorkerError::Crawl)` - The engine reported a failure for the main fetch
    /// * `Err(WorkerError::MissingCredential)` - The page needs LLM filtering and no key is set
    pub async fn fetch_with(
        &self,
        url: &str,
        depth: u32,
        options: &FetchOptions,
    ) -> Result<Vec<CrawlResult>, WorkerError> {
        let target = parse_http_url(url)?;
        tracing::debug!("Crawling {} at depth {}", target, depth);

        let strategy = self.selector.select(target.as_str());
        let credential = if strategy.requires_credential() {
            let credential =
                resolve_credential(options.api_key.as_ref(), self.default_credential.as_ref())
                    .ok_or_else(|| WorkerError::MissingCredential {
                        url: target.to_string(),
                    })?;
            Some(credential.clone())
        } else {
            None
        };

        let mut results = Vec::with_capacity(2);

        if !is_text_resource(target.as_str()) {
            if let Some(manifest) = self.discover_manifest(&target, &options.exclusions).await {
                tracing::info!(
                    "Found manifest {} with {} links",
                    manifest.url,
                    manifest.links.len()
                );
                results.push(manifest);
            }
        }

        let run_config = RunConfig {
            cache_mode: self.cache_mode(),
            strategy,
            credential,
            exclude_external_links: self.settings.exclude_external_links,
            page_timeout: self.settings.page_timeout(),
            check_robots_txt: self.settings.respect_robots_txt,
        };

        let deadline = self.settings.crawl_timeout();
        let result = match tokio::time::timeout(deadline, self.engine.fetch(target.as_str(), &run_config)).await {
            Err(_) => {
                return Err(WorkerError::Timeout {
                    target: target.to_string(),
                    after: deadline,
                })
            }
            Ok(Err(e)) => {
                return Err(WorkerError::Crawl {
                    url: target.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Ok(result)) if !result.success => {
                let message = if result.error_message.is_empty() {
                    "engine reported failure".to_string()
                } else {
                    result.error_message
                };
                return Err(WorkerError::Crawl {
                    url: target.to_string(),
                    message,
                });
            }
            Ok(Ok(result)) => result,
        };

        let fallback_title = is_manifest_url(target.as_str()).then_some(MANIFEST_FILE);
        results.push(build_result(&target, result, &options.exclusions, fallback_title));
        Ok(results)
    }

    /// Fetches the site manifest for `target`
    ///
    /// Never fails; any timeout or engine failure comes back as `None`.
    async fn discover_manifest(&self, target: &Url, exclusions: &[Regex]) -> Option<CrawlResult> {
        let manifest = match manifest_url(target) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::debug!("No manifest location for {}: {}", target, e);
                return None;
            }
        };

        let deadline = self.settings.manifest_timeout();
        let mut config = RunConfig::pass_through(self.settings.page_timeout().min(deadline));
        config.cache_mode = self.cache_mode();

        match tokio::time::timeout(deadline, self.engine.fetch(manifest.as_str(), &config)).await {
            Err(_) => {
                tracing::debug!("Manifest fetch for {} timed out after {:?}", manifest, deadline);
                None
            }
            Ok(Err(e)) => {
                tracing::debug!("Manifest fetch for {} failed: {}", manifest, e);
                None
            }
            Ok(Ok(result)) if !result.success => {
                tracing::debug!("No manifest at {}: {}", manifest, result.error_message);
                None
            }
            Ok(Ok(result)) => Some(build_result(&manifest, result, exclusions, Some(MANIFEST_FILE))),
        }
    }

    fn cache_mode(&self) -> CacheMode {
        if self.settings.cache_enabled {
            CacheMode::Enabled
        } else {
            CacheMode::Bypass
        }
    }
}

/// Builds a crawl result from a successful engine fetch
///
/// Metadata is derived against the final URL the engine reports, falling back
/// to the requested one.
fn build_result(
    requested: &Url,
    result: EngineResult,
    exclusions: &[Regex],
    fallback_title: Option<&str>,
) -> CrawlResult {
    let page_url = Url::parse(&result.url).unwrap_or_else(|_| requested.clone());
    let mut meta = metadata::extract(&result.markdown, &page_url, &result.links.internal);

    meta.links
        .retain(|link| !exclusions.iter().any(|re| re.is_match(link)));

    let title = match fallback_title {
        Some(fallback) if meta.title.is_empty() => fallback.to_string(),
        _ => meta.title,
    };

    CrawlResult {
        url: page_url.to_string(),
        title,
        path: meta.path,
        content: result.markdown,
        links: meta.links,
    }
}
