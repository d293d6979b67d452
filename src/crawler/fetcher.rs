//! Built-in HTTP crawling engine
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - robots.txt checks before fetching
//! - Serving repeat fetches from the page cache
//! - Rendering HTML to markdown and applying the content filter
//! - Error classification into engine failure messages

use crate::config::{Config, UserAgentConfig};
use crate::crawler::cache::{CachedPage, PageCache};
use crate::crawler::engine::{CacheMode, CrawlEngine, EngineError, EngineResult, PageLinks, RunConfig};
use crate::crawler::parser::parse_html;
use crate::crawler::selector::Strategy;
use crate::filter::{ContentFilter, GeminiContentFilter};
use crate::robots::RobotsCache;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// How long fetched bodies stay in the page cache
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Pages held in the cache unless configured otherwise
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```
/// use ingestion_worker::config::UserAgentConfig;
/// use ingestion_worker::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Crawling engine built on reqwest and scraper
pub struct HttpCrawlEngine {
    client: Client,
    cache: PageCache,
    robots: RobotsCache,
    filter: Arc<dyn ContentFilter>,
}

impl HttpCrawlEngine {
    pub fn new(client: Client, user_agent: &UserAgentConfig, filter: Arc<dyn ContentFilter>) -> Self {
        Self {
            robots: RobotsCache::new(client.clone(), user_agent.crawler_name.clone()),
            cache: PageCache::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY),
            client,
            filter,
        }
    }

    /// Builds the engine with a Gemini-backed content filter
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent)?;
        let filter = Arc::new(GeminiContentFilter::new(client.clone(), &config.llm));
        Ok(Self::new(client, &config.user_agent, filter)
            .with_cache(config.crawler.cache_ttl(), config.crawler.cache_capacity))
    }

    /// Replaces the page cache with one holding `capacity` pages for `ttl`
    pub fn with_cache(mut self, ttl: Duration, capacity: usize) -> Self {
        self.cache = PageCache::new(ttl, capacity);
        self
    }

    async fn load(&self, url: &str, config: &RunConfig) -> Result<CachedPage, String> {
        if config.cache_mode == CacheMode::Enabled {
            if let Some(page) = self.cache.get(url) {
                tracing::debug!("Page cache hit for {}", url);
                return Ok(page);
            }
        }

        let response = self
            .client
            .get(url)
            .timeout(config.page_timeout)
            .send()
            .await
            .map_err(describe_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.map_err(describe_error)?;

        let page = CachedPage {
            final_url,
            content_type,
            body,
        };
        if config.cache_mode == CacheMode::Enabled {
            self.cache.insert(url, page.clone());
        }
        Ok(page)
    }
}

#[async_trait]
impl CrawlEngine for HttpCrawlEngine {
    async fn fetch(&self, url: &str, config: &RunConfig) -> Result<EngineResult, EngineError> {
        let target = match Url::parse(url) {
            Ok(target) => target,
            Err(e) => return Ok(EngineResult::failure(url, format!("Invalid URL: {}", e))),
        };

        if config.check_robots_txt && !self.robots.is_allowed(&target).await {
            return Ok(EngineResult::failure(url, "Blocked by robots.txt"));
        }

        let page = match self.load(url, config).await {
            Ok(page) => page,
            Err(message) => return Ok(EngineResult::failure(url, message)),
        };

        let final_url = Url::parse(&page.final_url).unwrap_or(target);
        let (markdown, links) = match render(&page, &final_url, config.exclude_external_links) {
            Ok(rendered) => rendered,
            Err(message) => return Ok(EngineResult::failure(final_url.as_str(), message)),
        };

        let markdown = match &config.strategy {
            Strategy::PassThrough => markdown,
            Strategy::LlmFiltered(_) if markdown.trim().is_empty() => markdown,
            Strategy::LlmFiltered(spec) => {
                let Some(credential) = &config.credential else {
                    return Ok(EngineResult::failure(
                        final_url.as_str(),
                        "Content filter requires an API credential",
                    ));
                };
                match self.filter.filter(&markdown, spec, credential).await {
                    Ok(filtered) => filtered,
                    Err(e) => {
                        return Ok(EngineResult::failure(
                            final_url.as_str(),
                            format!("Content filter failed: {}", e),
                        ))
                    }
                }
            }
        };

        Ok(EngineResult::success(final_url.as_str(), markdown).with_links(links))
    }
}

/// Renders a fetched body to markdown
///
/// HTML is rendered; plain text and markdown pass through unchanged.
fn render(page: &CachedPage, base_url: &Url, exclude_external_links: bool) -> Result<(String, PageLinks), String> {
    let content_type = page.content_type.to_ascii_lowercase();

    if content_type.contains("html") || (content_type.is_empty() && page.body.trim_start().starts_with('<')) {
        let parsed = parse_html(&page.body, base_url, exclude_external_links);
        return Ok((parsed.markdown, parsed.links));
    }

    if content_type.is_empty() || content_type.starts_with("text/") {
        return Ok((page.body.clone(), PageLinks::default()));
    }

    Err(format!("Unsupported content type: {}", page.content_type))
}

fn describe_error(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else if e.is_redirect() {
        "Too many redirects".to_string()
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::selector::LlmFilterSpec;
    use crate::filter::FilterError;
    use crate::security::Credential;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Filter double that upper-cases content
    struct ShoutingFilter;

    #[async_trait]
    impl ContentFilter for ShoutingFilter {
        async fn filter(
            &self,
            markdown: &str,
            _spec: &LlmFilterSpec,
            _credential: &Credential,
        ) -> Result<String, FilterError> {
            Ok(markdown.to_uppercase())
        }
    }

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn create_test_engine() -> HttpCrawlEngine {
        let ua = create_test_config();
        HttpCrawlEngine::new(build_http_client(&ua).unwrap(), &ua, Arc::new(ShoutingFilter))
    }

    fn run_config(strategy: Strategy) -> RunConfig {
        RunConfig {
            cache_mode: CacheMode::Bypass,
            strategy,
            credential: Some(Credential::from("key")),
            exclude_external_links: true,
            page_timeout: Duration::from_secs(5),
            check_robots_txt: false,
        }
    }

    fn llm_strategy() -> Strategy {
        Strategy::LlmFiltered(LlmFilterSpec {
            instruction: "keep docs".to_string(),
            chunk_token_threshold: 8000,
        })
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_html_renders_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    r#"<html><body><h1>Docs</h1><a href="/next">Next</a><a href="https://other.org/">Out</a></body></html>"#,
                    "text/html; charset=utf-8",
                ),
            )
            .mount(&server)
            .await;

        let engine = create_test_engine();
        let url = format!("{}/docs", server.uri());
        let result = engine.fetch(&url, &run_config(Strategy::PassThrough)).await.unwrap();

        assert!(result.success);
        assert!(result.markdown.starts_with("# Docs"));
        assert_eq!(result.links.internal.len(), 1);
        assert!(result.links.external.is_empty());
    }

    #[tokio::test]
    async fn test_plain_text_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("# Site\n\n- [A](/a)"),
            )
            .mount(&server)
            .await;

        let engine = create_test_engine();
        let url = format!("{}/llms.txt", server.uri());
        let result = engine.fetch(&url, &run_config(Strategy::PassThrough)).await.unwrap();

        assert!(result.success);
        assert_eq!(result.markdown, "# Site\n\n- [A](/a)");
    }

    #[tokio::test]
    async fn test_http_error_is_failure_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let engine = create_test_engine();
        let url = format!("{}/down", server.uri());
        let result = engine.fetch(&url, &run_config(Strategy::PassThrough)).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.error_message, "HTTP 503");
    }

    #[tokio::test]
    async fn test_robots_denial() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
            .mount(&server)
            .await;

        let engine = create_test_engine();
        let mut config = run_config(Strategy::PassThrough);
        config.check_robots_txt = true;
        let url = format!("{}/private/page", server.uri());
        let result = engine.fetch(&url, &config).await.unwrap();

        assert!(!result.success);
        assert!(result.error_message.contains("robots.txt"));
    }

    #[tokio::test]
    async fn test_llm_strategy_applies_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<p>hello</p>", "text/html"),
            )
            .mount(&server)
            .await;

        let engine = create_test_engine();
        let url = format!("{}/page", server.uri());
        let result = engine.fetch(&url, &run_config(llm_strategy())).await.unwrap();
        assert_eq!(result.markdown, "HELLO");

        let mut no_key = run_config(llm_strategy());
        no_key.credential = None;
        let result = engine.fetch(&url, &no_key).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("cached"))
            .expect(1)
            .mount(&server)
            .await;

        let engine = create_test_engine();
        let mut config = run_config(Strategy::PassThrough);
        config.cache_mode = CacheMode::Enabled;
        let url = format!("{}/a.txt", server.uri());

        assert_eq!(engine.fetch(&url, &config).await.unwrap().markdown, "cached");
        assert_eq!(engine.fetch(&url, &config).await.unwrap().markdown, "cached");
    }

    #[tokio::test]
    async fn test_cache_capacity_evicts_oldest_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a"))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("b"))
            .expect(1)
            .mount(&server)
            .await;

        let engine = create_test_engine().with_cache(Duration::from_secs(60), 1);
        let mut config = run_config(Strategy::PassThrough);
        config.cache_mode = CacheMode::Enabled;
        let a = format!("{}/a.txt", server.uri());
        let b = format!("{}/b.txt", server.uri());

        engine.fetch(&a, &config).await.unwrap();
        engine.fetch(&b, &config).await.unwrap();
        assert_eq!(engine.fetch(&a, &config).await.unwrap().markdown, "a");
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "application/pdf"))
            .mount(&server)
            .await;

        let engine = create_test_engine();
        let url = format!("{}/doc.pdf", server.uri());
        let result = engine.fetch(&url, &run_config(Strategy::PassThrough)).await.unwrap();

        assert!(!result.success);
        assert!(result.error_message.starts_with("Unsupported content type"));
    }
}
