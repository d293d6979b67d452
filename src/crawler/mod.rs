//! Crawler module for web tasks
//!
//! This module contains the web side of the worker, including:
//! - Crawl orchestration (manifest discovery, main fetch, deadlines)
//! - Content-filter selection per URL
//! - Metadata extraction from rendered pages
//! - The crawling engine boundary and a built-in HTTP engine

mod cache;
mod coordinator;
mod engine;
mod fetcher;
mod metadata;
mod parser;
mod selector;

pub use coordinator::{CrawlOrchestrator, CrawlResult, FetchOptions};
pub use engine::{CacheMode, CrawlEngine, EngineError, EngineResult, Link, PageLinks, RunConfig};
pub use fetcher::{build_http_client, HttpCrawlEngine, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
pub use metadata::{extract, extract_links, extract_title, PageMetadata};
pub use parser::{html_to_markdown, parse_html, ParsedPage};
pub use selector::{
    ContentFilterSelector, LlmFilterSpec, Strategy, DEFAULT_CHUNK_TOKEN_THRESHOLD,
    EXTRACTION_INSTRUCTION,
};
