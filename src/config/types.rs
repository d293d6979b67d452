use crate::security::Credential;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the ingestion worker
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub llm: LlmConfig,
    pub conversion: ConversionConfig,
}

/// Message queue connection and topology
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// NATS server address
    #[serde(rename = "nats-url")]
    pub nats_url: String,

    /// JetStream stream holding task, result, and dead-letter subjects
    pub stream: String,

    /// Subject tasks are consumed from
    #[serde(rename = "task-subject")]
    pub task_subject: String,

    /// Subject result and failure payloads are published to
    #[serde(rename = "result-subject")]
    pub result_subject: String,

    /// Durable consumer name shared by all worker replicas
    pub consumer: String,

    /// Subject undecodable task bodies are parked on (disabled when unset)
    #[serde(rename = "dead-letter-subject")]
    pub dead_letter_subject: Option<String>,

    /// Seconds the broker waits for an ack before redelivering
    #[serde(rename = "ack-wait-secs")]
    pub ack_wait_secs: u64,

    /// Wait for the broker's publish acknowledgment before finishing a message
    #[serde(rename = "await-publish-ack")]
    pub await_publish_ack: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            stream: "INGEST".to_string(),
            task_subject: "ingest.task".to_string(),
            result_subject: "ingest.result".to_string(),
            consumer: "ingestion-worker".to_string(),
            dead_letter_subject: None,
            ack_wait_secs: 360,
            await_publish_ack: true,
        }
    }
}

impl QueueConfig {
    pub fn ack_wait(&self) -> Duration {
        Duration::from_secs(self.ack_wait_secs)
    }
}

/// Task execution and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of tasks running at once
    pub concurrency: u32,

    /// Deliveries after the first that a failing task may use
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Backoff unit; a failed delivery `n` is requeued after `n * retry-backoff-secs`
    #[serde(rename = "retry-backoff-secs")]
    pub retry_backoff_secs: u64,

    /// Fixed requeue delay for bodies that fail to decode
    #[serde(rename = "decode-retry-delay-secs")]
    pub decode_retry_delay_secs: u64,

    /// Delivery attempt at which an undecodable body is dead-lettered
    #[serde(rename = "max-decode-attempts")]
    pub max_decode_attempts: u32,

    /// Size of the blocking pool used for document conversion
    #[serde(rename = "conversion-workers")]
    pub conversion_workers: u32,

    /// Deadline for a single document conversion (milliseconds)
    #[serde(rename = "conversion-timeout-ms")]
    pub conversion_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_retries: 3,
            retry_backoff_secs: 30,
            decode_retry_delay_secs: 10,
            max_decode_attempts: 5,
            conversion_workers: 2,
            conversion_timeout_ms: 300_000,
        }
    }
}

impl WorkerConfig {
    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_millis(self.conversion_timeout_ms)
    }
}

/// Crawl orchestration deadlines and engine flags
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Per-page deadline handed to the crawling engine (milliseconds)
    #[serde(rename = "page-timeout-ms")]
    pub page_timeout_ms: u64,

    /// Outer deadline around the main page fetch (milliseconds)
    #[serde(rename = "crawl-timeout-ms")]
    pub crawl_timeout_ms: u64,

    /// Deadline for best-effort manifest discovery (milliseconds)
    #[serde(rename = "manifest-timeout-ms")]
    pub manifest_timeout_ms: u64,

    /// Ask the engine to honor robots.txt on the main fetch
    #[serde(rename = "respect-robots-txt")]
    pub respect_robots_txt: bool,

    /// Allow the engine to serve fetched bodies from its cache
    #[serde(rename = "cache-enabled")]
    pub cache_enabled: bool,

    /// How long a fetched body may be served from the cache (seconds)
    #[serde(rename = "cache-ttl-secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of pages held in the cache
    #[serde(rename = "cache-capacity")]
    pub cache_capacity: usize,

    /// Ask the engine to drop links that leave the site
    #[serde(rename = "exclude-external-links")]
    pub exclude_external_links: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_timeout_ms: 60_000,
            crawl_timeout_ms: 300_000,
            manifest_timeout_ms: 10_000,
            respect_robots_txt: true,
            cache_enabled: true,
            cache_ttl_secs: 15 * 60,
            cache_capacity: 512,
            exclude_external_links: true,
        }
    }
}

impl CrawlerConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn crawl_timeout(&self) -> Duration {
        Duration::from_millis(self.crawl_timeout_ms)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_millis(self.manifest_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "IngestionWorker".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/ingestion-worker".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// LLM content-filter service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the generative language API
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Model used for content filtering
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum estimated tokens per chunk sent to the model
    #[serde(rename = "chunk-token-threshold")]
    pub chunk_token_threshold: usize,

    /// Process-wide credential; a task-supplied key takes priority
    #[serde(rename = "api-key")]
    pub api_key: Option<Credential>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            temperature: 1.0,
            chunk_token_threshold: 8000,
            api_key: None,
        }
    }
}

/// Document conversion settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// docling-serve endpoint; local conversion only when unset
    #[serde(rename = "docling-url")]
    pub docling_url: Option<String>,
}
