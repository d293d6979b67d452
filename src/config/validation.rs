use crate::config::types::{
    Config, ConversionConfig, CrawlerConfig, LlmConfig, QueueConfig, UserAgentConfig, WorkerConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_queue_config(&config.queue)?;
    validate_worker_config(&config.worker)?;
    validate_crawler_config(&config.crawler)?;
    validate_deadlines(&config.queue, &config.crawler, &config.worker)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_llm_config(&config.llm)?;
    validate_conversion_config(&config.conversion)?;
    Ok(())
}

/// Validates queue connection and subject names
fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    let nats = Url::parse(&config.nats_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid nats-url: {}", e)))?;
    if !matches!(nats.scheme(), "nats" | "tls" | "ws" | "wss") {
        return Err(ConfigError::InvalidUrl(format!(
            "nats-url must use nats://, tls://, ws:// or wss://, got '{}'",
            config.nats_url
        )));
    }

    for (name, value) in [
        ("stream", &config.stream),
        ("task-subject", &config.task_subject),
        ("result-subject", &config.result_subject),
        ("consumer", &config.consumer),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.task_subject == config.result_subject {
        return Err(ConfigError::Validation(format!(
            "task-subject and result-subject must differ, both are '{}'",
            config.task_subject
        )));
    }

    if let Some(dlq) = &config.dead_letter_subject {
        if dlq.trim().is_empty() {
            return Err(ConfigError::Validation(
                "dead-letter-subject cannot be empty when set".to_string(),
            ));
        }
        if dlq == &config.task_subject || dlq == &config.result_subject {
            return Err(ConfigError::Validation(format!(
                "dead-letter-subject '{}' must differ from the task and result subjects",
                dlq
            )));
        }
    }

    Ok(())
}

/// Validates worker capacity and retry settings
fn validate_worker_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.conversion_workers < 1 || config.conversion_workers > 32 {
        return Err(ConfigError::Validation(format!(
            "conversion-workers must be between 1 and 32, got {}",
            config.conversion_workers
        )));
    }

    if config.retry_backoff_secs == 0 {
        return Err(ConfigError::Validation(
            "retry-backoff-secs must be >= 1".to_string(),
        ));
    }

    if config.max_decode_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-decode-attempts must be >= 1, got {}",
            config.max_decode_attempts
        )));
    }

    if config.conversion_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "conversion-timeout-ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawl deadlines
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.page_timeout_ms == 0 || config.crawl_timeout_ms == 0 || config.manifest_timeout_ms == 0
    {
        return Err(ConfigError::Validation(
            "crawler timeouts must all be > 0".to_string(),
        ));
    }

    if config.page_timeout_ms > config.crawl_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "page-timeout-ms ({}) cannot exceed crawl-timeout-ms ({})",
            config.page_timeout_ms, config.crawl_timeout_ms
        )));
    }

    if config.manifest_timeout_ms >= config.crawl_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "manifest-timeout-ms ({}) must be shorter than crawl-timeout-ms ({})",
            config.manifest_timeout_ms, config.crawl_timeout_ms
        )));
    }

    if config.cache_capacity == 0 {
        return Err(ConfigError::Validation(
            "cache-capacity must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// The broker must not redeliver a task that is still inside its deadlines
fn validate_deadlines(
    queue: &QueueConfig,
    crawler: &CrawlerConfig,
    worker: &WorkerConfig,
) -> Result<(), ConfigError> {
    let longest_crawl = crawler.crawl_timeout() + crawler.manifest_timeout();
    if queue.ack_wait() <= longest_crawl {
        return Err(ConfigError::Validation(format!(
            "ack-wait-secs ({}s) must exceed crawl + manifest timeouts ({}s)",
            queue.ack_wait_secs,
            longest_crawl.as_secs()
        )));
    }

    // Covers the wait for a pool slot as well as the conversion itself
    if queue.ack_wait() <= worker.conversion_timeout() {
        return Err(ConfigError::Validation(format!(
            "ack-wait-secs ({}s) must exceed conversion-timeout-ms ({}ms)",
            queue.ack_wait_secs, worker.conversion_timeout_ms
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the LLM filter settings
fn validate_llm_config(config: &LlmConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid llm base-url: {}", e)))?;

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm model cannot be empty".to_string()));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "llm temperature must be between 0.0 and 2.0, got {}",
            config.temperature
        )));
    }

    if config.chunk_token_threshold < 100 {
        return Err(ConfigError::Validation(format!(
            "chunk-token-threshold must be >= 100, got {}",
            config.chunk_token_threshold
        )));
    }

    Ok(())
}

fn validate_conversion_config(config: &ConversionConfig) -> Result<(), ConfigError> {
    if let Some(docling) = &config.docling_url {
        Url::parse(docling)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid docling-url: {}", e)))?;
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    // Must contain exactly one @ with text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
