//! Environment variable overrides
//!
//! Deployments configure the worker through the environment; any variable that is
//! set replaces the value from the TOML file (or the built-in default).

use crate::config::types::Config;
use crate::security::Credential;
use crate::ConfigError;
use std::str::FromStr;

/// Applies environment overrides to a configuration
///
/// `lookup` returns the value of a variable, or `None` when it is unset. Passing
/// the lookup in keeps this testable without mutating the process environment.
///
/// # Returns
///
/// * `Ok(())` - All set variables were applied
/// * `Err(ConfigError::InvalidEnv)` - A variable was set to an unparseable value
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = get("NATS_URL") {
        config.queue.nats_url = v;
    }
    if let Some(v) = get("NATS_STREAM") {
        config.queue.stream = v;
    }
    if let Some(v) = get("NATS_TOPIC_INGEST") {
        config.queue.task_subject = v;
    }
    if let Some(v) = get("NATS_TOPIC_RESULT") {
        config.queue.result_subject = v;
    }
    if let Some(v) = get("NATS_TOPIC_DLQ") {
        config.queue.dead_letter_subject = Some(v);
    }
    if let Some(v) = get("NATS_CONSUMER") {
        config.queue.consumer = v;
    }
    if let Some(v) = get("AWAIT_PUBLISH_ACK") {
        config.queue.await_publish_ack = parse_bool("AWAIT_PUBLISH_ACK", &v)?;
    }

    if let Some(v) = get("WORKER_CONCURRENCY") {
        config.worker.concurrency = parse("WORKER_CONCURRENCY", &v)?;
    }
    if let Some(v) = get("MAX_RETRIES") {
        config.worker.max_retries = parse("MAX_RETRIES", &v)?;
    }
    if let Some(v) = get("RETRY_BACKOFF_SECS") {
        config.worker.retry_backoff_secs = parse("RETRY_BACKOFF_SECS", &v)?;
    }
    if let Some(v) = get("CONVERSION_WORKERS") {
        config.worker.conversion_workers = parse("CONVERSION_WORKERS", &v)?;
    }

    if let Some(v) = get("CRAWLER_PAGE_TIMEOUT") {
        config.crawler.page_timeout_ms = parse("CRAWLER_PAGE_TIMEOUT", &v)?;
    }
    if let Some(v) = get("CRAWLER_TIMEOUT") {
        config.crawler.crawl_timeout_ms = parse("CRAWLER_TIMEOUT", &v)?;
    }
    if let Some(v) = get("MANIFEST_TIMEOUT") {
        config.crawler.manifest_timeout_ms = parse("MANIFEST_TIMEOUT", &v)?;
    }

    if let Some(v) = get("GEMINI_API_KEY") {
        config.llm.api_key = Some(Credential::new(v));
    }
    if let Some(v) = get("LLM_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = get("LLM_BASE_URL") {
        config.llm.base_url = v;
    }
    if let Some(v) = get("LLM_CHUNK_TOKEN_THRESHOLD") {
        config.llm.chunk_token_threshold = parse("LLM_CHUNK_TOKEN_THRESHOLD", &v)?;
    }

    if let Some(v) = get("DOCLING_URL") {
        config.conversion.docling_url = Some(v);
    }

    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_no_variables_keeps_defaults() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, lookup_from(&[])).unwrap();
        assert_eq!(config.crawler.page_timeout_ms, 60_000);
        assert_eq!(config.worker.max_retries, 3);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_timeouts_and_retries_override() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("CRAWLER_PAGE_TIMEOUT", "120000"),
                ("CRAWLER_TIMEOUT", "600000"),
                ("MANIFEST_TIMEOUT", "5000"),
                ("MAX_RETRIES", "5"),
                ("WORKER_CONCURRENCY", "4"),
            ]),
        )
        .unwrap();

        assert_eq!(config.crawler.page_timeout_ms, 120_000);
        assert_eq!(config.crawler.crawl_timeout_ms, 600_000);
        assert_eq!(config.crawler.manifest_timeout_ms, 5_000);
        assert_eq!(config.worker.max_retries, 5);
        assert_eq!(config.worker.concurrency, 4);
    }

    #[test]
    fn test_queue_topology_override() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("NATS_URL", "nats://queue:4222"),
                ("NATS_TOPIC_INGEST", "tasks"),
                ("NATS_TOPIC_RESULT", "results"),
                ("NATS_TOPIC_DLQ", "tasks.dead"),
                ("AWAIT_PUBLISH_ACK", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(config.queue.nats_url, "nats://queue:4222");
        assert_eq!(config.queue.task_subject, "tasks");
        assert_eq!(config.queue.result_subject, "results");
        assert_eq!(config.queue.dead_letter_subject.as_deref(), Some("tasks.dead"));
        assert!(!config.queue.await_publish_ack);
    }

    #[test]
    fn test_api_key_is_wrapped() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, lookup_from(&[("GEMINI_API_KEY", "secret")])).unwrap();
        let key = config.llm.api_key.as_ref().unwrap();
        assert_eq!(key.expose(), "secret");
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_blank_variable_is_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, lookup_from(&[("MAX_RETRIES", "  ")])).unwrap();
        assert_eq!(config.worker.max_retries, 3);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, lookup_from(&[("CRAWLER_TIMEOUT", "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { key, .. }) if key == "CRAWLER_TIMEOUT"));
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, lookup_from(&[("AWAIT_PUBLISH_ACK", "maybe")]));
        assert!(result.is_err());
    }
}
