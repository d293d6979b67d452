//! Dispatcher tests: settlement, retry policy, and payloads

use crate::crawl_tests::{create_orchestrator, create_test_config, mount_site};
use ingestion_worker::config::CrawlerConfig;
use ingestion_worker::conversion::FileConverter;
use ingestion_worker::crawler::{ContentFilterSelector, CrawlOrchestrator, EngineResult};
use ingestion_worker::security::Credential;
use ingestion_worker::testing::{ScriptedEngine, StaticDocumentEngine, TestMessage, TestPublisher};
use ingestion_worker::worker::{
    ConcurrencyLimiter, Dispatcher, FailurePayload, ResultContent, ResultPayload, RetryPolicy,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESULTS: &str = "ingest.result";

fn create_test_dispatcher(engine: ScriptedEngine, publisher: Arc<TestPublisher>) -> Dispatcher {
    let orchestrator = CrawlOrchestrator::new(
        Arc::new(engine),
        ContentFilterSelector::default(),
        CrawlerConfig::default(),
        Some(Credential::from("env-key")),
    );
    Dispatcher::new(
        Arc::new(orchestrator),
        FileConverter::new(Arc::new(StaticDocumentEngine::ok("# Doc")), 2, Duration::from_secs(5)),
        publisher,
        ConcurrencyLimiter::new(2),
        RetryPolicy::new(3, Duration::from_secs(30), Duration::from_secs(10), 5),
        RESULTS,
    )
}

fn flaky_engine() -> ScriptedEngine {
    ScriptedEngine::new().respond(
        "https://example.com/docs",
        EngineResult::failure("https://example.com/docs", "Request timeout"),
    )
}

fn docs_task() -> serde_json::Value {
    json!({ "id": "docs", "type": "web", "url": "https://example.com/docs" })
}

#[tokio::test]
async fn test_success_finishes_exactly_once() {
    let publisher = Arc::new(TestPublisher::new());
    let engine = ScriptedEngine::new().respond(
        "https://example.com/docs",
        EngineResult::success("https://example.com/docs", "# Docs"),
    );
    let dispatcher = create_test_dispatcher(engine, publisher.clone());

    for attempt in 1..=4 {
        let message = TestMessage::json(&docs_task(), attempt);
        dispatcher.process(&message).await;

        assert_eq!(message.finish_count(), 1);
        assert!(message.requeues().is_empty());
    }
    assert_eq!(publisher.payloads::<ResultPayload>(RESULTS).len(), 4);
}

#[tokio::test]
async fn test_retry_schedule_then_terminal_failure() {
    let publisher = Arc::new(TestPublisher::new());
    let dispatcher = create_test_dispatcher(flaky_engine(), publisher.clone());

    let mut delays = Vec::new();
    for attempt in 1..=3 {
        let message = TestMessage::json(&docs_task(), attempt);
        dispatcher.process(&message).await;

        assert_eq!(message.finish_count(), 0);
        delays.extend(message.requeues());
    }
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(90)
        ]
    );
    assert!(publisher.published_messages().is_empty());

    let last = TestMessage::json(&docs_task(), 4);
    dispatcher.process(&last).await;

    assert_eq!(last.finish_count(), 1);
    assert!(last.requeues().is_empty());

    let failures: Vec<FailurePayload> = publisher.payloads(RESULTS);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].source_id, "docs");
    assert_eq!(failures[0].url, "https://example.com/docs");
    assert!(failures[0].error.contains("Request timeout"));

    let stats = dispatcher.stats().snapshot();
    assert_eq!(stats.requeued, 3);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_missing_credential_is_reported_not_retried() {
    let publisher = Arc::new(TestPublisher::new());
    let orchestrator = CrawlOrchestrator::new(
        Arc::new(ScriptedEngine::new()),
        ContentFilterSelector::default(),
        CrawlerConfig::default(),
        None,
    );
    let dispatcher = Dispatcher::new(
        Arc::new(orchestrator),
        FileConverter::new(Arc::new(StaticDocumentEngine::ok("")), 1, Duration::from_secs(5)),
        publisher.clone(),
        ConcurrencyLimiter::new(1),
        RetryPolicy::default(),
        RESULTS,
    );
    let message = TestMessage::json(&docs_task(), 1);

    dispatcher.process(&message).await;

    assert_eq!(message.finish_count(), 1);
    let failures: Vec<FailurePayload> = publisher.payloads(RESULTS);
    assert!(failures[0].error.contains("credential"));
}

#[tokio::test]
async fn test_task_supplied_key_is_never_published() {
    let publisher = Arc::new(TestPublisher::new());
    let dispatcher = create_test_dispatcher(flaky_engine(), publisher.clone());
    let message = TestMessage::json(
        &json!({ "id": "docs", "url": "https://example.com/docs", "api_key": "sk-secret-123" }),
        9,
    );

    dispatcher.process(&message).await;

    let raw = &publisher.published_messages()[0].payload;
    assert!(!String::from_utf8_lossy(raw).contains("sk-secret-123"));
}

#[tokio::test]
async fn test_web_task_end_to_end_over_http() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/llms.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("# Site\n\n- [Manifest Link]({}/manifest-dest)", base),
            "text/plain",
        ))
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let publisher = Arc::new(TestPublisher::new());
    let dispatcher = Dispatcher::from_config(
        &config,
        Arc::new(create_orchestrator(&config)),
        FileConverter::from_config(&config),
        publisher.clone(),
        ConcurrencyLimiter::new(2),
    );

    let message = TestMessage::json(&json!({ "id": "src-9", "url": format!("{}/home", base) }), 1);
    dispatcher.process(&message).await;

    assert_eq!(message.finish_count(), 1);
    let payloads: Vec<ResultPayload> = publisher.payloads(&config.queue.result_subject);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].source_id, "src-9");

    let ResultContent::Pages(pages) = &payloads[0].content else {
        panic!("expected crawl results");
    };
    assert_eq!(pages.len(), 2);
    assert!(pages[0].url.ends_with("/llms.txt"));
    assert!(pages[0].links.contains(&format!("{}/manifest-dest", base)));
    assert!(pages[1].url.ends_with("/home"));
    assert!(pages[1].links.contains(&format!("{}/main-dest", base)));
}
