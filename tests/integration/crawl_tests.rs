//! End-to-end crawl tests against mock sites

use ingestion_worker::config::Config;
use ingestion_worker::crawler::{CrawlOrchestrator, HttpCrawlEngine};
use ingestion_worker::security::Credential;
use ingestion_worker::WorkerError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a configuration pointing the LLM filter at the mock server
pub fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.crawler.page_timeout_ms = 2_000;
    config.crawler.crawl_timeout_ms = 5_000;
    config.crawler.manifest_timeout_ms = 300;
    config.llm.base_url = base_url.to_string();
    config.llm.api_key = Some(Credential::from("test-key"));
    config.user_agent.crawler_name = "TestBot".to_string();
    config
}

pub fn create_orchestrator(config: &Config) -> CrawlOrchestrator {
    let engine = HttpCrawlEngine::from_config(config).expect("Failed to build engine");
    CrawlOrchestrator::from_config(Arc::new(engine), config)
}

/// Mounts robots.txt, the target page, and an LLM filter echoing its markdown
pub async fn mount_site(server: &MockServer) {
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(server)
        .await;

    let html = r#"<html><head><title>Home</title></head>
        <body><nav><a href="/">Start</a></nav>
        <h1>Home</h1><p>See <a href="/main-dest">Main Link</a>.</p></body></html>"#;
    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [
                { "text": format!("# Home\n\nSee [Main Link]({}/main-dest).", base) }
            ] } }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_manifest_and_page_are_merged_in_order() {
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
    let results = create_orchestrator(&config)
        .fetch(&format!("{}/home", base), 1)
        .await
        .expect("Crawl failed");

    assert_eq!(results.len(), 2);

    assert!(results[0].url.contains("llms.txt"));
    assert_eq!(results[0].title, "Site");
    assert!(results[0].links.contains(&format!("{}/manifest-dest", base)));

    assert!(results[1].url.contains("home"));
    assert_eq!(results[1].title, "Home");
    assert_eq!(results[1].path, "home");
    assert!(results[1].links.contains(&format!("{}/main-dest", base)));
    assert!(results[1].content.contains("[Main Link]"));
}

#[tokio::test]
async fn test_manifest_timeout_does_not_fail_task() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/llms.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("# Too late", "text/plain")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let results = create_orchestrator(&config)
        .fetch(&format!("{}/home", base), 1)
        .await
        .expect("Manifest timeout must not fail the task");

    assert_eq!(results.len(), 1);
    assert!(results[0].url.contains("home"));
}

#[tokio::test]
async fn test_missing_manifest_yields_single_result() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;

    let config = create_test_config(&base);
    let results = create_orchestrator(&config)
        .fetch(&format!("{}/home", base), 1)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_manifest_target_is_fetched_once_without_filter() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/llms.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("# Docs\n\n- [Guide]({}/guide)", base),
            "text/plain",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&base);
    config.llm.api_key = None;
    let results = create_orchestrator(&config)
        .fetch(&format!("{}/llms.txt", base), 1)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Docs");
    assert!(results[0].links.contains(&format!("{}/guide", base)));
}

#[tokio::test]
async fn test_http_error_is_crawl_error() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let err = create_orchestrator(&config)
        .fetch(&format!("{}/broken", base), 1)
        .await
        .unwrap_err();

    match err {
        WorkerError::Crawl { message, .. } => assert_eq!(message, "HTTP 503"),
        other => panic!("expected crawl error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_robots_disallow_is_crawl_error() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
        .mount(&server)
        .await;

    let config = create_test_config(&base);
    let err = create_orchestrator(&config)
        .fetch(&format!("{}/private/page", base), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Crawl { message, .. } if message.contains("robots.txt")));
}
