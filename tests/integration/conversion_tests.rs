//! Document task tests with the local conversion engine

use ingestion_worker::config::{Config, CrawlerConfig};
use ingestion_worker::conversion::{FileConverter, LocalDocumentEngine};
use ingestion_worker::crawler::{ContentFilterSelector, CrawlOrchestrator};
use ingestion_worker::testing::{ScriptedEngine, TestMessage, TestPublisher};
use ingestion_worker::worker::{
    ConcurrencyLimiter, Dispatcher, FailurePayload, ResultContent, ResultPayload,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn write_document(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn create_file_dispatcher(publisher: Arc<TestPublisher>) -> Dispatcher {
    let config = Config::default();
    let orchestrator = CrawlOrchestrator::new(
        Arc::new(ScriptedEngine::new()),
        ContentFilterSelector::default(),
        CrawlerConfig::default(),
        None,
    );
    Dispatcher::from_config(
        &config,
        Arc::new(orchestrator),
        FileConverter::new(Arc::new(LocalDocumentEngine), 2, Duration::from_secs(5)),
        publisher,
        ConcurrencyLimiter::new(2),
    )
}

#[tokio::test]
async fn test_local_engine_converts_html_file() {
    let file = write_document(".html", "<html><body><h1>Report</h1><p>Quarterly numbers.</p></body></html>");
    let converter = FileConverter::new(Arc::new(LocalDocumentEngine), 1, Duration::from_secs(5));

    let markdown = converter.convert(file.path().to_str().unwrap()).await.unwrap();

    assert!(markdown.contains("Report"));
    assert!(markdown.contains("Quarterly numbers."));
}

#[tokio::test]
async fn test_file_task_publishes_text_content() {
    let file = write_document(".md", "# Notes\n\nMeeting summary.");
    let path = file.path().to_str().unwrap().to_string();
    let publisher = Arc::new(TestPublisher::new());
    let dispatcher = create_file_dispatcher(publisher.clone());

    let message = TestMessage::json(&json!({ "id": "doc-1", "type": "file", "path": path }), 1);
    dispatcher.process(&message).await;

    assert_eq!(message.finish_count(), 1);
    let payloads: Vec<ResultPayload> = publisher.payloads(&Config::default().queue.result_subject);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].source_id, "doc-1");
    assert_eq!(payloads[0].url, path);
    assert_eq!(
        payloads[0].content,
        ResultContent::Text("# Notes\n\nMeeting summary.".to_string())
    );
}

#[tokio::test]
async fn test_missing_file_is_retried_then_reported() {
    let publisher = Arc::new(TestPublisher::new());
    let dispatcher = create_file_dispatcher(publisher.clone());
    let task = json!({ "id": "doc-2", "type": "file", "path": "/nonexistent/report.md" });

    let first = TestMessage::json(&task, 1);
    dispatcher.process(&first).await;
    assert_eq!(first.requeues(), vec![Duration::from_secs(30)]);
    assert_eq!(first.finish_count(), 0);

    let last = TestMessage::json(&task, 4);
    dispatcher.process(&last).await;
    assert_eq!(last.finish_count(), 1);

    let failures: Vec<FailurePayload> = publisher.payloads(&Config::default().queue.result_subject);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].status, "failed");
    assert_eq!(failures[0].url, "/nonexistent/report.md");
}
