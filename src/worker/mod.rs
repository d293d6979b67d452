//! Task intake and execution
//!
//! This module contains the queue-facing half of the worker, including:
//! - Task envelope decoding and result payloads
//! - The retry and backoff policy
//! - The process-wide concurrency limiter
//! - The dispatcher that settles each delivery
//! - The consumer loop feeding deliveries to the dispatcher

mod dispatcher;
mod envelope;
mod limiter;
mod message;
mod payload;
mod retry;
mod stats;

pub use dispatcher::Dispatcher;
pub use envelope::{DecodeError, TaskEnvelope, TaskKind, MAX_DEPTH};
pub use limiter::{ConcurrencyLimiter, LimiterClosed, LimiterPermit};
pub use message::{MessageSource, QueueMessage};
pub use payload::{FailurePayload, ResultContent, ResultPayload};
pub use retry::{DecodeDecision, RetryDecision, RetryPolicy};
pub use stats::{StatsSnapshot, WorkerStats};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Pause after a receive error before pulling again
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Pulls deliveries from `source` and processes them until shutdown
///
/// At most `limiter.capacity()` deliveries are in flight at once; the loop stops
/// pulling while that many are being processed, so unacknowledged messages never
/// pile up inside the process.
///
/// Once `shutdown` resolves (or the source ends) no further deliveries are
/// pulled, and the in-flight ones are drained before returning.
///
/// # Arguments
///
/// * `source` - Deliveries to process; `next()` must be cancel-safe
/// * `dispatcher` - Shared dispatcher
/// * `shutdown` - Resolves when the worker should stop
pub async fn run_consumer<S, F>(mut source: S, dispatcher: Arc<Dispatcher>, shutdown: F)
where
    S: MessageSource,
    F: Future<Output = ()>,
{
    let capacity = dispatcher.limiter().capacity();
    let mut in_flight = JoinSet::new();
    tokio::pin!(shutdown);

    tracing::info!("Consuming tasks with up to {} in flight", capacity);

    loop {
        if in_flight.len() >= capacity {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(joined) = in_flight.join_next() => log_join(joined),
            }
            continue;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => log_join(joined),
            next = source.next() => match next {
                Some(Ok(message)) => {
                    let dispatcher = dispatcher.clone();
                    in_flight.spawn(async move {
                        dispatcher.process(message.as_ref()).await;
                    });
                }
                Some(Err(e)) => {
                    tracing::warn!("Failed to receive task: {}", e);
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                }
                None => {
                    tracing::info!("Task source closed");
                    break;
                }
            },
        }
    }

    if !in_flight.is_empty() {
        tracing::info!("Draining {} in-flight task(s)", in_flight.len());
    }
    while let Some(joined) = in_flight.join_next().await {
        log_join(joined);
    }
    tracing::info!("Consumer stopped: {}", dispatcher.stats().snapshot());
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Task processing panicked: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use crate::conversion::FileConverter;
    use crate::crawler::{ContentFilterSelector, CrawlOrchestrator, EngineResult};
    use crate::testing::{ChannelSource, ScriptedEngine, StaticDocumentEngine, TestMessage, TestPublisher};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn create_test_dispatcher(engine: ScriptedEngine, capacity: usize) -> Arc<Dispatcher> {
        let orchestrator = CrawlOrchestrator::new(
            Arc::new(engine),
            ContentFilterSelector::default(),
            CrawlerConfig::default(),
            None,
        );
        Arc::new(Dispatcher::new(
            Arc::new(orchestrator),
            FileConverter::new(Arc::new(StaticDocumentEngine::ok("")), 1, Duration::from_secs(5)),
            Arc::new(TestPublisher::new()),
            ConcurrencyLimiter::new(capacity),
            RetryPolicy::default(),
            "ingest.result",
        ))
    }

    fn manifest_task(id: usize) -> TestMessage {
        TestMessage::json(&json!({ "id": id.to_string(), "url": format!("https://site{}.com/llms.txt", id) }), 1)
    }

    #[tokio::test]
    async fn test_processes_until_source_closes() {
        let mut engine = ScriptedEngine::new();
        for id in 0..3 {
            let url = format!("https://site{}.com/llms.txt", id);
            engine = engine.respond(&url, EngineResult::success(url.as_str(), "# Manifest"));
        }
        let dispatcher = create_test_dispatcher(engine, 2);
        let (sender, source) = ChannelSource::channel();

        let messages: Vec<TestMessage> = (0..3).map(manifest_task).collect();
        for message in &messages {
            sender.send(Box::new(message.clone())).unwrap();
        }
        drop(sender);

        run_consumer(source, dispatcher.clone(), std::future::pending()).await;

        assert!(messages.iter().all(|m| m.finish_count() == 1));
        assert_eq!(dispatcher.stats().snapshot().succeeded, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_bounded_by_capacity() {
        let mut engine = ScriptedEngine::new();
        for id in 0..5 {
            let url = format!("https://site{}.com/llms.txt", id);
            engine = engine.delay(&url, Duration::from_secs(10), EngineResult::success(url.as_str(), "# M"));
        }
        let dispatcher = create_test_dispatcher(engine, 2);
        let (sender, source) = ChannelSource::channel();
        let pulled = source.pulled();

        for id in 0..5 {
            sender.send(Box::new(manifest_task(id))).unwrap();
        }

        let consumer = tokio::spawn(run_consumer(source, dispatcher, std::future::pending()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), 4);

        drop(sender);
        consumer.await.unwrap();
        assert_eq!(pulled.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_in_flight_tasks() {
        let url = "https://slow.com/llms.txt";
        let engine = ScriptedEngine::new().delay(url, Duration::from_secs(5), EngineResult::success(url, "# Slow"));
        let dispatcher = create_test_dispatcher(engine, 2);
        let (sender, source) = ChannelSource::channel();

        let first = TestMessage::json(&json!({ "id": "a", "url": url }), 1);
        sender.send(Box::new(first.clone())).unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let consumer = tokio::spawn(run_consumer(source, dispatcher, async move {
            let _ = stopped.await;
        }));

        tokio::time::sleep(Duration::from_secs(1)).await;
        stop.send(()).unwrap();

        let late = TestMessage::json(&json!({ "id": "b", "url": url }), 1);
        sender.send(Box::new(late.clone())).unwrap();

        consumer.await.unwrap();
        assert_eq!(first.finish_count(), 1);
        assert!(late.is_unsettled());
    }
}
