//! In-process test doubles
//!
//! These stand in for the broker, the crawling engine, and the document engine
//! so dispatcher behavior can be tested without NATS or network access.

use crate::conversion::{ConversionError, Document, DocumentEngine};
use crate::crawler::{CrawlEngine, EngineError, EngineResult, RunConfig};
use crate::queue::{PublishError, PublishReceipt, Publisher};
use crate::worker::{MessageSource, QueueMessage};
use crate::QueueError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct MessageState {
    finished: AtomicUsize,
    requeues: RwLock<Vec<Duration>>,
}

/// A queue message that records how it was settled
///
/// Clones share their record, so a test can keep one handle while the other is
/// handed to the code under test.
#[derive(Debug, Clone)]
pub struct TestMessage {
    body: Vec<u8>,
    attempts: u32,
    state: Arc<MessageState>,
}

impl TestMessage {
    pub fn new(body: impl Into<Vec<u8>>, attempts: u32) -> Self {
        Self {
            body: body.into(),
            attempts,
            state: Arc::new(MessageState::default()),
        }
    }

    /// A message whose body is the JSON encoding of `value`
    pub fn json(value: &serde_json::Value, attempts: u32) -> Self {
        Self::new(value.to_string(), attempts)
    }

    /// Number of times the message was finished
    pub fn finish_count(&self) -> usize {
        self.state.finished.load(Ordering::SeqCst)
    }

    /// Delays of every requeue, in call order
    pub fn requeues(&self) -> Vec<Duration> {
        self.state
            .requeues
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// True if the message was neither finished nor requeued
    pub fn is_unsettled(&self) -> bool {
        self.finish_count() == 0 && self.requeues().is_empty()
    }
}

#[async_trait]
impl QueueMessage for TestMessage {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }

    async fn finish(&self) -> Result<(), QueueError> {
        self.state.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn requeue(&self, delay: Duration) -> Result<(), QueueError> {
        self.state
            .requeues
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(delay);
        Ok(())
    }
}

/// How a [`TestPublisher`] answers publish calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Record the payload and acknowledge it
    Accept,
    /// Refuse the handoff; nothing is recorded
    Reject,
    /// Record the payload but fail the acknowledgment
    Unacknowledged,
}

/// A published message
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

/// A publisher that records payloads in memory
#[derive(Debug)]
pub struct TestPublisher {
    published: RwLock<Vec<PublishedMessage>>,
    mode: RwLock<PublishMode>,
}

impl Default for TestPublisher {
    fn default() -> Self {
        Self::with_mode(PublishMode::Accept)
    }
}

impl TestPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: PublishMode) -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            mode: RwLock::new(mode),
        }
    }

    pub fn set_mode(&self, mode: PublishMode) {
        *self.mode.write().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    /// All recorded messages
    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Recorded messages for a specific subject
    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published_messages()
            .into_iter()
            .filter(|m| m.subject == subject)
            .collect()
    }

    /// Decodes every JSON payload recorded for `subject`
    pub fn payloads<T: DeserializeOwned>(&self, subject: &str) -> Vec<T> {
        self.messages_for_subject(subject)
            .iter()
            .filter_map(|m| serde_json::from_slice(&m.payload).ok())
            .collect()
    }
}

#[async_trait]
impl Publisher for TestPublisher {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishReceipt, PublishError> {
        let mode = *self.mode.read().unwrap_or_else(|e| e.into_inner());
        if mode == PublishMode::Reject {
            return Err(PublishError::Rejected("test publisher rejects".to_string()));
        }

        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage {
                subject: subject.to_string(),
                payload,
            });

        Ok(match mode {
            PublishMode::Unacknowledged => PublishReceipt::failed(PublishError::Unacknowledged(
                "test publisher never acknowledges".to_string(),
            )),
            _ => PublishReceipt::acknowledged(),
        })
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(EngineResult),
    Delay(Duration, EngineResult),
    Fail(String),
}

/// A crawling engine answering from a per-URL script
///
/// Unscripted URLs come back as an HTTP 404 failure result.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    script: RwLock<HashMap<String, Scripted>>,
    calls: RwLock<Vec<(String, RunConfig)>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, result: EngineResult) -> Self {
        self.script_url(url, Scripted::Respond(result))
    }

    /// Answers `url` only after `delay`
    pub fn delay(self, url: &str, delay: Duration, result: EngineResult) -> Self {
        self.script_url(url, Scripted::Delay(delay, result))
    }

    /// Makes the engine itself error on `url`
    pub fn fail(self, url: &str, message: &str) -> Self {
        self.script_url(url, Scripted::Fail(message.to_string()))
    }

    fn script_url(self, url: &str, entry: Scripted) -> Self {
        self.script
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string(), entry);
        self
    }

    /// URLs fetched so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Run configurations passed with each call, in call order
    pub fn configs(&self) -> Vec<RunConfig> {
        self.calls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, config)| config.clone())
            .collect()
    }
}

#[async_trait]
impl CrawlEngine for ScriptedEngine {
    async fn fetch(&self, url: &str, config: &RunConfig) -> Result<EngineResult, EngineError> {
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((url.to_string(), config.clone()));

        let entry = self
            .script
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned();

        match entry {
            Some(Scripted::Respond(result)) => Ok(result),
            Some(Scripted::Delay(delay, result)) => {
                tokio::time::sleep(delay).await;
                Ok(result)
            }
            Some(Scripted::Fail(message)) => Err(EngineError::Internal(message)),
            None => Ok(EngineResult::failure(url, "HTTP 404")),
        }
    }
}

/// A document engine returning a fixed outcome
#[derive(Debug, Clone)]
pub struct StaticDocumentEngine {
    outcome: Result<String, String>,
    delay: Option<Duration>,
}

impl StaticDocumentEngine {
    pub fn ok(markdown: &str) -> Self {
        Self {
            outcome: Ok(markdown.to_string()),
            delay: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            delay: None,
        }
    }

    /// Blocks the pool thread for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl DocumentEngine for StaticDocumentEngine {
    fn convert(&self, _path: &Path) -> Result<Document, ConversionError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match &self.outcome {
            Ok(markdown) => Ok(Document::new(markdown.as_str())),
            Err(message) => Err(ConversionError::Engine(message.clone())),
        }
    }
}

/// A message source fed through an in-process channel
///
/// The source ends once every sender is dropped.
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<Box<dyn QueueMessage>>,
    pulled: Arc<AtomicUsize>,
}

impl ChannelSource {
    pub fn channel() -> (mpsc::UnboundedSender<Box<dyn QueueMessage>>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let source = Self {
            receiver,
            pulled: Arc::new(AtomicUsize::new(0)),
        };
        (sender, source)
    }

    /// Shared counter of deliveries handed out so far
    pub fn pulled(&self) -> Arc<AtomicUsize> {
        self.pulled.clone()
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next(&mut self) -> Option<Result<Box<dyn QueueMessage>, QueueError>> {
        let message = self.receiver.recv().await?;
        self.pulled.fetch_add(1, Ordering::SeqCst);
        Some(Ok(message))
    }
}
