//! Task dispatch
//!
//! The dispatcher owns the lifecycle of one delivery:
//! - Decode the body, requeueing or dead-lettering undecodable ones
//! - Admit the task through the concurrency limiter
//! - Route it to the crawl orchestrator or the file converter
//! - Publish the result or failure payload
//! - Finish or requeue the message according to the retry policy
//!
//! A message is settled at most once per delivery. When a payload cannot be
//! handed to the broker the message is left unsettled so the broker redelivers it.

use crate::config::Config;
use crate::conversion::{ConversionError, FileConverter};
use crate::crawler::{CrawlOrchestrator, FetchOptions};
use crate::queue::{publish_json, PublishError, PublishReceipt, Publisher};
use crate::worker::limiter::ConcurrencyLimiter;
use crate::worker::message::QueueMessage;
use crate::worker::payload::{FailurePayload, ResultContent, ResultPayload};
use crate::worker::retry::{DecodeDecision, RetryDecision, RetryPolicy};
use crate::worker::stats::WorkerStats;
use crate::worker::{DecodeError, TaskEnvelope, TaskKind};
use crate::WorkerError;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

/// Routes deliveries to handlers and settles them
pub struct Dispatcher {
    orchestrator: Arc<CrawlOrchestrator>,
    converter: FileConverter,
    publisher: Arc<dyn Publisher>,
    limiter: ConcurrencyLimiter,
    policy: RetryPolicy,
    stats: Arc<WorkerStats>,
    result_subject: String,
    dead_letter_subject: Option<String>,
    await_publish_ack: bool,
}

impl Dispatcher {
    /// Creates a dispatcher with strict publish acknowledgment and no dead-letter subject
    ///
    /// # Arguments
    ///
    /// * `orchestrator` - Handler for web tasks
    /// * `converter` - Handler for file tasks
    /// * `publisher` - Process-wide publisher for payloads
    /// * `limiter` - Process-wide admission gate
    /// * `policy` - Retry and backoff policy
    /// * `result_subject` - Subject result and failure payloads go to
    pub fn new(
        orchestrator: Arc<CrawlOrchestrator>,
        converter: FileConverter,
        publisher: Arc<dyn Publisher>,
        limiter: ConcurrencyLimiter,
        policy: RetryPolicy,
        result_subject: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            converter,
            publisher,
            limiter,
            policy,
            stats: Arc::new(WorkerStats::new()),
            result_subject: result_subject.into(),
            dead_letter_subject: None,
            await_publish_ack: true,
        }
    }

    /// Builds a dispatcher from configuration around already-constructed singletons
    pub fn from_config(
        config: &Config,
        orchestrator: Arc<CrawlOrchestrator>,
        converter: FileConverter,
        publisher: Arc<dyn Publisher>,
        limiter: ConcurrencyLimiter,
    ) -> Self {
        Self::new(
            orchestrator,
            converter,
            publisher,
            limiter,
            RetryPolicy::from_config(&config.worker),
            config.queue.result_subject.clone(),
        )
        .with_dead_letter_subject(config.queue.dead_letter_subject.clone())
        .with_await_publish_ack(config.queue.await_publish_ack)
    }

    pub fn with_dead_letter_subject(mut self, subject: Option<String>) -> Self {
        self.dead_letter_subject = subject;
        self
    }

    /// Whether to wait for the broker's acknowledgment before finishing a message
    pub fn with_await_publish_ack(mut self, await_ack: bool) -> Self {
        self.await_publish_ack = await_ack;
        self
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }

    /// Processes one delivery to completion
    ///
    /// Never returns an error: every outcome is expressed by how the message is
    /// settled and what is published.
    pub async fn process(&self, message: &dyn QueueMessage) {
        let attempt = message.attempts();

        let task = match TaskEnvelope::decode(message.body()) {
            Ok(task) => task,
            Err(e) => {
                self.handle_decode_error(message, attempt, e).await;
                return;
            }
        };

        // Held until this function returns, whichever branch runs
        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::warn!("Task {} not admitted: {}", task.id, e);
                return;
            }
        };

        tracing::info!(
            "Processing {} task {} for {} (attempt {})",
            task.resolved_kind().map_or("unknown", |k| k.as_str()),
            task.id,
            task.result_url(),
            attempt
        );

        match self.handle(&task).await {
            Ok(content) => self.complete(message, &task, content).await,
            Err(e) => self.fail(message, &task, attempt, e).await,
        }
    }

    /// Runs the handler for the task's kind
    async fn handle(&self, task: &TaskEnvelope) -> Result<ResultContent, WorkerError> {
        match task.resolved_kind() {
            Some(TaskKind::Web) => {
                let url = non_empty(&task.url).ok_or_else(|| invalid(task, "web task has no url"))?;
                let options = FetchOptions::default()
                    .with_api_key(task.api_key.clone())
                    .with_exclusions(&task.exclusions)
                    .map_err(|e| invalid(task, format!("invalid exclusion pattern: {}", e)))?;

                if task.depth.is_some_and(|d| d > task.effective_depth()) {
                    tracing::debug!(
                        "Task {} asked for depth {:?}; crawling depth {}",
                        task.id,
                        task.depth,
                        task.effective_depth()
                    );
                }

                let pages = self
                    .orchestrator
                    .fetch_with(url, task.effective_depth(), &options)
                    .await?;
                Ok(ResultContent::Pages(pages))
            }
            Some(TaskKind::File) => {
                let path = non_empty(&task.path).ok_or_else(|| invalid(task, "file task has no path"))?;
                let text = self.converter.convert(path).await.map_err(|e| match e {
                    ConversionError::Timeout { after } => WorkerError::Timeout {
                        target: path.to_string(),
                        after,
                    },
                    other => WorkerError::Conversion(other),
                })?;
                Ok(ResultContent::Text(text))
            }
            None => Err(invalid(task, "task has no type, url, or path")),
        }
    }

    async fn complete(&self, message: &dyn QueueMessage, task: &TaskEnvelope, content: ResultContent) {
        let payload = ResultPayload::new(task, content);
        if let Err(e) = self.publish(&self.result_subject, &payload).await {
            self.stats.record_publish_failure();
            tracing::error!(
                "Failed to publish result for task {}; leaving it for redelivery: {}",
                task.id,
                e
            );
            return;
        }

        if let Err(e) = message.finish().await {
            tracing::warn!("Failed to finish task {}: {}", task.id, e);
            return;
        }
        self.stats.record_success();
        tracing::info!("Task {} completed", task.id);
    }

    async fn fail(&self, message: &dyn QueueMessage, task: &TaskEnvelope, attempt: u32, error: WorkerError) {
        if error.is_retryable() {
            if let RetryDecision::Requeue(delay) = self.policy.decide(attempt) {
                tracing::warn!(
                    "Task {} failed on attempt {}/{} ({}); retrying in {:?}: {}",
                    task.id,
                    attempt,
                    self.policy.max_retries(),
                    error.kind(),
                    delay,
                    error
                );
                match message.requeue(delay).await {
                    Ok(()) => self.stats.record_requeue(),
                    Err(e) => tracing::warn!("Failed to requeue task {}: {}", task.id, e),
                }
                return;
            }
            tracing::error!(
                "Task {} failed after {} attempts: {}",
                task.id,
                attempt,
                error
            );
        } else {
            tracing::error!("Task {} failed permanently ({}): {}", task.id, error.kind(), error);
        }

        let payload = FailurePayload::new(task, error.to_string());
        if let Err(e) = self.publish(&self.result_subject, &payload).await {
            self.stats.record_publish_failure();
            tracing::error!(
                "Failed to publish failure for task {}; leaving it for redelivery: {}",
                task.id,
                e
            );
            return;
        }

        match message.finish().await {
            Ok(()) => self.stats.record_failure(),
            Err(e) => tracing::warn!("Failed to finish task {}: {}", task.id, e),
        }
    }

    async fn handle_decode_error(&self, message: &dyn QueueMessage, attempt: u32, error: DecodeError) {
        self.stats.record_decode_error();

        match self
            .policy
            .decide_decode(attempt, self.dead_letter_subject.is_some())
        {
            DecodeDecision::Requeue(delay) => {
                tracing::warn!(
                    "Undecodable message on attempt {}; requeueing in {:?}: {}",
                    attempt,
                    delay,
                    error
                );
                if let Err(e) = message.requeue(delay).await {
                    tracing::warn!("Failed to requeue undecodable message: {}", e);
                }
            }
            DecodeDecision::DeadLetter => {
                let Some(subject) = self.dead_letter_subject.as_deref() else {
                    return;
                };
                tracing::error!(
                    "Undecodable message after {} attempts; moving it to {}: {}",
                    attempt,
                    subject,
                    error
                );

                let body = Bytes::copy_from_slice(message.body());
                let handoff = self.publisher.publish(subject, body).await;
                if let Err(e) = self.confirm(handoff).await {
                    self.stats.record_publish_failure();
                    tracing::error!("Failed to dead-letter message: {}", e);
                    return;
                }

                match message.finish().await {
                    Ok(()) => self.stats.record_dead_letter(),
                    Err(e) => tracing::warn!("Failed to finish dead-lettered message: {}", e),
                }
            }
        }
    }

    async fn publish<T: Serialize + Sync>(&self, subject: &str, payload: &T) -> Result<(), PublishError> {
        let handoff = publish_json(self.publisher.as_ref(), subject, payload).await;
        self.confirm(handoff).await
    }

    /// Applies the configured acknowledgment strictness to a publish handoff
    async fn confirm(&self, handoff: Result<PublishReceipt, PublishError>) -> Result<(), PublishError> {
        let receipt = handoff?;
        if self.await_publish_ack {
            return receipt.await;
        }

        tokio::spawn(async move {
            if let Err(e) = receipt.await {
                tracing::warn!("Publish was not acknowledged: {}", e);
            }
        });
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(task: &TaskEnvelope, reason: impl Into<String>) -> WorkerError {
    WorkerError::InvalidTask {
        id: task.id.clone(),
        reason: reason.into(),
    }
}
