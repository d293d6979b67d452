//! NATS JetStream transport
//!
//! Tasks are consumed through a durable pull consumer shared by every worker
//! replica. The broker counts deliveries, which is what the dispatcher's retry
//! policy reads through [`QueueMessage::attempts`].

use crate::config::QueueConfig;
use crate::queue::{PublishError, PublishReceipt, Publisher, QueueError};
use crate::worker::{MessageSource, QueueMessage};
use async_nats::jetstream::{self, consumer::pull, consumer::AckPolicy, consumer::PullConsumer, AckKind};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;

/// Connected NATS client and JetStream context
///
/// Created once at startup. Publisher and source handles are cheap clones of
/// the same connection.
pub struct NatsTransport {
    client: async_nats::Client,
    context: jetstream::Context,
    config: QueueConfig,
}

impl NatsTransport {
    /// Connects to the broker and ensures the stream exists
    ///
    /// # Arguments
    ///
    /// * `config` - Queue settings (address, stream, subjects)
    ///
    /// # Returns
    ///
    /// * `Ok(NatsTransport)` - Connected, with the stream covering all configured subjects
    /// * `Err(QueueError)` - Connection or stream setup failed
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = async_nats::connect(config.nats_url.as_str())
            .await
            .map_err(|e| QueueError::Connect {
                url: config.nats_url.clone(),
                message: e.to_string(),
            })?;

        let context = jetstream::new(client.clone());

        let mut subjects = vec![config.task_subject.clone(), config.result_subject.clone()];
        if let Some(dlq) = &config.dead_letter_subject {
            subjects.push(dlq.clone());
        }

        context
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects,
                ..Default::default()
            })
            .await
            .map_err(|e| QueueError::Setup {
                resource: format!("stream {}", config.stream),
                message: e.to_string(),
            })?;

        tracing::info!(
            "Connected to {} (stream {})",
            config.nats_url,
            config.stream
        );

        Ok(Self {
            client,
            context,
            config: config.clone(),
        })
    }

    /// Returns a publisher sharing this connection
    pub fn publisher(&self) -> JetStreamPublisher {
        JetStreamPublisher {
            context: self.context.clone(),
        }
    }

    /// Binds the durable task consumer
    ///
    /// At most `max_in_flight` deliveries are outstanding at the broker, and at
    /// most that many are fetched per pull.
    pub async fn source(&self, max_in_flight: usize) -> Result<JetStreamSource, QueueError> {
        let setup_error = |e: &dyn std::fmt::Display| QueueError::Setup {
            resource: format!("consumer {}", self.config.consumer),
            message: e.to_string(),
        };

        let stream = self
            .context
            .get_stream(&self.config.stream)
            .await
            .map_err(|e| setup_error(&e))?;

        let consumer: PullConsumer = stream
            .get_or_create_consumer(
                &self.config.consumer,
                pull::Config {
                    durable_name: Some(self.config.consumer.clone()),
                    filter_subject: self.config.task_subject.clone(),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: self.config.ack_wait(),
                    max_ack_pending: max_in_flight as i64,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| setup_error(&e))?;

        let messages = consumer
            .stream()
            .max_messages_per_batch(max_in_flight)
            .messages()
            .await
            .map_err(|e| setup_error(&e))?;

        tracing::info!(
            "Consuming {} as {} (max in flight {})",
            self.config.task_subject,
            self.config.consumer,
            max_in_flight
        );

        Ok(JetStreamSource { messages })
    }

    /// Flushes pending publishes before the connection is dropped
    pub async fn close(self) {
        if let Err(e) = self.client.flush().await {
            tracing::warn!("Failed to flush NATS connection on shutdown: {}", e);
        }
    }
}

/// Publishes payloads through JetStream
#[derive(Clone)]
pub struct JetStreamPublisher {
    context: jetstream::Context,
}

#[async_trait]
impl Publisher for JetStreamPublisher {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishReceipt, PublishError> {
        let ack = self
            .context
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| PublishError::Rejected(e.to_string()))?;

        Ok(PublishReceipt::new(async move {
            ack.await
                .map(|_| ())
                .map_err(|e| PublishError::Unacknowledged(e.to_string()))
        }))
    }
}

/// Pull-consumer message stream
pub struct JetStreamSource {
    messages: pull::Stream,
}

#[async_trait]
impl MessageSource for JetStreamSource {
    async fn next(&mut self) -> Option<Result<Box<dyn QueueMessage>, QueueError>> {
        let delivery = self.messages.next().await?;
        Some(
            delivery
                .map(|message| Box::new(JetStreamMessage::new(message)) as Box<dyn QueueMessage>)
                .map_err(|e| QueueError::Receive(e.to_string())),
        )
    }
}

/// A JetStream delivery
pub struct JetStreamMessage {
    inner: jetstream::Message,
    attempts: u32,
}

impl JetStreamMessage {
    pub fn new(inner: jetstream::Message) -> Self {
        let attempts = match inner.info() {
            Ok(info) => u32::try_from(info.delivered).unwrap_or(u32::MAX).max(1),
            Err(e) => {
                tracing::warn!("Delivery has no JetStream metadata, assuming first attempt: {}", e);
                1
            }
        };
        Self { inner, attempts }
    }
}

#[async_trait]
impl QueueMessage for JetStreamMessage {
    fn body(&self) -> &[u8] {
        &self.inner.payload
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }

    async fn finish(&self) -> Result<(), QueueError> {
        self.inner
            .ack()
            .await
            .map_err(|e| QueueError::Ack(e.to_string()))
    }

    async fn requeue(&self, delay: Duration) -> Result<(), QueueError> {
        self.inner
            .ack_with(AckKind::Nak(Some(delay)))
            .await
            .map_err(|e| QueueError::Ack(e.to_string()))
    }
}
