//! Queue transport
//!
//! This module contains:
//! - The [`Publisher`] interface used to hand payloads to the broker
//! - [`PublishReceipt`], an explicit future for the broker's acknowledgment
//! - The NATS JetStream transport used in production

mod nats;

pub use nats::{JetStreamMessage, JetStreamPublisher, JetStreamSource, NatsTransport};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

/// Errors raised while publishing a payload
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Broker rejected publish: {0}")]
    Rejected(String),

    #[error("Publish was not acknowledged: {0}")]
    Unacknowledged(String),

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised by the consuming side of the transport
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Failed to set up {resource}: {message}")]
    Setup { resource: String, message: String },

    #[error("Failed to receive message: {0}")]
    Receive(String),

    #[error("Failed to acknowledge message: {0}")]
    Ack(String),
}

/// Resolves once the broker has acknowledged a published payload
///
/// Returned by [`Publisher::publish`] after the payload has been handed off. A caller
/// that needs the payload durably stored awaits the receipt; a caller that does not
/// can drop it or await it elsewhere.
pub struct PublishReceipt {
    inner: BoxFuture<'static, Result<(), PublishError>>,
}

impl PublishReceipt {
    /// Wraps a future resolving to the broker's verdict
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), PublishError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(future),
        }
    }

    /// A receipt that is already acknowledged
    pub fn acknowledged() -> Self {
        Self::new(async { Ok(()) })
    }

    /// A receipt that resolves to the given error
    pub fn failed(error: PublishError) -> Self {
        Self::new(async move { Err(error) })
    }
}

impl Future for PublishReceipt {
    type Output = Result<(), PublishError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

/// Trait for queue publish operations
///
/// Implementations must be safe to share between concurrently running tasks.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Hands `payload` to the broker for `subject`
    ///
    /// # Returns
    ///
    /// * `Ok(PublishReceipt)` - The broker accepted the handoff; the receipt resolves on acknowledgment
    /// * `Err(PublishError)` - The payload could not be handed off at all
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishReceipt, PublishError>;
}

/// Serializes `value` as JSON and publishes it
pub async fn publish_json<T>(
    publisher: &dyn Publisher,
    subject: &str,
    value: &T,
) -> Result<PublishReceipt, PublishError>
where
    T: Serialize + ?Sized + Sync,
{
    let payload = serde_json::to_vec(value)?;
    publisher.publish(subject, Bytes::from(payload)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acknowledged_receipt() {
        assert!(PublishReceipt::acknowledged().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_receipt() {
        let receipt = PublishReceipt::failed(PublishError::Unacknowledged("timeout".to_string()));
        assert!(matches!(receipt.await, Err(PublishError::Unacknowledged(_))));
    }

    #[tokio::test]
    async fn test_receipt_waits_for_future() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let receipt = PublishReceipt::new(async move {
            rx.await
                .map_err(|e| PublishError::Unacknowledged(e.to_string()))
        });

        let handle = tokio::spawn(receipt);
        tx.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }
}
