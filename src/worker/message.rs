//! Queue-facing interfaces the dispatcher depends on
//!
//! The dispatcher never talks to a broker directly. It sees a delivery through
//! [`QueueMessage`] and pulls deliveries from a [`MessageSource`], so retry policy
//! and the consumer loop can be exercised with in-process doubles.

use crate::QueueError;
use async_trait::async_trait;
use std::time::Duration;

/// A single delivery of a task message
#[async_trait]
pub trait QueueMessage: Send + Sync {
    /// Raw message body
    fn body(&self) -> &[u8];

    /// Delivery attempt for this message, counted from 1
    fn attempts(&self) -> u32;

    /// Acknowledges the message; the broker will not deliver it again
    async fn finish(&self) -> Result<(), QueueError>;

    /// Returns the message to the broker for redelivery after `delay`
    async fn requeue(&self, delay: Duration) -> Result<(), QueueError>;
}

/// A stream of deliveries
#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next delivery, or returns `None` once the source is closed
    async fn next(&mut self) -> Option<Result<Box<dyn QueueMessage>, QueueError>>;
}
