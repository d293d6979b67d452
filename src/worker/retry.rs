//! Retry and backoff policy
//!
//! Retry state is never stored by the worker. Every decision is derived from
//! the delivery attempt the broker reports for the message being processed.

use crate::config::WorkerConfig;
use std::time::Duration;

/// What to do with a delivery whose handler failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Return the message to the broker after the delay
    Requeue(Duration),
    /// Retries are exhausted: report the failure and finish the message
    GiveUp,
}

/// What to do with a delivery whose body could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeDecision {
    Requeue(Duration),
    /// Park the raw body on the dead-letter subject and finish the message
    DeadLetter,
}

/// Attempt-based retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
    decode_delay: Duration,
    max_decode_attempts: u32,
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        backoff: Duration,
        decode_delay: Duration,
        max_decode_attempts: u32,
    ) -> Self {
        Self {
            max_retries,
            backoff,
            decode_delay,
            max_decode_attempts,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_secs(config.retry_backoff_secs),
            Duration::from_secs(config.decode_retry_delay_secs),
            config.max_decode_attempts,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decides the fate of a failed delivery
    ///
    /// Delivery `attempt` (counted from 1) is requeued after `attempt * backoff`
    /// while `attempt <= max_retries`; beyond that the task is given up.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use ingestion_worker::worker::{RetryDecision, RetryPolicy};
    ///
    /// let policy = RetryPolicy::new(3, Duration::from_secs(30), Duration::from_secs(10), 5);
    /// assert_eq!(policy.decide(2), RetryDecision::Requeue(Duration::from_secs(60)));
    /// assert_eq!(policy.decide(4), RetryDecision::GiveUp);
    /// ```
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        let attempt = attempt.max(1);
        if attempt <= self.max_retries {
            RetryDecision::Requeue(self.backoff.saturating_mul(attempt))
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Decides the fate of an undecodable delivery
    ///
    /// Without a dead-letter subject the body is requeued indefinitely with the
    /// fixed decode delay so it stays visible for inspection.
    pub fn decide_decode(&self, attempt: u32, dead_letter_enabled: bool) -> DecodeDecision {
        if dead_letter_enabled && attempt >= self.max_decode_attempts {
            DecodeDecision::DeadLetter
        } else {
            DecodeDecision::Requeue(self.decode_delay)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}
