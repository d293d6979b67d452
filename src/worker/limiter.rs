//! Process-wide admission gate
//!
//! Bounds how many tasks run at once. Waiters are admitted strictly in the order
//! they asked, so a steady stream of new tasks cannot starve an older one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Returned by [`ConcurrencyLimiter::acquire`] once the limiter has been closed
#[derive(Debug, Error)]
#[error("Concurrency limiter is closed")]
pub struct LimiterClosed;

/// Counting limiter with a capacity fixed at construction
///
/// Cloning yields another handle to the same gate.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    waiting: Arc<AtomicUsize>,
}

/// A held slot; dropping it (or calling [`LimiterPermit::release`]) frees the slot
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl LimiterPermit {
    /// Returns the slot and wakes the longest-waiting caller
    pub fn release(self) {}
}

/// Decrements the waiting count even if the acquiring future is dropped
struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Creates a limiter admitting `capacity` concurrent holders (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Waits for a free slot
    ///
    /// Suspends until a slot is free. Callers are admitted in FIFO order.
    ///
    /// # Returns
    ///
    /// * `Ok(LimiterPermit)` - A slot, held until the permit is dropped
    /// * `Err(LimiterClosed)` - The limiter was closed for shutdown
    pub async fn acquire(&self) -> Result<LimiterPermit, LimiterClosed> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _waiting = WaitingGuard(&self.waiting);

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LimiterClosed)?;

        Ok(LimiterPermit { _permit: permit })
    }

    /// Stops admitting callers; current and future waiters get [`LimiterClosed`]
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Fixed capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Callers currently suspended in [`acquire`](Self::acquire)
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}
