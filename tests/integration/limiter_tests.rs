//! Concurrency limiter behaviour under contention

use ingestion_worker::worker::ConcurrencyLimiter;
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn wait_for_waiters(limiter: &ConcurrencyLimiter, count: usize) {
    while limiter.waiting() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_second_task_waits_while_first_holds_slot() {
    let limiter = ConcurrencyLimiter::new(1);
    let first = limiter.acquire().await.unwrap();

    let second = tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
    assert!(second.is_err(), "second acquire must not succeed while the slot is held");
    assert_eq!(limiter.in_use(), 1);

    first.release();
    let second = tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_waiters_are_admitted_in_arrival_order() {
    let limiter = ConcurrencyLimiter::new(1);
    let order = Arc::new(Mutex::new(Vec::new()));
    let held = limiter.acquire().await.unwrap();

    let mut handles = Vec::new();
    for (position, name) in ["a", "b", "c"].into_iter().enumerate() {
        let limiter_handle = limiter.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            let _permit = limiter_handle.acquire().await.unwrap();
            order.lock().unwrap().push(name);
        }));
        wait_for_waiters(&limiter, position + 1).await;
    }

    drop(held);
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(limiter.available(), 1);
}

#[tokio::test]
async fn test_closed_limiter_rejects_waiters() {
    let limiter = ConcurrencyLimiter::new(1);
    let _held = limiter.acquire().await.unwrap();

    let waiter = {
        let limiter = limiter.clone();
        tokio::spawn(async move { limiter.acquire().await.is_err() })
    };
    wait_for_waiters(&limiter, 1).await;

    limiter.close();
    assert!(waiter.await.unwrap());
}
