//! Bounded retry with exponential backoff
//!
//! Only transient failures are retried, and only for operations that are
//! safe to repeat: reads and pre-signing calls. Order submission and raw
//! transaction broadcasts never go through here; once something may have
//! reached the exchange, resending it is not recoverable.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::types::Result;

/// Initial delay between attempts; doubles each retry
const BASE_DELAY: Duration = Duration::from_millis(250);

/// Run `op` up to `attempts` times, backing off between transient failures.
pub async fn with_backoff<T, F, Fut>(label: &str, attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = BASE_DELAY;
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    label, attempt, attempts, err, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradingError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let calls = AtomicU32::new(0);

        let result = with_backoff("flaky", 5, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TradingError::Transient("connection reset".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_immediately() {
        let calls = AtomicU32::new(0);

        let result: Result<u32> = with_backoff("rejected", 5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TradingError::OrderRejected("no".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);

        let result: Result<u32> = with_backoff("down", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TradingError::Transient("timeout".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
