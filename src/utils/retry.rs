//! Retry with exponential backoff and jitter
//!
//! Only errors whose `is_retryable()` is true are attempted again; every
//! other failure is returned immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::config::RetryPolicy;
use crate::error::CustodyResult;
use crate::log_warn;

/// Run `op` until it succeeds, fails terminally, or attempts run out.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_async<F, Fut, T>(policy: &RetryPolicy, operation: &'static str, mut op: F) -> CustodyResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = CustodyResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = with_jitter(policy.backoff_for(attempt));
                log_warn!(
                    "retry",
                    "Retryable failure",
                    operation = operation,
                    attempt = attempt,
                    delay_ms = delay.as_millis(),
                    error = err,
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Spread the delay over `[base/2, base]`
fn with_jitter(base: Duration) -> Duration {
    let half = base / 2;
    let spread = base.saturating_sub(half).as_millis() as u64;
    if spread == 0 {
        return base;
    }
    half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CustodyError, ErrorCode};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retries_network_failures_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_async(&fast_policy(3), "test", |_| async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CustodyError::network("flaky"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: CustodyResult<()> = retry_async(&fast_policy(2), "test", |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CustodyError::network("down"))
        })
        .await;

        assert_eq!(result.unwrap_err().code, ErrorCode::NetworkFailure);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: CustodyResult<()> = retry_async(&fast_policy(5), "test", |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CustodyError::stale_transaction("expired"))
        })
        .await;

        assert_eq!(result.unwrap_err().code, ErrorCode::StaleTransaction);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(400);
        for _ in 0..50 {
            let delay = with_jitter(base);
            assert!(delay >= Duration::from_millis(200) && delay <= base);
        }
    }
}
