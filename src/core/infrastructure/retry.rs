//! Bounded retry with a fixed delay.

use crate::core::domain::config::RetryConfig;
use std::future::Future;
use tracing::warn;

/// Runs `operation` until it succeeds, fails with an error `retryable`
/// rejects, or `retries + 1` attempts have failed.
///
/// The delay is slept before every attempt, the first one included. The
/// error of the last attempt is returned.
pub async fn with_retry<T, E, F, Fut, P>(
    config: RetryConfig,
    retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        tokio::time::sleep(config.delay).await;
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt > config.retries || !retryable(&e) => return Err(e),
            Err(e) => {
                warn!(attempt, retries = config.retries, error = %e, "Attempt failed, retrying");
            }
        }
    }
}
