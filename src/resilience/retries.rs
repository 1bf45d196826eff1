//! Retry logic.
//!
//! # Responsibilities
//! - Re-run an async operation while its error is classified as transient
//! - Space attempts with jittered exponential backoff
//!
//! # Design Decisions
//! - Only identity provider outages are retried; a bad token never is
//! - The attempt count includes the first try

use std::future::Future;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Run `op` up to `policy.max_attempts` times while `is_transient` holds for its error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryConfig,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                let delay = calculate_backoff(attempt, policy.base_delay_ms, policy.max_delay_ms);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
