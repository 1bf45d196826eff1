//! Backoff between identity provider retries.

use std::time::Duration;
use rand::Rng;

/// Delay before retry number `attempt` (1-based) of a key set fetch.
///
/// Doubles from `base_ms` per attempt, capped at `max_ms`, plus up to 10%
/// jitter so gate instances recovering from the same provider outage do not
/// refetch in lockstep. Attempt 0 is the first try and waits nothing.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let Some(retry) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let delay_ms = base_ms
        .saturating_mul(1u64.checked_shl(retry).unwrap_or(u64::MAX))
        .min(max_ms);
    let jitter_ms = match delay_ms / 10 {
        0 => 0,
        spread => rand::thread_rng().gen_range(0..spread),
    };

    Duration::from_millis(delay_ms.saturating_add(jitter_ms))
}
