//! Retry helper for idempotent persistence operations (spec §7: process
//! errors are retried when idempotent, otherwise failed upward).

use std::future::Future;
use std::time::Duration;

/// Exponential backoff parameters for [`retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            multiplier: 2.0,
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Retry an idempotent, fallible async operation with exponential backoff.
///
/// Returns the first `Ok`, or the last `Err` once attempts are exhausted.
pub async fn retry<T, E, F, Fut>(config: RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = config.base_delay;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts {
                    return Err(err);
                }
                tokio::time::sleep(delay).await;
                let next = delay.mul_f64(config.multiplier);
                delay = next.min(config.max_delay);
            },
        }
    }
}
