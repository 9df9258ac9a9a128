//! Retry and backoff utilities.
//!
//! Grounded on the teacher crate's retry module: exponential backoff with
//! jitter. Here it backs exactly one concern — the LifecycleMachine's
//! single automatic retry of a failed `install`/`startup` step (spec §7)
//! — configured with `max_attempts = 1` rather than the open-ended retry
//! loop a network client would use.

use std::time::Duration;
use tracing::debug;

/// Jitter strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JitterStrategy {
    /// Random delay between 0 and the calculated delay.
    #[default]
    FullJitter,
    /// Half the calculated delay plus a random half.
    EqualJitter,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// Configuration for the LifecycleMachine's one-retry rule (spec §7):
    /// a single immediate retry, no backoff needed for a local subprocess.
    pub fn single_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            jitter: JitterStrategy::FullJitter,
        }
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_delay = self
            .base_delay
            .as_millis()
            .saturating_mul(2_u128.pow(attempt));
        let capped_delay = exponential_delay.min(self.max_delay.as_millis());
        let delay_ms = capped_delay as u64;
        self.apply_jitter(Duration::from_millis(delay_ms))
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if delay.is_zero() {
            return delay;
        }
        match self.jitter {
            JitterStrategy::FullJitter => {
                let jitter_ms = fastrand::u64(0..=delay.as_millis() as u64);
                Duration::from_millis(jitter_ms)
            }
            JitterStrategy::EqualJitter => {
                let half_delay = delay.as_millis() as u64 / 2;
                let jitter_ms = half_delay + fastrand::u64(0..=half_delay);
                Duration::from_millis(jitter_ms)
            }
        }
    }
}

/// Decision returned by an error classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

/// Retry an async operation with exponential backoff and jitter, stopping
/// early if `classify_error` says so.
pub async fn retry_async<T, E, Fut, Op, Classify>(
    config: &RetryConfig,
    mut operation: Op,
    classify_error: Classify,
) -> std::result::Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    Classify: Fn(&E) -> RetryDecision,
    E: std::fmt::Debug,
{
    let mut last_error = None;

    for attempt in 0..=config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                debug!("attempt {} failed: {:?}", attempt, error);
                if classify_error(&error) == RetryDecision::Stop {
                    return Err(error);
                }
                last_error = Some(error);
                if attempt < config.max_attempts {
                    let delay = config.calculate_delay(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    Err(last_error.expect("at least one attempt was made"))
}
