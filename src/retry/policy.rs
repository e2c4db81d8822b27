//! Retry Mechanism Module
//!
//! Retries provider attempts against the *same* provider with exponential
//! backoff and jitter. Failover to a different provider never happens inside
//! a single call.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::RetrySettings;
use crate::error::GatewayError;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier (for exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub use_jitter: bool,
    /// Maximum jitter percentage (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            use_jitter: true,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy for a provider allowing `retry_attempts` retries after the first try.
    pub fn for_provider(retry_attempts: u32, settings: &RetrySettings) -> Self {
        Self {
            max_attempts: retry_attempts.saturating_add(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: settings.backoff_multiplier,
            use_jitter: settings.jitter,
            ..Self::default()
        }
    }

    /// Set maximum attempts
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set initial delay
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter
    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Check if an error should be retried
    pub fn should_retry(&self, error: &GatewayError) -> bool {
        error.is_retryable()
    }

    /// Calculate delay for a given attempt
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);

        let delay = Duration::from_millis(base_delay as u64).min(self.max_delay);

        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    /// Upper bound on a call under this policy when every attempt runs the
    /// full `attempt_timeout`, backoff and jitter included.
    pub fn worst_case_duration(&self, attempt_timeout: Duration) -> Duration {
        let attempts = self.max_attempts.max(1);
        let jitter_factor = if self.use_jitter { self.jitter_factor } else { 0.0 };
        let mut total = attempt_timeout.saturating_mul(attempts);
        for retry in 0..attempts - 1 {
            let base =
                self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(retry as i32);
            let capped = Duration::from_millis(base as u64).min(self.max_delay).as_millis() as f64;
            let delay = capped + capped * jitter_factor;
            total = total.saturating_add(Duration::from_millis(delay as u64));
        }
        total
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let jitter_range = delay.as_millis() as f64 * self.jitter_factor;
        if jitter_range <= 0.0 {
            return delay;
        }
        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(-jitter_range..=jitter_range);

        let new_delay = delay.as_millis() as f64 + jitter;
        Duration::from_millis(new_delay.max(0.0) as u64)
    }
}

/// Retry executor that handles the actual retry logic
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create a new retry executor
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Execute `operation` until it succeeds, fails with a non-retryable
    /// error, or runs out of attempts. The closure receives the 1-based attempt.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, GatewayError>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, GatewayError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.policy.should_retry(&error) || attempt >= max_attempts {
                        tracing::debug!(attempt, kind = error.kind(), "giving up");
                        return Err(error);
                    }

                    let delay = self.policy.calculate_delay(attempt - 1);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, kind = error.kind(), "retrying");
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }
    }
}
