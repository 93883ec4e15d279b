// Retry logic with exponential backoff

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use gruenerator_core::config::schema::DispatchConfig;
use gruenerator_core::error::DispatchError;
use gruenerator_core::types::ProviderName;

use crate::metrics::MetricsSink;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 1000;

/// Bounded retry of transient failures against one provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one (at least 1).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for every further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    /// Delay before retry `n` (1-based): `base × 2^(n-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2u32.pow(exp))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Only [`DispatchError::is_transient`] errors are retried; anything else
    /// propagates immediately. On exhaustion the last error propagates unchanged.
    pub async fn run<F, Fut, T>(
        &self,
        provider: ProviderName,
        request_id: &str,
        metrics: &dyn MetricsSink,
        mut op: F,
    ) -> Result<T, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        let mut attempt = 1;
        loop {
            metrics.record_attempt(provider);
            match op().await {
                Ok(value) => {
                    metrics.record_success(provider);
                    return Ok(value);
                }
                Err(e) => {
                    metrics.record_failure(provider, &e);
                    if !e.is_transient() || attempt >= self.max_attempts {
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        provider = %provider,
                        request_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Request failed (attempt {}/{}), retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        delay
                    );
                    metrics.record_retry(provider, attempt);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
