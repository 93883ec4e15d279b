//! Connection metrics — a diagnostic sink for retry and fallback events.
//!
//! Counters are relaxed atomics; concurrent dispatches may race on them and
//! the numbers are still good enough for a status page.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use gruenerator_core::error::DispatchError;
use gruenerator_core::types::ProviderName;

/// Receives dispatch events. Injected into the retry policy and the dispatcher.
pub trait MetricsSink: Send + Sync {
    fn record_attempt(&self, provider: ProviderName);
    fn record_success(&self, provider: ProviderName);
    fn record_failure(&self, provider: ProviderName, error: &DispatchError);
    fn record_retry(&self, provider: ProviderName, attempt: u32);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_attempt(&self, _provider: ProviderName) {}
    fn record_success(&self, _provider: ProviderName) {}
    fn record_failure(&self, _provider: ProviderName, _error: &DispatchError) {}
    fn record_retry(&self, _provider: ProviderName, _attempt: u32) {}
}

/// Point-in-time copy of [`ConnectionMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
    pub last_failure: Option<String>,
}

/// Process-wide counters of provider calls.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    last_failure: Mutex<Option<String>>,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            last_failure: self
                .last_failure
                .lock()
                .map(|guard| guard.clone())
                .unwrap_or_default(),
        }
    }
}

impl MetricsSink for ConnectionMetrics {
    fn record_attempt(&self, _provider: ProviderName) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_success(&self, _provider: ProviderName) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, _provider: ProviderName, error: &DispatchError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_failure.lock() {
            *last = Some(error.to_string());
        }
    }

    fn record_retry(&self, _provider: ProviderName, _attempt: u32) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }
}
