//! Pending-request lock — guards read-modify-write of a user's
//! "awaiting clarification" record.
//!
//! Acquisition never blocks. A caller that loses the race skips the pending
//! check instead of queuing; a hold older than the TTL can be taken over so a
//! crashed turn cannot wedge a user forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use gruenerator_core::config::schema::OrchestratorConfig;

const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);
const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(600);

// ─────────────────────────────────────────────
// PendingRequestLock
// ─────────────────────────────────────────────

struct Hold {
    since: Instant,
    token: u64,
}

/// Per-user, non-blocking, time-bounded mutual exclusion.
pub struct PendingRequestLock {
    ttl: Duration,
    holds: Mutex<HashMap<String, Hold>>,
    next_token: AtomicU64,
}

impl Default for PendingRequestLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TTL)
    }
}

impl PendingRequestLock {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            holds: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Try to take the lock for `user_id`. Returns false when someone else
    /// holds it and the hold has not expired.
    pub fn acquire(&self, user_id: &str) -> bool {
        self.acquire_token(user_id).is_some()
    }

    /// Release the lock for `user_id`, whoever holds it.
    pub fn release(&self, user_id: &str) {
        if let Ok(mut holds) = self.holds.lock() {
            holds.remove(user_id);
        }
    }

    /// Whether `user_id` is currently held (expired holds count as free).
    pub fn is_held(&self, user_id: &str) -> bool {
        self.holds
            .lock()
            .map(|holds| {
                holds
                    .get(user_id)
                    .is_some_and(|h| h.since.elapsed() < self.ttl)
            })
            .unwrap_or(false)
    }

    /// Take the lock and return a guard that releases it on drop.
    pub fn try_guard(self: &Arc<Self>, user_id: &str) -> Option<PendingGuard> {
        let token = self.acquire_token(user_id)?;
        Some(PendingGuard {
            lock: Arc::clone(self),
            user_id: user_id.to_string(),
            token,
        })
    }

    fn acquire_token(&self, user_id: &str) -> Option<u64> {
        let Ok(mut holds) = self.holds.lock() else {
            warn!(user_id, "Pending lock poisoned, skipping");
            return None;
        };

        if let Some(hold) = holds.get(user_id) {
            let age = hold.since.elapsed();
            if age < self.ttl {
                return None;
            }
            debug!(user_id, age_ms = age.as_millis() as u64, "Taking over expired pending lock");
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        holds.insert(
            user_id.to_string(),
            Hold {
                since: Instant::now(),
                token,
            },
        );
        Some(token)
    }

    /// Release only if `token` still owns the hold; a taken-over hold stays put.
    fn release_token(&self, user_id: &str, token: u64) {
        if let Ok(mut holds) = self.holds.lock() {
            if holds.get(user_id).is_some_and(|h| h.token == token) {
                holds.remove(user_id);
            }
        }
    }
}

/// Releases its hold when dropped, including on early return or panic.
pub struct PendingGuard {
    lock: Arc<PendingRequestLock>,
    user_id: String,
    token: u64,
}

impl PendingGuard {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.lock.release_token(&self.user_id, self.token);
    }
}

// ─────────────────────────────────────────────
// PendingRequestStore
// ─────────────────────────────────────────────

/// A clarification question waiting for the user's answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    /// Agent that asked the question.
    pub agent: String,
    pub question: String,
    /// The message that triggered the question.
    pub original_message: String,
    #[serde(default)]
    pub context: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl PendingRecord {
    pub fn new(
        agent: impl Into<String>,
        question: impl Into<String>,
        original_message: impl Into<String>,
    ) -> Self {
        PendingRecord {
            agent: agent.into(),
            question: question.into(),
            original_message: original_message.into(),
            context: Map::new(),
            created_at: Utc::now(),
        }
    }
}

/// Storage of pending records keyed by user id.
#[async_trait]
pub trait PendingRequestStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Option<PendingRecord>;
    async fn put(&self, user_id: &str, record: PendingRecord);
    async fn remove(&self, user_id: &str);
}

/// In-process store; entries expire after the TTL.
pub struct MemoryPendingStore {
    ttl: Duration,
    entries: RwLock<HashMap<String, (PendingRecord, Instant)>>,
}

impl Default for MemoryPendingStore {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_TTL)
    }
}

impl MemoryPendingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|(_, stored)| stored.elapsed() < self.ttl)
            .count()
    }
}

#[async_trait]
impl PendingRequestStore for MemoryPendingStore {
    async fn get(&self, user_id: &str) -> Option<PendingRecord> {
        let mut entries = self.entries.write().await;
        match entries.get(user_id) {
            Some((record, stored)) if stored.elapsed() < self.ttl => Some(record.clone()),
            Some(_) => {
                debug!(user_id, "Pending record expired");
                entries.remove(user_id);
                None
            }
            None => None,
        }
    }

    async fn put(&self, user_id: &str, record: PendingRecord) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, stored)| stored.elapsed() < self.ttl);
        if entries.len() < before {
            debug!(pruned = before - entries.len(), "Pruned expired pending records");
        }
        entries.insert(user_id.to_string(), (record, Instant::now()));
    }

    async fn remove(&self, user_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(user_id);
    }
}

// ─────────────────────────────────────────────
// PendingRequests
// ─────────────────────────────────────────────

/// Result of a guarded operation.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingOutcome<T> {
    Done(T),
    /// The lock was contended; the caller proceeds without the check.
    Skipped,
}

/// Lock plus store: the guarded read-modify-write sequences.
#[derive(Clone)]
pub struct PendingRequests {
    lock: Arc<PendingRequestLock>,
    store: Arc<dyn PendingRequestStore>,
}

impl PendingRequests {
    pub fn new(lock: Arc<PendingRequestLock>, store: Arc<dyn PendingRequestStore>) -> Self {
        Self { lock, store }
    }

    /// In-memory store with TTLs from config.
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(
            Arc::new(PendingRequestLock::new(Duration::from_secs(
                config.pending_lock_ttl_secs,
            ))),
            Arc::new(MemoryPendingStore::new(Duration::from_secs(
                config.pending_request_ttl_secs,
            ))),
        )
    }

    pub fn lock(&self) -> &Arc<PendingRequestLock> {
        &self.lock
    }

    /// Read and clear the user's pending record.
    pub async fn take_pending(&self, user_id: &str) -> PendingOutcome<Option<PendingRecord>> {
        let Some(_guard) = self.lock.try_guard(user_id) else {
            debug!(user_id, "Pending lock busy, skipping pending check");
            return PendingOutcome::Skipped;
        };

        let record = self.store.get(user_id).await;
        if record.is_some() {
            self.store.remove(user_id).await;
        }
        PendingOutcome::Done(record)
    }

    /// Store a new pending record, replacing any previous one.
    pub async fn remember(&self, user_id: &str, record: PendingRecord) -> PendingOutcome<()> {
        let Some(_guard) = self.lock.try_guard(user_id) else {
            debug!(user_id, "Pending lock busy, not storing pending record");
            return PendingOutcome::Skipped;
        };

        self.store.put(user_id, record).await;
        PendingOutcome::Done(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_acquire_release() {
        let lock = PendingRequestLock::default();
        assert!(lock.acquire("u-1"));
        assert!(!lock.acquire("u-1"));
        assert!(lock.acquire("u-2"));
        lock.release("u-1");
        assert!(lock.acquire("u-1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_single_winner() {
        let lock = Arc::new(PendingRequestLock::default());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let lock = lock.clone();
                let winners = winners.clone();
                tokio::spawn(async move {
                    if lock.acquire("same-user") {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        lock.release("same-user");
        assert!(lock.acquire("same-user"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_hold_can_be_taken_over() {
        let lock = PendingRequestLock::default();
        assert!(lock.acquire("u-1"));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!lock.acquire("u-1"));
        assert!(lock.is_held("u-1"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!lock.is_held("u-1"));
        assert!(lock.acquire("u-1"));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = Arc::new(PendingRequestLock::default());
        {
            let guard = lock.try_guard("u-1").unwrap();
            assert_eq!(guard.user_id(), "u-1");
            assert!(lock.try_guard("u-1").is_none());
        }
        assert!(!lock.is_held("u-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_guard_does_not_release_new_owner() {
        let lock = Arc::new(PendingRequestLock::default());
        let stale = lock.try_guard("u-1").unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let fresh = lock.try_guard("u-1").unwrap();

        drop(stale);
        assert!(lock.is_held("u-1"));
        drop(fresh);
        assert!(!lock.is_held("u-1"));
    }

    #[tokio::test]
    async fn test_guard_released_when_task_panics() {
        let lock = Arc::new(PendingRequestLock::default());
        let task_lock = lock.clone();
        let result = tokio::spawn(async move {
            let _guard = task_lock.try_guard("u-1");
            panic!("turn failed");
        })
        .await;

        assert!(result.is_err());
        assert!(!lock.is_held("u-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_entries_expire() {
        let store = MemoryPendingStore::new(Duration::from_secs(60));
        store
            .put("u-1", PendingRecord::new("antrag", "Welches Thema?", "Antrag bitte"))
            .await;
        assert_eq!(store.len().await, 1);
        assert!(store.get("u-1").await.is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get("u-1").await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_prunes_expired_records() {
        let store = MemoryPendingStore::new(Duration::from_secs(60));
        for user in ["u-1", "u-2", "u-3"] {
            store
                .put(user, PendingRecord::new("social", "Welche Plattform?", "Post"))
                .await;
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        store
            .put("u-4", PendingRecord::new("rede", "Wie lang?", "Rede"))
            .await;
        let entries = store.entries.read().await;
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("u-4"));
    }

    #[tokio::test]
    async fn test_take_pending_reads_and_clears() {
        let pending = PendingRequests::from_config(&OrchestratorConfig::default());
        let record = PendingRecord::new("antrag", "Welches Thema?", "Antrag bitte");

        assert_eq!(
            pending.remember("u-1", record.clone()).await,
            PendingOutcome::Done(())
        );
        assert_eq!(
            pending.take_pending("u-1").await,
            PendingOutcome::Done(Some(record))
        );
        assert_eq!(pending.take_pending("u-1").await, PendingOutcome::Done(None));
        assert!(!pending.lock().is_held("u-1"));
    }

    #[tokio::test]
    async fn test_contended_lock_skips() {
        let pending = PendingRequests::from_config(&OrchestratorConfig::default());
        pending
            .remember("u-1", PendingRecord::new("rede", "Wie lang?", "Rede"))
            .await;

        let _held = pending.lock().try_guard("u-1").unwrap();
        assert_eq!(pending.take_pending("u-1").await, PendingOutcome::Skipped);
        assert_eq!(
            pending
                .remember("u-1", PendingRecord::new("rede", "x", "y"))
                .await,
            PendingOutcome::Skipped
        );
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(PendingRecord::new("a", "q", "m")).unwrap();
        assert!(json.get("originalMessage").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
