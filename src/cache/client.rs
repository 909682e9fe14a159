//! Request cache client.
//!
//! Keyed storage for fetched page data with a freshness window, an eviction
//! window, and a single retry for upstream reads and writes. One instance is
//! shared by every data-fetching call site; the server injects it explicitly,
//! while [`global`] offers the lazily-constructed process-wide instance for
//! call sites outside the wired context.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::keys::CacheKey;
use super::lock::mutex_lock;

/// How long an entry is served without consulting the upstream again.
pub const DEFAULT_FRESH_FOR: Duration = Duration::from_secs(5 * 60);
/// How long a stale entry is kept in memory before removal.
pub const DEFAULT_EVICT_AFTER: Duration = Duration::from_secs(10 * 60);

const DEFAULT_RETRY_LIMIT: u32 = 1;
const SOURCE: &str = "cache::client";

/// Fixed caching policy applied to every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub fresh_for: Duration,
    pub evict_after: Duration,
    pub read_retry: u32,
    pub write_retry: u32,
    pub refetch_on_focus: bool,
    pub refetch_on_mount: bool,
    pub refetch_on_reconnect: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            fresh_for: DEFAULT_FRESH_FOR,
            evict_after: DEFAULT_EVICT_AFTER,
            read_retry: DEFAULT_RETRY_LIMIT,
            write_retry: DEFAULT_RETRY_LIMIT,
            refetch_on_focus: false,
            refetch_on_mount: false,
            refetch_on_reconnect: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CachePolicy {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            fresh_for: settings.fresh_for,
            evict_after: settings.evict_after,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream fetch failed: {0}")]
    Upstream(String),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    stored_at: Instant,
}

/// In-memory request cache keyed by [`CacheKey`].
pub struct CacheClient {
    policy: CachePolicy,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl CacheClient {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Look up a fresh entry. Entries past the eviction window are removed on
    /// sight; entries past the freshness window are treated as misses but kept
    /// until eviction.
    pub fn peek(&self, key: &CacheKey) -> Option<Value> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "peek");
        let age = match entries.get(key) {
            Some(entry) => entry.stored_at.elapsed(),
            None => return None,
        };

        if age >= self.policy.evict_after {
            entries.remove(key);
            return None;
        }
        if age >= self.policy.fresh_for {
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: CacheKey, value: Value) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "insert");
        entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry past the eviction window.
    pub fn sweep(&self) {
        let evict_after = self.policy.evict_after;
        let mut entries = mutex_lock(&self.entries, SOURCE, "sweep");
        entries.retain(|_, entry| entry.stored_at.elapsed() < evict_after);
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serve a fresh entry or fetch through the upstream, retrying per policy.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Value, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
    {
        if let Some(value) = self.peek(&key) {
            return Ok(value);
        }
        let value = with_retry(self.policy.read_retry, "read", fetch).await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Run an upstream mutation, retrying per policy, and cache its result.
    pub async fn write_through<F, Fut>(&self, key: CacheKey, write: F) -> Result<Value, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
    {
        let value = with_retry(self.policy.write_retry, "write", write).await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

async fn with_retry<F, Fut>(retry: u32, op: &'static str, run: F) -> Result<Value, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match run().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retry => {
                attempt += 1;
                debug!(
                    target_module = SOURCE,
                    op,
                    attempt,
                    error = %err,
                    "retrying upstream operation"
                );
            }
            Err(err) => return Err(err),
        }
    }
}

static GLOBAL: Lazy<CacheClient> = Lazy::new(|| CacheClient::new(CachePolicy::default()));

/// Process-wide client, constructed with the default policy on first access.
///
/// Construction is idempotent under concurrent first access; later calls
/// return the same instance for the remainder of the process lifetime.
pub fn global() -> &'static CacheClient {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::cache::keys::{KeySegment, compose_key};

    fn key(name: &str) -> CacheKey {
        compose_key(&[KeySegment::from(name)], "en")
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_refetch() {
        let client = CacheClient::new(CachePolicy::default());
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let value = client
                .get_or_fetch(key("about_us"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::from("cached"))
                })
                .await
                .expect("fetch succeeds");
            assert_eq!(value, Value::from("cached"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_retries_exactly_once() {
        let client = CacheClient::new(CachePolicy::default());
        let calls = AtomicU32::new(0);

        let value = client
            .get_or_fetch(key("flaky"), || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FetchError::Upstream("transient".into()))
                } else {
                    Ok(Value::from(42))
                }
            })
            .await
            .expect("second attempt succeeds");

        assert_eq!(value, Value::from(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn read_gives_up_after_retry_budget() {
        let client = CacheClient::new(CachePolicy::default());
        let calls = AtomicU32::new(0);

        let result = client
            .get_or_fetch(key("down"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Value, _>(FetchError::Upstream("still down".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn stale_entry_is_refetched_but_kept_until_eviction() {
        let policy = CachePolicy {
            fresh_for: Duration::ZERO,
            evict_after: Duration::from_secs(60),
            ..CachePolicy::default()
        };
        let client = CacheClient::new(policy);
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            client
                .get_or_fetch(key("stale"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::from("v"))
                })
                .await
                .expect("fetch succeeds");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.len(), 1);
    }

    #[test]
    fn evicted_entry_is_removed_on_peek() {
        let policy = CachePolicy {
            fresh_for: Duration::ZERO,
            evict_after: Duration::ZERO,
            ..CachePolicy::default()
        };
        let client = CacheClient::new(policy);
        client.insert(key("gone"), Value::from("v"));

        assert_eq!(client.peek(&key("gone")), None);
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn write_through_retries_and_caches_result() {
        let client = CacheClient::new(CachePolicy::default());
        let calls = AtomicU32::new(0);

        let value = client
            .write_through(key("settings"), || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FetchError::Upstream("transient".into()))
                } else {
                    Ok(Value::from("saved"))
                }
            })
            .await
            .expect("write succeeds");

        assert_eq!(value, Value::from("saved"));
        assert_eq!(client.peek(&key("settings")), Some(Value::from("saved")));
    }

    #[test]
    fn global_accessor_is_reference_stable() {
        let first: *const CacheClient = global();
        let second: *const CacheClient = global();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn global_policy_permits_exactly_one_retry() {
        let policy = global().policy();
        assert_eq!(policy.read_retry, 1);
        assert_eq!(policy.write_retry, 1);
        assert!(!policy.refetch_on_focus);
        assert!(!policy.refetch_on_mount);
        assert!(!policy.refetch_on_reconnect);
    }
}
