//! Stale-tolerant read-through cache for remote lookups.
//!
//! Entries older than the caller's `max_age` count as misses but are never
//! deleted, so the last good value is still there when the network is not.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::db::LocalStore;
use crate::util::unix_millis_now;
use crate::Result;

/// A cached JSON value and when it was written (Unix ms)
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub written_at: i64,
}

impl CacheEntry {
    #[must_use]
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            written_at: unix_millis_now(),
        }
    }

    /// Whether the entry is younger than `max_age` at time `now` (Unix ms)
    #[must_use]
    pub fn is_fresh(&self, max_age: Duration, now: i64) -> bool {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(self.written_at) < max_age_ms
    }
}

/// Storage for cache entries
pub trait CacheBackend: Send + Sync {
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<CacheEntry>>> + Send;

    fn store(&self, entry: &CacheEntry) -> impl Future<Output = Result<()>> + Send;
}

impl CacheBackend for LocalStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.load_cache_entry(key).await
    }

    async fn store(&self, entry: &CacheEntry) -> Result<()> {
        self.store_cache_entry(entry).await
    }
}

/// Process-local cache backend
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryCache {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn store(&self, entry: &CacheEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }
}

/// Where a read-through value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRead<T> {
    /// Fetched just now
    Fresh(T),
    /// Served from a cache entry younger than `max_age`
    Cached(T),
    /// The fetch failed; this is the last value ever cached
    Stale(T),
}

impl<T> CacheRead<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Fresh(value) | Self::Cached(value) | Self::Stale(value) => value,
        }
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

/// Typed cache over a [`CacheBackend`]
#[derive(Debug, Clone)]
pub struct ReadThroughCache<B> {
    backend: B,
}

impl<B: CacheBackend> ReadThroughCache<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Value for `key` if it was written less than `max_age` ago
    pub async fn get<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Result<Option<T>> {
        let now = unix_millis_now();
        Ok(self
            .backend
            .load(key)
            .await?
            .filter(|entry| entry.is_fresh(max_age, now))
            .and_then(|entry| decode(&entry)))
    }

    /// Value for `key` regardless of age
    pub async fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self
            .backend
            .load(key)
            .await?
            .and_then(|entry| decode(&entry)))
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let entry = CacheEntry::new(key, serde_json::to_value(value)?);
        self.backend.store(&entry).await
    }

    /// Serve `key` from cache while it is fresh, otherwise call `fetch`.
    ///
    /// A successful fetch is stored. A failed fetch falls back to the last
    /// cached value of any age; the fetch error is returned only when
    /// nothing was ever cached.
    pub async fn read_through<T, F, Fut>(
        &self,
        key: &str,
        max_age: Duration,
        fetch: F,
    ) -> Result<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cached = match self.backend.load(key).await {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!("Cache read for '{key}' failed: {error}");
                None
            }
        };

        if let Some(entry) = &cached {
            if entry.is_fresh(max_age, unix_millis_now()) {
                if let Some(value) = decode(entry) {
                    return Ok(CacheRead::Cached(value));
                }
            }
        }

        match fetch().await {
            Ok(value) => {
                if let Err(error) = self.set(key, &value).await {
                    tracing::warn!("Cache write for '{key}' failed: {error}");
                }
                Ok(CacheRead::Fresh(value))
            }
            Err(error) => match cached.as_ref().and_then(decode) {
                Some(value) => {
                    tracing::warn!("Fetch for '{key}' failed: {error}; serving stale value");
                    Ok(CacheRead::Stale(value))
                }
                None => Err(error),
            },
        }
    }
}

fn decode<T: DeserializeOwned>(entry: &CacheEntry) -> Option<T> {
    match T::deserialize(&entry.value) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!("Ignoring unreadable cache entry '{}': {error}", entry.key);
            None
        }
    }
}
