//! Cache-aside facade over the backing store.
//!
//! ## Failure Model
//!
//! The cache must never be the reason the rest of the application fails.
//! Every method here logs and swallows backing-store errors, returning
//! its documented default (absent for reads, `false` for boolean
//! operations, `0` for counters, a no-op for writes). The one exception
//! is the factory passed to [`Cache::get_or_set`]: its error always
//! propagates to the caller unchanged, and a failed factory is never
//! cached.
//!
//! ## Write-back
//!
//! `get_or_set` resolves as soon as the factory's value is known; the
//! cache write happens in a detached task. Callers get their answer at
//! factory speed at the cost of a staleness window in which a second
//! concurrent miss may invoke its own factory; there is no single-flight
//! deduplication.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec;
use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::key::build_key;
use crate::metrics::{MetricsRecorder, Outcome};
use crate::stats::{self, CacheStats};
use crate::store::{MemoryStore, RedisStore, Store, StoreStatus};
use crate::tags::TagIndex;

/// Default entry lifetime in seconds.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Prefix isolating counter keys from the tag/TTL machinery.
const COUNTER_PREFIX: &str = "counter";

/// Options accepted by every cache operation.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Entry lifetime in seconds. Zero or negative stores without expiry.
    pub ttl: i64,
    /// Namespace prepended to the logical key.
    pub prefix: Option<String>,
    /// Gzip the payload before it is stored.
    pub compress: bool,
    /// Tags the entry can later be invalidated by.
    pub tags: Vec<String>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL_SECS,
            prefix: None,
            compress: false,
            tags: Vec::new(),
        }
    }
}

impl CacheOptions {
    pub fn ttl(mut self, seconds: i64) -> Self {
        self.ttl = seconds;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn compress(mut self) -> Self {
        self.compress = true;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Cache-aside facade.
///
/// Cheap to clone; clones share the same backing-store connection. The
/// store is injected at construction so tests can substitute a fake
/// adapter, and closed once at shutdown via [`Cache::close`].
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn Store>,
    tags: TagIndex,
    metrics: MetricsRecorder,
}

impl Cache {
    /// Connect to the Redis backing store described by `config`.
    ///
    /// A failed connection yields a degraded cache that serves misses and
    /// discards writes instead of erroring; process start never fails on
    /// an unreachable store.
    pub async fn connect(config: &CacheConfig) -> Self {
        let store = RedisStore::connect(config).await;
        Self::with_store(store)
    }

    /// Build a cache over any store implementation.
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        Self {
            tags: TagIndex::new(store.clone()),
            metrics: MetricsRecorder::new(store.clone()),
            store,
        }
    }

    /// Build a cache over an in-process store.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Read a value. Absent, expired, undecodable, or unreachable all
    /// come back as `None`; this method never fails.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, options: &CacheOptions) -> Option<T> {
        let physical = build_key(key, options.prefix.as_deref());

        let raw = match self.store.get_raw(&physical).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %physical, error = %e, "cache read failed");
                return None;
            }
        };

        let Some(raw) = raw else {
            tracing::debug!(key = %physical, "cache miss");
            self.metrics.record(Outcome::Miss).await;
            return None;
        };

        tracing::debug!(key = %physical, "cache hit");
        self.metrics.record(Outcome::Hit).await;

        match codec::deserialize(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                // Version skew or store corruption; served as a miss.
                tracing::warn!(key = %physical, error = %e, "cached payload undecodable");
                None
            }
        }
    }

    /// Write a value with the requested TTL, registering any tags.
    /// Failures are logged and swallowed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, options: &CacheOptions) {
        let physical = build_key(key, options.prefix.as_deref());

        let payload = match codec::serialize(value, options.compress) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %physical, error = %e, "cache value not serializable");
                return;
            }
        };

        if let Err(e) = self.write_entry(&physical, payload, options).await {
            tracing::warn!(key = %physical, error = %e, "cache write failed");
        }
    }

    async fn write_entry(
        &self,
        physical: &str,
        payload: Vec<u8>,
        options: &CacheOptions,
    ) -> CacheResult<()> {
        let ttl = (options.ttl > 0).then_some(options.ttl as u64);
        self.store.set_raw(physical, payload, ttl).await?;
        if !options.tags.is_empty() {
            self.tags.add_to_tags(physical, &options.tags).await?;
        }
        tracing::debug!(key = %physical, ttl = options.ttl, "cache set");
        Ok(())
    }

    /// Remove a single entry. Swallows errors.
    pub async fn delete(&self, key: &str, prefix: Option<&str>) {
        let physical = build_key(key, prefix);
        if let Err(e) = self.store.delete(std::slice::from_ref(&physical)).await {
            tracing::warn!(key = %physical, error = %e, "cache delete failed");
        }
    }

    /// Remove every key matching a glob-style pattern in one batch.
    /// No-op when nothing matches. Swallows errors.
    pub async fn delete_by_pattern(&self, pattern: &str) {
        match self.store.keys_matching(pattern).await {
            Ok(keys) if keys.is_empty() => {}
            Ok(keys) => {
                if let Err(e) = self.store.delete(&keys).await {
                    tracing::warn!(pattern = %pattern, error = %e, "cache pattern delete failed");
                }
            }
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "cache pattern lookup failed");
            }
        }
    }

    /// Whether a key currently exists. Defaults to `false` on failure.
    pub async fn exists(&self, key: &str, prefix: Option<&str>) -> bool {
        let physical = build_key(key, prefix);
        match self.store.exists(&physical).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key = %physical, error = %e, "cache existence check failed");
                false
            }
        }
    }

    /// Drop every entry registered under the given tags. Swallows errors.
    pub async fn invalidate_by_tags(&self, tags: &[String]) {
        if let Err(e) = self.tags.invalidate(tags).await {
            tracing::warn!(tags = ?tags, error = %e, "tag invalidation failed");
        }
    }

    /// Cache-aside read: return the cached value if present, otherwise
    /// compute it with `factory`, hand it back immediately, and write it
    /// to the cache in a detached task.
    ///
    /// The factory's error is the only error this crate ever propagates:
    /// it reaches the caller unchanged, and nothing is cached for a key
    /// whose factory failed. The background write's outcome never affects
    /// the returned value.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        factory: F,
        options: CacheOptions,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key, &options).await {
            return Ok(cached);
        }

        let value = factory().await?;

        let physical = build_key(key, options.prefix.as_deref());
        match codec::serialize(&value, options.compress) {
            Ok(payload) => {
                let cache = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = cache.write_entry(&physical, payload, &options).await {
                        tracing::warn!(key = %physical, error = %e, "background cache write failed");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(key = %physical, error = %e, "cache value not serializable");
            }
        }

        Ok(value)
    }

    /// Increment a counter under the fixed `counter` prefix.
    /// Returns the new value, or `0` on failure.
    pub async fn increment(&self, key: &str, by: i64) -> i64 {
        let physical = build_key(key, Some(COUNTER_PREFIX));
        match self.store.increment_by(&physical, by).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %physical, error = %e, "counter increment failed");
                0
            }
        }
    }

    /// Decrement a counter under the fixed `counter` prefix.
    /// Returns the new value, or `0` on failure.
    pub async fn decrement(&self, key: &str, by: i64) -> i64 {
        let physical = build_key(key, Some(COUNTER_PREFIX));
        match self.store.decrement_by(&physical, by).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %physical, error = %e, "counter decrement failed");
                0
            }
        }
    }

    /// Remaining lifetime of a key in seconds, passing the backing
    /// store's answer through (-1 no expiry, -2 missing key). Returns -1
    /// on failure.
    pub async fn ttl(&self, key: &str, prefix: Option<&str>) -> i64 {
        let physical = build_key(key, prefix);
        match self.store.ttl(&physical).await {
            Ok(remaining) => remaining,
            Err(e) => {
                tracing::warn!(key = %physical, error = %e, "cache ttl lookup failed");
                -1
            }
        }
    }

    /// Reset a key's lifetime. `true` iff the store confirmed it.
    pub async fn expire(&self, key: &str, ttl_seconds: i64, prefix: Option<&str>) -> bool {
        let physical = build_key(key, prefix);
        match self.store.expire(&physical, ttl_seconds).await {
            Ok(applied) => applied,
            Err(e) => {
                tracing::warn!(key = %physical, error = %e, "cache expire failed");
                false
            }
        }
    }

    /// Clear the entire backing keyspace. Administrative use only.
    /// Swallows errors.
    pub async fn flush(&self) {
        if let Err(e) = self.store.flush_all().await {
            tracing::warn!(error = %e, "cache flush failed");
        }
    }

    /// Health report derived from the store's diagnostic output.
    ///
    /// A store that never connected reports `disconnected` without any
    /// I/O; a store that fails during the diagnostic query reports
    /// `error` with the failure message.
    pub async fn stats(&self) -> CacheStats {
        if self.store.status() != StoreStatus::Connected {
            return CacheStats::disconnected("backing store never connected");
        }

        match self.store.diagnostic_info(None).await {
            Ok(blob) => CacheStats::from_info(&stats::parse_info(&blob)),
            Err(e) => CacheStats::error(e.to_string()),
        }
    }

    /// Release the backing-store connection. Best-effort, never fails.
    pub async fn close(&self) {
        self.store.close().await;
    }
}
