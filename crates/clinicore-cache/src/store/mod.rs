//! Backing-store adapter.
//!
//! The facade never talks to Redis directly; it goes through the [`Store`]
//! trait so the backing store can be swapped for the in-process
//! [`MemoryStore`] in tests and single-process deployments. The adapter is
//! constructed once at startup, injected into consumers, and closed once
//! at shutdown: an owned resource, not an ambient singleton.

pub mod memory;
pub mod redis;

use async_trait::async_trait;

use crate::error::CacheResult;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Adapter connection state.
///
/// `Uninitialized → Connecting → Connected` is the happy path; a failed
/// initial connection lands in `Degraded`, where every operation fails
/// fast and the facade serves its documented defaults. There is no
/// automatic promotion out of `Degraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Uninitialized,
    Connecting,
    Connected,
    Degraded,
}

/// Operations the cache needs from a key/value backing store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read the raw payload stored under a key.
    async fn get_raw(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Write a payload, expiring after `ttl_seconds` when given.
    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl_seconds: Option<u64>) -> CacheResult<()>;

    /// Remove keys in one batch; returns how many existed.
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    /// Resolve all keys matching a glob-style pattern.
    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remaining lifetime in seconds: -1 for no expiry, -2 for a missing key.
    async fn ttl(&self, key: &str) -> CacheResult<i64>;

    /// Set a key's lifetime; true iff the store confirmed it.
    async fn expire(&self, key: &str, ttl_seconds: i64) -> CacheResult<bool>;

    async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()>;

    async fn set_members(&self, set_key: &str) -> CacheResult<Vec<String>>;

    async fn increment_by(&self, key: &str, delta: i64) -> CacheResult<i64>;

    async fn decrement_by(&self, key: &str, delta: i64) -> CacheResult<i64>;

    /// Increment one field of a hash, creating hash and field as needed.
    async fn increment_hash_field(&self, key: &str, field: &str, delta: i64) -> CacheResult<i64>;

    /// Clear the entire keyspace.
    async fn flush_all(&self) -> CacheResult<()>;

    /// Fetch the store's diagnostic text blob, optionally one section of it.
    async fn diagnostic_info(&self, section: Option<&str>) -> CacheResult<String>;

    fn status(&self) -> StoreStatus;

    /// Release the connection. Best-effort: logged, never fails.
    async fn close(&self);
}
