//! In-process store backed by `DashMap`.
//!
//! Implements the same [`Store`] surface as the Redis adapter for
//! single-process deployments and for tests that need to substitute the
//! backing store without a server. Expiry is lazy: entries are dropped
//! when a lookup finds them past their deadline. The diagnostic blob is
//! synthesized in the same colon-delimited shape the remote store
//! produces, so `Cache::stats()` works against this store too.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Store, StoreStatus};
use crate::error::CacheResult;

struct Entry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

struct SetEntry {
    members: HashSet<String>,
    expires_at: Option<Instant>,
}

struct HashEntry {
    fields: HashMap<String, i64>,
    expires_at: Option<Instant>,
}

fn expired(expires_at: Option<Instant>) -> bool {
    expires_at.is_some_and(|deadline| deadline <= Instant::now())
}

fn deadline(ttl_seconds: Option<u64>) -> Option<Instant> {
    ttl_seconds.map(|seconds| Instant::now() + Duration::from_secs(seconds))
}

fn remaining_seconds(expires_at: Option<Instant>) -> i64 {
    match expires_at {
        None => -1,
        Some(deadline) => deadline.saturating_duration_since(Instant::now()).as_secs() as i64,
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    sets: DashMap<String, SetEntry>,
    hashes: DashMap<String, HashEntry>,
    keyspace_hits: AtomicU64,
    keyspace_misses: AtomicU64,
    expired_keys: AtomicU64,
    peak_memory: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn drop_expired_entry(&self, key: &str) -> bool {
        if let Some(entry) = self.entries.get(key) {
            if expired(entry.expires_at) {
                drop(entry);
                self.entries.remove(key);
                self.expired_keys.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    fn used_memory(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| (entry.key().len() + entry.value().data.len()) as u64)
            .sum()
    }

    fn glob_to_regex(pattern: &str) -> Result<regex::Regex, regex::Error> {
        let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
        regex::Regex::new(&format!("^{escaped}$"))
    }

    #[cfg(test)]
    pub(crate) fn hash_field(&self, key: &str, field: &str) -> Option<i64> {
        self.hashes
            .get(key)
            .and_then(|entry| entry.fields.get(field).copied())
    }

    #[cfg(test)]
    pub(crate) fn hash_ttl(&self, key: &str) -> i64 {
        self.hashes
            .get(key)
            .map(|entry| remaining_seconds(entry.expires_at))
            .unwrap_or(-2)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.drop_expired_entry(key);

        match self.entries.get(key) {
            Some(entry) => {
                self.keyspace_hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.data.clone()))
            }
            None => {
                self.keyspace_misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl_seconds: Option<u64>) -> CacheResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                data: value,
                expires_at: deadline(ttl_seconds),
            },
        );
        self.peak_memory.fetch_max(self.used_memory(), Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key).is_some()
                || self.sets.remove(key).is_some()
                || self.hashes.remove(key).is_some()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let matcher = Self::glob_to_regex(pattern)?;
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !expired(entry.value().expires_at))
            .map(|entry| entry.key().clone())
            .chain(self.sets.iter().map(|entry| entry.key().clone()))
            .chain(self.hashes.iter().map(|entry| entry.key().clone()))
            .filter(|key| matcher.is_match(key))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.drop_expired_entry(key);
        Ok(self.entries.contains_key(key)
            || self.sets.contains_key(key)
            || self.hashes.contains_key(key))
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.drop_expired_entry(key);

        if let Some(entry) = self.entries.get(key) {
            return Ok(remaining_seconds(entry.expires_at));
        }
        if let Some(entry) = self.sets.get(key) {
            return Ok(remaining_seconds(entry.expires_at));
        }
        if let Some(entry) = self.hashes.get(key) {
            return Ok(remaining_seconds(entry.expires_at));
        }
        Ok(-2)
    }

    async fn expire(&self, key: &str, ttl_seconds: i64) -> CacheResult<bool> {
        let new_deadline = deadline(Some(ttl_seconds.max(0) as u64));

        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = new_deadline;
            return Ok(true);
        }
        if let Some(mut entry) = self.sets.get_mut(key) {
            entry.expires_at = new_deadline;
            return Ok(true);
        }
        if let Some(mut entry) = self.hashes.get_mut(key) {
            entry.expires_at = new_deadline;
            return Ok(true);
        }
        Ok(false)
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
        let mut entry = self.sets.entry(set_key.to_string()).or_insert_with(|| SetEntry {
            members: HashSet::new(),
            expires_at: None,
        });
        if expired(entry.expires_at) {
            entry.members.clear();
            entry.expires_at = None;
        }
        entry.members.insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> CacheResult<Vec<String>> {
        match self.sets.get(set_key) {
            Some(entry) if !expired(entry.expires_at) => {
                Ok(entry.members.iter().cloned().collect())
            }
            Some(entry) => {
                drop(entry);
                self.sets.remove(set_key);
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn increment_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.drop_expired_entry(key);

        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            data: b"0".to_vec(),
            expires_at: None,
        });
        let current: i64 = serde_json::from_slice(&entry.data)?;
        let updated = current + delta;
        entry.data = updated.to_string().into_bytes();
        Ok(updated)
    }

    async fn decrement_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.increment_by(key, -delta).await
    }

    async fn increment_hash_field(&self, key: &str, field: &str, delta: i64) -> CacheResult<i64> {
        let mut entry = self.hashes.entry(key.to_string()).or_insert_with(|| HashEntry {
            fields: HashMap::new(),
            expires_at: None,
        });
        if expired(entry.expires_at) {
            entry.fields.clear();
            entry.expires_at = None;
        }
        let value = entry.fields.entry(field.to_string()).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn flush_all(&self) -> CacheResult<()> {
        self.entries.clear();
        self.sets.clear();
        self.hashes.clear();
        Ok(())
    }

    async fn diagnostic_info(&self, _section: Option<&str>) -> CacheResult<String> {
        let used = self.used_memory();
        let peak = self.peak_memory.load(Ordering::Relaxed).max(used);
        Ok(format!(
            "# Clients\r\n\
             connected_clients:1\r\n\
             # Memory\r\n\
             used_memory:{used}\r\n\
             used_memory_peak:{peak}\r\n\
             mem_fragmentation_ratio:1.00\r\n\
             # Stats\r\n\
             keyspace_hits:{hits}\r\n\
             keyspace_misses:{misses}\r\n\
             evicted_keys:0\r\n\
             expired_keys:{expired}\r\n",
            hits = self.keyspace_hits.load(Ordering::Relaxed),
            misses = self.keyspace_misses.load(Ordering::Relaxed),
            expired = self.expired_keys.load(Ordering::Relaxed),
        ))
    }

    fn status(&self) -> StoreStatus {
        StoreStatus::Connected
    }

    async fn close(&self) {
        tracing::debug!("closing in-process store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();

        store.set_raw("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(store.get_raw("k").await.unwrap(), Some(b"v".to_vec()));

        let removed = store.delete(&["k".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get_raw("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let store = MemoryStore::new();

        store.set_raw("k", b"v".to_vec(), Some(0)).await.unwrap();
        assert_eq!(store.get_raw("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_reporting() {
        let store = MemoryStore::new();

        store.set_raw("forever", b"v".to_vec(), None).await.unwrap();
        assert_eq!(store.ttl("forever").await.unwrap(), -1);

        store.set_raw("bounded", b"v".to_vec(), Some(600)).await.unwrap();
        let remaining = store.ttl("bounded").await.unwrap();
        assert!(remaining > 590 && remaining <= 600);

        assert_eq!(store.ttl("missing").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_expire_existing_key() {
        let store = MemoryStore::new();

        store.set_raw("k", b"v".to_vec(), None).await.unwrap();
        assert!(store.expire("k", 60).await.unwrap());
        assert!(store.ttl("k").await.unwrap() > 0);

        assert!(!store.expire("missing", 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_glob_matching() {
        let store = MemoryStore::new();

        store.set_raw("patients:1", b"a".to_vec(), None).await.unwrap();
        store.set_raw("patients:2", b"b".to_vec(), None).await.unwrap();
        store.set_raw("billing:1", b"c".to_vec(), None).await.unwrap();

        let keys = store.keys_matching("patients:*").await.unwrap();
        assert_eq!(keys, vec!["patients:1".to_string(), "patients:2".to_string()]);

        assert!(store.keys_matching("nothing:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sets_and_counters() {
        let store = MemoryStore::new();

        store.add_to_set("tag:procedures", "procedures:1").await.unwrap();
        store.add_to_set("tag:procedures", "procedures:1").await.unwrap();
        store.add_to_set("tag:procedures", "procedures:2").await.unwrap();

        let mut members = store.set_members("tag:procedures").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["procedures:1".to_string(), "procedures:2".to_string()]);

        assert_eq!(store.increment_by("counter:visits", 1).await.unwrap(), 1);
        assert_eq!(store.increment_by("counter:visits", 4).await.unwrap(), 5);
        assert_eq!(store.decrement_by("counter:visits", 2).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_hash_fields() {
        let store = MemoryStore::new();

        assert_eq!(
            store.increment_hash_field("metrics:cache:hit", "total", 1).await.unwrap(),
            1
        );
        assert_eq!(
            store.increment_hash_field("metrics:cache:hit", "total", 1).await.unwrap(),
            2
        );
        assert_eq!(store.hash_field("metrics:cache:hit", "total"), Some(2));
    }

    #[tokio::test]
    async fn test_diagnostic_blob_tracks_lookups() {
        let store = MemoryStore::new();

        store.set_raw("k", b"v".to_vec(), None).await.unwrap();
        store.get_raw("k").await.unwrap();
        store.get_raw("absent").await.unwrap();

        let blob = store.diagnostic_info(None).await.unwrap();
        assert!(blob.contains("keyspace_hits:1"));
        assert!(blob.contains("keyspace_misses:1"));
    }

    #[tokio::test]
    async fn test_flush_clears_everything() {
        let store = MemoryStore::new();

        store.set_raw("k", b"v".to_vec(), None).await.unwrap();
        store.add_to_set("tag:x", "k").await.unwrap();
        store.increment_hash_field("h", "f", 1).await.unwrap();

        store.flush_all().await.unwrap();

        assert_eq!(store.get_raw("k").await.unwrap(), None);
        assert!(store.set_members("tag:x").await.unwrap().is_empty());
        assert_eq!(store.hash_field("h", "f"), None);
    }
}
