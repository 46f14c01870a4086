//! Tag-based group invalidation.
//!
//! Every tag owns a set `tag:<tag>` whose members are the physical keys
//! written under that tag. Writers refresh the set's 24h lifetime on each
//! registration; readers never do. Membership is not pruned when an entry
//! expires on its own, so a set may list keys that no longer exist. A
//! lookup on such a key simply misses, and the set itself lapses once no
//! writer has touched it for a day.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::CacheResult;
use crate::store::Store;

const TAG_SET_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct TagIndex {
    store: Arc<dyn Store>,
}

impl TagIndex {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn tag_key(tag: &str) -> String {
        format!("tag:{tag}")
    }

    /// Register a physical key under each tag, refreshing the set TTLs.
    pub async fn add_to_tags(&self, physical_key: &str, tags: &[String]) -> CacheResult<()> {
        for tag in tags {
            let set_key = Self::tag_key(tag);
            self.store.add_to_set(&set_key, physical_key).await?;
            self.store.expire(&set_key, TAG_SET_TTL_SECS).await?;
        }
        Ok(())
    }

    /// Drop every key registered under the given tags.
    ///
    /// Members are accumulated into one deduplicated batch and removed
    /// with a single bulk delete after all tag sets have been consumed.
    /// Tags with no members are a no-op.
    pub async fn invalidate(&self, tags: &[String]) -> CacheResult<()> {
        let mut members: HashSet<String> = HashSet::new();

        for tag in tags {
            let set_key = Self::tag_key(tag);
            members.extend(self.store.set_members(&set_key).await?);
            self.store.delete(std::slice::from_ref(&set_key)).await?;
        }

        if !members.is_empty() {
            let keys: Vec<String> = members.into_iter().collect();
            let removed = self.store.delete(&keys).await?;
            tracing::debug!(tags = ?tags, removed, "invalidated tagged cache entries");
        }

        Ok(())
    }
}
