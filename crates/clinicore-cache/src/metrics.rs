//! Cache hit/miss telemetry.
//!
//! Counters live in the backing store so every instance contributes to
//! the same numbers: `metrics:cache:hit` and `metrics:cache:miss` are
//! hashes holding a running `total` plus one field per UTC hour
//! (`YYYY-MM-DDTHH`), each refreshed to a 24h lifetime on every
//! increment. Counters appear lazily on first use and decay after a day
//! of inactivity.
//!
//! Failures on this path are swallowed without logging: recording runs on
//! every cache read, and a store outage would otherwise turn each read
//! into a warning of its own.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::CacheResult;
use crate::store::Store;

const HIT_KEY: &str = "metrics:cache:hit";
const MISS_KEY: &str = "metrics:cache:miss";
const TOTAL_FIELD: &str = "total";
const COUNTER_TTL_SECS: i64 = 24 * 60 * 60;

/// Result of a single cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss,
}

#[derive(Clone)]
pub struct MetricsRecorder {
    store: Arc<dyn Store>,
}

impl MetricsRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record one lookup outcome. Never fails.
    pub async fn record(&self, outcome: Outcome) {
        let key = match outcome {
            Outcome::Hit => HIT_KEY,
            Outcome::Miss => MISS_KEY,
        };
        let _ = self.try_record(key).await;
    }

    async fn try_record(&self, key: &str) -> CacheResult<()> {
        self.store.increment_hash_field(key, TOTAL_FIELD, 1).await?;
        let bucket = hour_bucket(OffsetDateTime::now_utc());
        self.store.increment_hash_field(key, &bucket, 1).await?;
        self.store.expire(key, COUNTER_TTL_SECS).await?;
        Ok(())
    }
}

/// Hour-bucket field name, e.g. `2026-08-06T14`.
fn hour_bucket(at: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use time::macros::datetime;

    #[test]
    fn test_hour_bucket_format() {
        assert_eq!(hour_bucket(datetime!(2026-08-06 14:35:02 UTC)), "2026-08-06T14");
        assert_eq!(hour_bucket(datetime!(2026-01-01 05:00:00 UTC)), "2026-01-01T05");
    }

    #[tokio::test]
    async fn test_record_increments_total_and_hour_bucket() {
        let store = Arc::new(MemoryStore::new());
        let recorder = MetricsRecorder::new(store.clone());

        recorder.record(Outcome::Hit).await;
        recorder.record(Outcome::Hit).await;
        recorder.record(Outcome::Miss).await;

        assert_eq!(store.hash_field(HIT_KEY, TOTAL_FIELD), Some(2));
        assert_eq!(store.hash_field(MISS_KEY, TOTAL_FIELD), Some(1));

        let bucket = hour_bucket(OffsetDateTime::now_utc());
        assert_eq!(store.hash_field(HIT_KEY, &bucket), Some(2));
    }

    #[tokio::test]
    async fn test_record_refreshes_counter_ttl() {
        let store = Arc::new(MemoryStore::new());
        let recorder = MetricsRecorder::new(store.clone());

        recorder.record(Outcome::Miss).await;

        let remaining = store.hash_ttl(MISS_KEY);
        assert!(remaining > COUNTER_TTL_SECS - 5 && remaining <= COUNTER_TTL_SECS);
    }
}
