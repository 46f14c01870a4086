//! Cache health reporting.
//!
//! The backing store's diagnostic output is a text blob of
//! colon-delimited `key:value` lines grouped under `#`-prefixed section
//! headers. [`parse_info`] flattens it into a map and
//! [`CacheStats::from_info`] derives the report served to administrative
//! consumers.

use std::collections::HashMap;

use serde::Serialize;

/// Reachability of the backing store at report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Connected,
    Disconnected,
    Error,
}

/// Point-in-time cache health report.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub status: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    /// Percentage of lookups served from cache, 0–100, two decimal places.
    pub hit_rate: f64,
    pub evicted_keys: u64,
    pub expired_keys: u64,
    pub connected_clients: u64,
    pub used_memory: u64,
    pub peak_memory: u64,
    pub fragmentation_ratio: f64,
}

impl CacheStats {
    /// Report for a store that was never reached; no I/O was attempted.
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::empty(CacheStatus::Disconnected, Some(message.into()))
    }

    /// Report for a store that failed during the diagnostic query.
    pub fn error(message: impl Into<String>) -> Self {
        Self::empty(CacheStatus::Error, Some(message.into()))
    }

    fn empty(status: CacheStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            hits: 0,
            misses: 0,
            total: 0,
            hit_rate: 0.0,
            evicted_keys: 0,
            expired_keys: 0,
            connected_clients: 0,
            used_memory: 0,
            peak_memory: 0,
            fragmentation_ratio: 0.0,
        }
    }

    /// Derive the report from a parsed diagnostic map.
    pub fn from_info(info: &HashMap<String, String>) -> Self {
        let hits = counter(info, "keyspace_hits");
        let misses = counter(info, "keyspace_misses");
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            round2(hits as f64 / total as f64 * 100.0)
        };

        Self {
            status: CacheStatus::Connected,
            message: None,
            hits,
            misses,
            total,
            hit_rate,
            evicted_keys: counter(info, "evicted_keys"),
            expired_keys: counter(info, "expired_keys"),
            connected_clients: counter(info, "connected_clients"),
            used_memory: counter(info, "used_memory"),
            peak_memory: counter(info, "used_memory_peak"),
            fragmentation_ratio: info
                .get("mem_fragmentation_ratio")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0.0),
        }
    }
}

/// Flatten a diagnostic blob into `key -> value` pairs.
///
/// Section headers (`# ...`) and blank lines are skipped; values keep
/// everything after the first colon.
pub fn parse_info(blob: &str) -> HashMap<String, String> {
    blob.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            line.split_once(':')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn counter(info: &HashMap<String, String>, key: &str) -> u64 {
    info.get(key).and_then(|raw| raw.parse().ok()).unwrap_or(0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
