//! Redis-backed store over a single multiplexed connection.
//!
//! ## Connection Lifecycle
//!
//! One [`ConnectionManager`] is opened at startup and shared by every
//! in-flight operation; Redis itself serializes individual commands. The
//! manager reconnects on its own with the capped exponential backoff
//! configured in [`CacheConfig`]. If the *initial* connection attempt
//! fails the store comes up in degraded mode instead of failing process
//! start: every operation then returns [`CacheError::Disconnected`]
//! without touching the network, and the facade turns that into its
//! documented defaults.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

use super::{Store, StoreStatus};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

const STATUS_UNINITIALIZED: u8 = 0;
const STATUS_CONNECTING: u8 = 1;
const STATUS_CONNECTED: u8 = 2;
const STATUS_DEGRADED: u8 = 3;

pub struct RedisStore {
    conn: ArcSwapOption<ConnectionManager>,
    status: AtomicU8,
}

impl RedisStore {
    /// Open the connection described by `config`.
    ///
    /// Never fails: a store that could not connect is returned in degraded
    /// mode so the rest of the application starts normally without it.
    pub async fn connect(config: &CacheConfig) -> Arc<Self> {
        let store = Arc::new(Self {
            conn: ArcSwapOption::empty(),
            status: AtomicU8::new(STATUS_UNINITIALIZED),
        });
        store.status.store(STATUS_CONNECTING, Ordering::SeqCst);

        tracing::info!(host = %config.host, port = config.port, "connecting to cache backing store");

        let info = redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: redis::RedisConnectionInfo {
                password: config.password.clone(),
                ..Default::default()
            },
        };

        let manager_config = ConnectionManagerConfig::new()
            .set_factor(config.retry_base_delay_ms)
            .set_max_delay(config.retry_max_delay_ms)
            .set_number_of_retries(config.retry_max_attempts)
            .set_connection_timeout(Duration::from_millis(config.connect_timeout_ms))
            .set_response_timeout(Duration::from_millis(config.response_timeout_ms));

        let manager = match redis::Client::open(info) {
            Ok(client) => client.get_connection_manager_with_config(manager_config).await,
            Err(e) => Err(e),
        };

        match manager {
            Ok(manager) => {
                store.conn.store(Some(Arc::new(manager)));
                store.status.store(STATUS_CONNECTED, Ordering::SeqCst);
                tracing::info!("connected to cache backing store");
            }
            Err(e) => {
                store.status.store(STATUS_DEGRADED, Ordering::SeqCst);
                tracing::warn!(
                    error = %e,
                    "cache backing store unreachable, continuing in degraded mode"
                );
            }
        }

        store
    }

    fn manager(&self) -> CacheResult<ConnectionManager> {
        match self.conn.load_full() {
            Some(manager) => Ok((*manager).clone()),
            None => Err(CacheError::Disconnected),
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.manager()?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl_seconds: Option<u64>) -> CacheResult<()> {
        let mut conn = self.manager()?;
        match ttl_seconds {
            Some(seconds) => conn.set_ex::<_, _, ()>(key, value, seconds).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.manager()?;
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.manager()?;
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.manager()?;
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.manager()?;
        let remaining: i64 = conn.ttl(key).await?;
        Ok(remaining)
    }

    async fn expire(&self, key: &str, ttl_seconds: i64) -> CacheResult<bool> {
        let mut conn = self.manager()?;
        let applied: bool = conn.expire(key, ttl_seconds).await?;
        Ok(applied)
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.manager()?;
        conn.sadd::<_, _, ()>(set_key, member).await?;
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.manager()?;
        let members: Vec<String> = conn.smembers(set_key).await?;
        Ok(members)
    }

    async fn increment_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.manager()?;
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    async fn decrement_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.manager()?;
        let value: i64 = conn.decr(key, delta).await?;
        Ok(value)
    }

    async fn increment_hash_field(&self, key: &str, field: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.manager()?;
        let value: i64 = conn.hincr(key, field, delta).await?;
        Ok(value)
    }

    async fn flush_all(&self) -> CacheResult<()> {
        let mut conn = self.manager()?;
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn diagnostic_info(&self, section: Option<&str>) -> CacheResult<String> {
        let mut conn = self.manager()?;
        let mut cmd = redis::cmd("INFO");
        if let Some(section) = section {
            cmd.arg(section);
        }
        let blob: String = cmd.query_async(&mut conn).await?;
        Ok(blob)
    }

    fn status(&self) -> StoreStatus {
        match self.status.load(Ordering::SeqCst) {
            STATUS_UNINITIALIZED => StoreStatus::Uninitialized,
            STATUS_CONNECTING => StoreStatus::Connecting,
            STATUS_CONNECTED => StoreStatus::Connected,
            _ => StoreStatus::Degraded,
        }
    }

    async fn close(&self) {
        tracing::info!("closing cache backing store connection");
        self.conn.store(None);
        self.status.store(STATUS_DEGRADED, Ordering::SeqCst);
    }
}
