//! Cache-aside facade over a Redis-style backing store for the Clinicore
//! backend.
//!
//! ## Architecture
//!
//! - **[`key`]**: deterministic physical-key derivation with a hashed
//!   fallback for oversized keys
//! - **[`codec`]**: JSON payload codec, with optional gzip compression
//! - **[`store`]**: the backing-store adapter, either one shared Redis
//!   connection or an in-process store for tests and single-process runs
//! - **[`tags`]**: tag-set maintenance for group invalidation
//! - **[`metrics`]**: hit/miss counters kept in the backing store
//! - **[`facade`]**: the [`Cache`] API the rest of the application uses
//!
//! ## Graceful Degradation
//!
//! The cache is allowed to disappear. If the backing store is
//! unreachable, at startup or mid-session, every operation resolves
//! with its documented default (reads miss, writes are discarded) instead
//! of erroring, and the rest of the application runs at reduced
//! performance with unchanged semantics. The only error a caller can
//! ever observe is the one produced by its own factory in
//! [`Cache::get_or_set`].

pub mod codec;
pub mod config;
pub mod error;
pub mod facade;
pub mod key;
pub mod metrics;
pub mod stats;
pub mod store;
pub mod tags;

pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use facade::{Cache, CacheOptions, DEFAULT_TTL_SECS};
pub use stats::{CacheStats, CacheStatus};
pub use store::{MemoryStore, RedisStore, Store, StoreStatus};
