use thiserror::Error;

/// Error types for cache operations.
///
/// Every variant here is recovered inside the crate: the facade logs and
/// returns the documented default instead of raising. The only error that
/// ever reaches a caller is the one produced by the factory passed to
/// `Cache::get_or_set`, which is generic over the caller's own error type
/// and is not represented here.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store was never reached, or the adapter has been closed.
    #[error("cache backing store is unavailable")]
    Disconnected,

    /// A single backing-store operation failed (timeout, network error).
    #[error("cache operation failed: {0}")]
    Backend(#[from] redis::RedisError),

    /// A payload could not be encoded or decoded as JSON.
    #[error("cache payload codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A compressed payload could not be inflated.
    #[error("cache payload inflate error: {0}")]
    Payload(#[from] std::io::Error),

    /// A key pattern could not be compiled for matching.
    #[error("invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
