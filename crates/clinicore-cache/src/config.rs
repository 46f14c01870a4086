//! Cache configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the cache backing store.
///
/// Every field has a default suitable for local development and can be
/// overridden from the environment via [`CacheConfig::from_env`]. The
/// retry fields shape the adapter's reconnect backoff: delays grow from
/// `retry_base_delay_ms` up to `retry_max_delay_ms`, and a single request
/// is retried at most `retry_max_attempts` times before its error is
/// reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backing store host
    #[serde(default = "default_host")]
    pub host: String,

    /// Backing store port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional authentication password
    #[serde(default)]
    pub password: Option<String>,

    /// Initial connection timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-request response timeout in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Base delay for exponential retry backoff, in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Ceiling for a single backoff delay, in milliseconds
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Retries per request before the operation is given up
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_response_timeout_ms() -> u64 {
    2000
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_retry_max_attempts() -> usize {
    3
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retry_max_attempts: default_retry_max_attempts(),
        }
    }
}

impl CacheConfig {
    /// Load settings from `CLINICORE_REDIS_*` environment variables,
    /// falling back to defaults. Reads a `.env` file first when present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(host) = std::env::var("CLINICORE_REDIS_HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse("CLINICORE_REDIS_PORT") {
            config.port = port;
        }
        if let Ok(password) = std::env::var("CLINICORE_REDIS_PASSWORD") {
            if !password.is_empty() {
                config.password = Some(password);
            }
        }
        if let Some(ms) = env_parse("CLINICORE_REDIS_CONNECT_TIMEOUT_MS") {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = env_parse("CLINICORE_REDIS_RESPONSE_TIMEOUT_MS") {
            config.response_timeout_ms = ms;
        }
        if let Some(ms) = env_parse("CLINICORE_REDIS_RETRY_BASE_DELAY_MS") {
            config.retry_base_delay_ms = ms;
        }
        if let Some(ms) = env_parse("CLINICORE_REDIS_RETRY_MAX_DELAY_MS") {
            config.retry_max_delay_ms = ms;
        }
        if let Some(attempts) = env_parse("CLINICORE_REDIS_RETRY_MAX_ATTEMPTS") {
            config.retry_max_attempts = attempts;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}
