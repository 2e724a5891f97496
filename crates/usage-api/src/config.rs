//! Server configuration.
//!
//! Settings for the HTTP server, the result cache and selection sessions.
//! Warehouse settings live in [`WarehouseConfig`].

use crate::session::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL_SECS};
use crate::usage_analytics::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS};
use dpusage_core::config::DEFAULT_TOP_N;
use dpusage_storage::warehouse_config::env_parse;
use dpusage_storage::WarehouseConfig;
use std::time::Duration;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// API server configuration.
///
/// # Environment Variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `PORT` | 8080 | Listen port |
/// | `DPUSAGE_CACHE_TTL_SECS` | 3600 | Lifetime of a cached query result |
/// | `DPUSAGE_CACHE_CAPACITY` | 64 | Cached results kept per cache |
/// | `DPUSAGE_TOP_N` | 12 | Bars in the top-usage chart |
/// | `DPUSAGE_MAX_SESSIONS` | 10000 | Selection sessions kept in memory |
/// | `DPUSAGE_SESSION_TTL_SECS` | 3600 | Idle session lifetime |
///
/// Warehouse variables are documented on [`WarehouseConfig`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub top_n: usize,
    pub max_sessions: usize,
    pub session_ttl: Duration,
    pub warehouse: WarehouseConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            top_n: DEFAULT_TOP_N,
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            warehouse: WarehouseConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }
        if self.top_n == 0 {
            return Err("top_n must be > 0".to_string());
        }
        if self.max_sessions == 0 {
            return Err("max_sessions must be > 0".to_string());
        }
        if self.session_ttl.is_zero() {
            return Err("session_ttl must be > 0".to_string());
        }
        self.warehouse
            .validate()
            .map_err(|e| format!("warehouse: {}", e))
    }

    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            cache_ttl: Duration::from_secs(env_parse(
                "DPUSAGE_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            cache_capacity: env_parse("DPUSAGE_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY),
            top_n: env_parse("DPUSAGE_TOP_N", DEFAULT_TOP_N),
            max_sessions: env_parse("DPUSAGE_MAX_SESSIONS", DEFAULT_MAX_SESSIONS),
            session_ttl: Duration::from_secs(env_parse(
                "DPUSAGE_SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )),
            warehouse: WarehouseConfig::from_env(),
        }
    }

    pub fn with_warehouse(mut self, warehouse: WarehouseConfig) -> Self {
        self.warehouse = warehouse;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}
