//! Warehouse connection configuration.
//!
//! Describes where the warehouse lives and how connections to it are opened.

use dpusage_core::config::DEFAULT_DATABASE_NAME;
use dpusage_core::validation::validate_identifier_part;
use std::path::PathBuf;
use std::time::Duration;

/// Default warehouse file.
pub const DEFAULT_WAREHOUSE_PATH: &str = "dpusage_warehouse.db";

/// Default time a query waits on a locked warehouse file.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Warehouse configuration.
///
/// # Environment Variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `DPUSAGE_WAREHOUSE_PATH` | `dpusage_warehouse.db` | SQLite warehouse file |
/// | `DPUSAGE_DATABASE_NAME` | `DATAPRODUKTER` | Catalog database whose views are listed |
/// | `DPUSAGE_BUSY_TIMEOUT_MS` | 5000 | Wait on a locked file before failing |
/// | `DPUSAGE_READ_ONLY` | true | Open dashboard connections read-only |
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Path to the SQLite warehouse file.
    pub path: PathBuf,

    /// Catalog database name.
    pub database_name: String,

    /// Busy timeout applied to every connection.
    pub busy_timeout: Duration,

    /// Open connections read-only.
    pub read_only: bool,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_WAREHOUSE_PATH),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            read_only: true,
        }
    }
}

impl WarehouseConfig {
    /// Create a configuration for the given warehouse file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Validate configuration values.
    ///
    /// Returns an error if any values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("path must not be empty".to_string());
        }
        if validate_identifier_part(&self.database_name).is_err() {
            return Err(format!(
                "database_name '{}' is not a valid identifier",
                self.database_name
            ));
        }
        if self.busy_timeout.is_zero() {
            return Err("busy_timeout must be > 0".to_string());
        }
        Ok(())
    }

    /// Create configuration from environment variables.
    ///
    /// Falls back to defaults for any unset variables.
    pub fn from_env() -> Self {
        Self {
            path: PathBuf::from(env_parse(
                "DPUSAGE_WAREHOUSE_PATH",
                DEFAULT_WAREHOUSE_PATH.to_string(),
            )),
            database_name: env_parse("DPUSAGE_DATABASE_NAME", DEFAULT_DATABASE_NAME.to_string()),
            busy_timeout: Duration::from_millis(env_parse(
                "DPUSAGE_BUSY_TIMEOUT_MS",
                DEFAULT_BUSY_TIMEOUT_MS,
            )),
            read_only: env_parse("DPUSAGE_READ_ONLY", true),
        }
    }

    /// Set the catalog database name.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Open connections read-only or read-write.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Parse an environment variable with a default fallback.
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
