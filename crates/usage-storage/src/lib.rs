//! dpusage Storage
//!
//! Warehouse backend abstraction for the usage dashboard.
//! The bundled backend reads a local SQLite warehouse file.

pub mod warehouse_config;

use dpusage_core::{init_warehouse_schema, Result, UsageError};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub use warehouse_config::WarehouseConfig;

/// Backend abstraction for the warehouse
///
/// Implementations hand out connections to a store exposing the catalog
/// views table and the usage history table.
pub trait WarehouseBackend: Send + Sync {
    /// Get a connection to the warehouse
    fn get_connection(&self) -> Result<Connection>;

    /// Check if the warehouse exists
    fn exists(&self) -> Result<bool>;

    /// Initialize a new warehouse (create the file and schema)
    fn initialize(&self) -> Result<()>;
}

/// Local filesystem SQLite warehouse
#[derive(Clone, Debug)]
pub struct LocalSqliteBackend {
    /// Path to the SQLite database file
    path: PathBuf,
    busy_timeout: Duration,
    read_only: bool,
}

impl LocalSqliteBackend {
    /// Create a read-write backend for the given file
    ///
    /// # Example
    /// ```
    /// use dpusage_storage::LocalSqliteBackend;
    ///
    /// let backend = LocalSqliteBackend::new("warehouse.db");
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: Duration::from_millis(warehouse_config::DEFAULT_BUSY_TIMEOUT_MS),
            read_only: false,
        }
    }

    /// Create a backend from configuration
    pub fn from_config(config: &WarehouseConfig) -> Self {
        Self {
            path: config.path.clone(),
            busy_timeout: config.busy_timeout,
            read_only: config.read_only,
        }
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl WarehouseBackend for LocalSqliteBackend {
    fn get_connection(&self) -> Result<Connection> {
        let conn = if self.read_only {
            Connection::open_with_flags(
                &self.path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            let conn = Connection::open(&self.path)?;
            init_warehouse_schema(&conn)?;
            conn
        };

        conn.busy_timeout(self.busy_timeout)?;
        debug!(path = ?self.path, read_only = self.read_only, "Opened warehouse connection");

        Ok(conn)
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.path.exists())
    }

    fn initialize(&self) -> Result<()> {
        if self.exists()? {
            return Err(UsageError::Other(format!(
                "Warehouse already exists at {:?}",
                self.path
            )));
        }

        let conn = Connection::open(&self.path)?;
        init_warehouse_schema(&conn)?;

        Ok(())
    }
}
