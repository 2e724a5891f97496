//! dpusage Core
//!
//! Core types, constants, warehouse schema and SQL generation for the
//! data product usage dashboard.

pub mod config;
pub mod query_builder;
pub mod validation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which catalog schema namespaces a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchemaChoice {
    /// Both `INTERNE` and `EKSTERNE`
    #[default]
    Both,
    /// Internal data products only
    #[serde(rename = "INTERNE")]
    Internal,
    /// External data products only
    #[serde(rename = "EKSTERNE")]
    External,
}

impl SchemaChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaChoice::Both => config::BOTH_SCHEMAS,
            SchemaChoice::Internal => config::INTERNAL_SCHEMA,
            SchemaChoice::External => config::EXTERNAL_SCHEMA,
        }
    }

    /// Schema names this choice expands to, in catalog order
    pub fn schemas(&self) -> &'static [&'static str] {
        match self {
            SchemaChoice::Both => &[config::INTERNAL_SCHEMA, config::EXTERNAL_SCHEMA],
            SchemaChoice::Internal => &[config::INTERNAL_SCHEMA],
            SchemaChoice::External => &[config::EXTERNAL_SCHEMA],
        }
    }

    /// Charts only need a schema legend when more than one schema is shown
    pub fn shows_legend(&self) -> bool {
        matches!(self, SchemaChoice::Both)
    }

    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl std::str::FromStr for SchemaChoice {
    type Err = UsageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BOTH" | "" => Ok(SchemaChoice::Both),
            "INTERNE" => Ok(SchemaChoice::Internal),
            "EKSTERNE" => Ok(SchemaChoice::External),
            other => Err(UsageError::InvalidSchema(other.to_string())),
        }
    }
}

impl std::fmt::Display for SchemaChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A view registered in the warehouse catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// `database.schema.table`
    pub full_object_name: String,
    pub schema_name: String,
    /// Short view name, used for display and name filtering
    pub table_name: String,
}

/// Distinct-query counts for one trailing window and the window before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounts {
    pub days: u32,
    /// Queries in the last `days` days
    pub last: i64,
    /// Queries in the `days` days immediately before that
    pub previous: i64,
}

/// One catalog entry with its usage counts for every requested window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRow {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    /// Counts in requested window order (empty when no window was requested)
    pub windows: Vec<WindowCounts>,
}

impl UsageRow {
    pub fn counts(&self, days: u32) -> Option<&WindowCounts> {
        self.windows.iter().find(|w| w.days == days)
    }

    /// Queries in the last `days` days, zero when the window was not requested
    pub fn last(&self, days: u32) -> i64 {
        self.counts(days).map(|c| c.last).unwrap_or(0)
    }

    /// Queries in the period preceding the last `days` days
    pub fn previous(&self, days: u32) -> i64 {
        self.counts(days).map(|c| c.previous).unwrap_or(0)
    }
}

/// Per-user query counts for a single data product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUsageRow {
    pub user_name: String,
    pub queries_last_7_days: i64,
    pub queries_last_30_days: i64,
}

/// Errors that can occur in usage operations
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] rusqlite::Error),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Unknown schema choice: {0}")]
    InvalidSchema(String),

    #[error("Invalid object name: {0}")]
    InvalidObjectName(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl UsageError {
    /// True for failures raised by the warehouse itself rather than by input checks
    pub fn is_warehouse(&self) -> bool {
        matches!(self, UsageError::Warehouse(_))
    }
}

/// Result type for usage operations
pub type Result<T> = std::result::Result<T, UsageError>;

/// Render an instant the way `query_start_time` is stored
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(config::TIMESTAMP_FORMAT).to_string()
}

/// Initialize the warehouse schema
///
/// Creates the tables the dashboard reads if they don't exist:
/// - `information_schema_views`: catalog of views per database and schema
/// - `data_product_usage_history`: one row per (query, accessed object)
pub fn init_warehouse_schema(conn: &rusqlite::Connection) -> Result<()> {
    let ddl = r#"
    -- Catalog metadata for views
    CREATE TABLE IF NOT EXISTS information_schema_views (
      table_catalog TEXT NOT NULL,
      table_schema TEXT NOT NULL,
      table_name TEXT NOT NULL,
      created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
      PRIMARY KEY (table_catalog, table_schema, table_name)
    );

    CREATE INDEX IF NOT EXISTS idx_views_schema ON information_schema_views(table_schema);

    -- Usage history fact table
    CREATE TABLE IF NOT EXISTS data_product_usage_history (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      accessed_object_name TEXT NOT NULL,
      user_name TEXT NOT NULL,
      query_id TEXT NOT NULL,
      query_start_time TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_usage_object_time
      ON data_product_usage_history(accessed_object_name, query_start_time);
    CREATE INDEX IF NOT EXISTS idx_usage_time
      ON data_product_usage_history(query_start_time);
    "#;

    conn.execute_batch(ddl)?;
    Ok(())
}

/// Register a view in the catalog (no-op if it already exists)
pub fn register_view(
    conn: &rusqlite::Connection,
    database: &str,
    schema: &str,
    table: &str,
) -> Result<()> {
    validation::validate_identifier_part(database)?;
    validation::validate_identifier_part(schema)?;
    validation::validate_identifier_part(table)?;

    conn.execute(
        "INSERT OR IGNORE INTO information_schema_views (table_catalog, table_schema, table_name)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![database, schema, table],
    )?;
    Ok(())
}

/// Record one query touching one object
pub fn record_query(
    conn: &rusqlite::Connection,
    object_name: &str,
    user_name: &str,
    query_id: &str,
    started_at: DateTime<Utc>,
) -> Result<()> {
    validation::validate_object_name(object_name)?;

    conn.execute(
        "INSERT INTO data_product_usage_history
           (accessed_object_name, user_name, query_id, query_start_time)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![object_name, user_name, query_id, format_timestamp(started_at)],
    )?;
    Ok(())
}
