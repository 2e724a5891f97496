//! Static dashboard configuration: schema names, time windows and column labels.

/// Warehouse database whose views are tracked as data products
pub const DEFAULT_DATABASE_NAME: &str = "DATAPRODUKTER";

/// Schema holding internal data products
pub const INTERNAL_SCHEMA: &str = "INTERNE";

/// Schema holding external data products
pub const EXTERNAL_SCHEMA: &str = "EKSTERNE";

/// Selector label covering both schemas
pub const BOTH_SCHEMAS: &str = "Both";

/// Schema selector options, in display order
pub const SCHEMA_OPTIONS: &[&str] = &[BOTH_SCHEMAS, INTERNAL_SCHEMA, EXTERNAL_SCHEMA];

/// Selectable time windows: (label, days)
pub const TIME_WINDOW_OPTIONS: &[(&str, u32)] = &[
    ("Last 7 Days", 7),
    ("Last 14 Days", 14),
    ("Last 30 Days", 30),
    ("Last 90 Days", 90),
];

/// Window selected when the dashboard opens
pub const DEFAULT_WINDOW_DAYS: u32 = 90;

/// Upper bound on a requested window (ten years)
pub const MAX_WINDOW_DAYS: u32 = 3650;

/// Fixed drill-down windows
pub const USER_SHORT_WINDOW_DAYS: u32 = 7;
pub const USER_LONG_WINDOW_DAYS: u32 = 30;

/// Bars shown in the top-usage chart
pub const DEFAULT_TOP_N: usize = 12;

/// Name filter applied when the operator has not typed anything
pub const DEFAULT_NAME_FILTER: &str = ".";

/// Catalog table listing views
pub const CATALOG_VIEWS_TABLE: &str = "information_schema_views";

/// Usage fact table
pub const USAGE_HISTORY_TABLE: &str = "data_product_usage_history";

/// Storage format of `query_start_time`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Query column -> table header for the product listing
pub const COLUMN_RENAME_MAP: &[(&str, &str)] = &[
    ("FULL_OBJECT_NAME", "Full Object Name"),
    ("SCHEMA_NAME", "Schema"),
    ("TABLE_NAME", "Name"),
];

/// Query column -> table header for the drill-down
pub const USER_DETAILS_COLUMNS: &[(&str, &str)] = &[
    ("USER_NAME", "User Name"),
    ("QUERIES_LAST_7_DAYS", "Queries (Last 7d)"),
    ("QUERIES_LAST_30_DAYS", "Queries (Last 30d)"),
];

/// Hint shown next to warehouse failures
pub fn warehouse_hint() -> String {
    format!(
        "Please ensure the table `{}` exists and the warehouse user can read it and `{}`.",
        USAGE_HISTORY_TABLE, CATALOG_VIEWS_TABLE
    )
}

/// `QUERIES_LAST_{days}_DAYS`
pub fn last_column(days: u32) -> String {
    format!("QUERIES_LAST_{}_DAYS", days)
}

/// `QUERIES_PREVIOUS_{days}_DAYS`
pub fn previous_column(days: u32) -> String {
    format!("QUERIES_PREVIOUS_{}_DAYS", days)
}

/// Chart label for a trailing window
pub fn window_label(days: u32) -> String {
    format!("Last {} Days", days)
}

/// Chart label for the window preceding a trailing window
pub fn previous_label(days: u32) -> String {
    format!("Previous {} Days", days)
}

/// Table header for a window's query count
pub fn display_column(days: u32) -> String {
    format!("Queries (Last {}d)", days)
}

/// Resolve a window label ("Last 30 Days") to its day count
pub fn window_days_for_label(label: &str) -> Option<u32> {
    TIME_WINDOW_OPTIONS
        .iter()
        .find(|(l, _)| l.eq_ignore_ascii_case(label.trim()))
        .map(|(_, d)| *d)
}
