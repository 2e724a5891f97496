//! Dashboard view assembly.
//!
//! One request produces the whole page state: the product table, both
//! charts, the metric tile and, when a row is selected, its per-user
//! drill-down. Filtering happens in memory on top of the cached usage rows,
//! so changing the pattern or the multi-version toggle never reaches the
//! warehouse.

use crate::charts::{comparison_chart, top_usage_chart, ChartOutcome};
use crate::name_filter::{filter_by_name, multi_version_only};
use crate::usage_analytics::UsageService;
use crate::usage_change::{usage_metric, MetricOutcome};
use dpusage_core::config::{
    display_column, COLUMN_RENAME_MAP, DEFAULT_NAME_FILTER, DEFAULT_TOP_N, DEFAULT_WINDOW_DAYS,
    USER_DETAILS_COLUMNS,
};
use dpusage_core::validation::validate_windows;
use dpusage_core::{Result, SchemaChoice, UsageRow, UserUsageRow};
use dpusage_storage::WarehouseBackend;
use serde::Serialize;
use tracing::debug;

/// Operator inputs for one dashboard render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRequest {
    pub schema: SchemaChoice,
    pub windows: Vec<u32>,
    /// Name filter pattern
    pub filter: String,
    /// Only show products that exist in several versions
    pub multi_version: bool,
    pub top_n: usize,
}

impl Default for DashboardRequest {
    fn default() -> Self {
        Self {
            schema: SchemaChoice::Both,
            windows: vec![DEFAULT_WINDOW_DAYS],
            filter: DEFAULT_NAME_FILTER.to_string(),
            multi_version: false,
            top_n: DEFAULT_TOP_N,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Banner shown above the overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductTableRow {
    pub full_object_name: String,
    pub schema_name: String,
    pub table_name: String,
    /// Last-window counts in column order
    pub queries: Vec<i64>,
    pub selected: bool,
}

/// The product listing with its display headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductTable {
    pub columns: Vec<String>,
    pub rows: Vec<ProductTableRow>,
}

/// Per-user drill-down for the selected product
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDetails {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<UserUsageRow>,
    pub empty_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub schema: SchemaChoice,
    pub windows: Vec<u32>,
    pub filter: String,
    pub multi_version: bool,
    pub filter_error: Option<String>,
    pub notice: Option<Notice>,
    /// Products in the catalog for the chosen schemas
    pub total_products: usize,
    pub table: ProductTable,
    pub top_usage: ChartOutcome,
    pub comparison: ChartOutcome,
    pub metric: MetricOutcome,
    /// Selected row, if it is still visible
    pub selected: Option<String>,
    pub user_details: Option<UserDetails>,
}

/// Build the product table; the window columns follow `windows`
pub fn product_table(rows: &[UsageRow], windows: &[u32], selected: Option<&str>) -> ProductTable {
    let columns = COLUMN_RENAME_MAP
        .iter()
        .map(|(_, display)| display.to_string())
        .chain(windows.iter().map(|&d| display_column(d)))
        .collect();

    let rows = rows
        .iter()
        .map(|row| ProductTableRow {
            full_object_name: row.entry.full_object_name.clone(),
            schema_name: row.entry.schema_name.clone(),
            table_name: row.entry.table_name.clone(),
            queries: windows.iter().map(|&d| row.last(d)).collect(),
            selected: selected == Some(row.entry.full_object_name.as_str()),
        })
        .collect();

    ProductTable { columns, rows }
}

/// Wrap drill-down rows for display
pub fn user_details(table_name: &str, rows: Vec<UserUsageRow>) -> UserDetails {
    let empty_message = rows
        .is_empty()
        .then(|| format!("No users found for {} in the last 30 days.", table_name));

    UserDetails {
        title: format!("User Details for {}", table_name),
        columns: USER_DETAILS_COLUMNS
            .iter()
            .map(|(_, display)| display.to_string())
            .collect(),
        rows,
        empty_message,
    }
}

/// Apply the name filter then the multi-version filter
///
/// Returns the visible rows, the pattern error if any, and the notice to
/// show.
fn visible_rows(
    all_rows: &[UsageRow],
    request: &DashboardRequest,
) -> (Vec<UsageRow>, Option<String>, Option<Notice>) {
    if all_rows.is_empty() {
        let notice = Notice {
            level: NoticeLevel::Warning,
            message: format!(
                "No data products found for schema filter: '{}'.",
                request.schema
            ),
        };
        return (Vec::new(), None, Some(notice));
    }

    let filtered = filter_by_name(all_rows, &request.filter);
    let notice = filtered.rows.is_empty().then(|| Notice {
        level: NoticeLevel::Info,
        message: "Your filter returned no results.".to_string(),
    });

    let rows = if request.multi_version {
        multi_version_only(filtered.rows)
    } else {
        filtered.rows
    };

    (rows, filtered.error, notice)
}

/// Assemble the full dashboard
///
/// `selected` is the session's selection; it is ignored when that row is not
/// among the visible rows.
pub fn build_dashboard<B: WarehouseBackend>(
    service: &UsageService<B>,
    request: &DashboardRequest,
    selected: Option<&str>,
) -> Result<DashboardView> {
    let windows = validate_windows(&request.windows)?;
    let all_rows = service.usage(&windows, request.schema)?;
    let (rows, filter_error, notice) = visible_rows(&all_rows, request);

    let selected_row =
        selected.and_then(|name| rows.iter().find(|row| row.entry.full_object_name == name));
    let selected_name = selected_row.map(|r| r.entry.full_object_name.as_str());

    let details = match selected_row {
        Some(row) => {
            let users = service.users(&row.entry.full_object_name)?;
            Some(user_details(&row.entry.table_name, users.to_vec()))
        }
        None => None,
    };

    debug!(
        schema = %request.schema,
        total = all_rows.len(),
        visible = rows.len(),
        selected = ?selected_name,
        "Assembled dashboard"
    );

    Ok(DashboardView {
        schema: request.schema,
        filter: request.filter.clone(),
        multi_version: request.multi_version,
        filter_error,
        notice,
        total_products: all_rows.len(),
        table: product_table(&rows, &windows, selected_name),
        top_usage: top_usage_chart(&rows, &windows, request.top_n, request.schema),
        comparison: comparison_chart(
            &rows,
            windows.first().copied(),
            request.top_n,
            request.schema,
        ),
        metric: usage_metric(&rows, &windows, selected_row),
        selected: selected_name.map(str::to_string),
        user_details: details,
        windows,
    })
}
