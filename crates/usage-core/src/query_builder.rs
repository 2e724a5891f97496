//! SQL generation for usage queries
//!
//! Every dashboard interaction is answered by a single statement:
//!
//! - `all_datasets`: catalog views for one database, limited to the chosen schemas
//! - `usage_counts`: distinct query ids per object for each requested window
//!   and for the equal-length window right before it
//! - a `LEFT JOIN` of the two so that views without usage still appear with zeros
//!
//! The number of count columns depends on the requested windows, so the
//! statement is assembled per request. Database, schema and object names are
//! bound as parameters; the only values rendered into the text are validated
//! window sizes.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{
    last_column, previous_column, CATALOG_VIEWS_TABLE, DEFAULT_DATABASE_NAME,
    USAGE_HISTORY_TABLE, USER_LONG_WINDOW_DAYS, USER_SHORT_WINDOW_DAYS,
};
use crate::validation::{validate_identifier_part, validate_object_name, validate_windows};
use crate::{format_timestamp, CatalogEntry, Result, SchemaChoice, UsageRow, UserUsageRow, WindowCounts};

/// Parameters of the catalog + usage aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageQuery {
    /// Trailing windows in days, in the order their columns should appear
    pub windows: Vec<u32>,
    pub schema: SchemaChoice,
    /// Catalog database whose views are listed
    pub database: String,
    /// Reference instant the windows trail back from
    pub now: DateTime<Utc>,
}

impl UsageQuery {
    pub fn new(windows: Vec<u32>, schema: SchemaChoice) -> Self {
        Self {
            windows,
            schema,
            database: DEFAULT_DATABASE_NAME.to_string(),
            now: Utc::now(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Pin the reference instant
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// A generated statement with its positional parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    /// Values for `?1`, `?2`, ... in order
    pub params: Vec<String>,
    /// Normalized windows whose count columns the statement returns
    pub windows: Vec<u32>,
}

impl BuiltQuery {
    /// Column the result is ordered by, `None` for the plain catalog listing
    pub fn sort_column(&self) -> Option<String> {
        self.windows.iter().copied().max().map(last_column)
    }
}

/// Positional parameter collector
#[derive(Default)]
struct Params {
    values: Vec<String>,
}

impl Params {
    fn bind(&mut self, value: impl Into<String>) -> String {
        self.values.push(value.into());
        format!("?{}", self.values.len())
    }
}

/// Build the catalog + usage aggregation
///
/// Without windows the result is the plain catalog listing ordered by full
/// name. With windows every catalog row carries `QUERIES_LAST_{d}_DAYS` and
/// `QUERIES_PREVIOUS_{d}_DAYS` per window, ordered by the largest window's
/// "last" count descending.
pub fn build_usage_query(query: &UsageQuery) -> Result<BuiltQuery> {
    let windows = validate_windows(&query.windows)?;
    validate_identifier_part(&query.database)?;

    let mut params = Params::default();
    let database = params.bind(query.database.as_str());
    let schemas = query
        .schema
        .schemas()
        .iter()
        .map(|s| params.bind(*s))
        .collect::<Vec<_>>()
        .join(", ");

    let all_datasets_cte = format!(
        r#"WITH all_datasets AS (
    SELECT
        table_catalog AS DATABASE_NAME,
        table_schema AS SCHEMA_NAME,
        table_name AS TABLE_NAME,
        table_catalog || '.' || table_schema || '.' || table_name AS FULL_OBJECT_NAME
    FROM {CATALOG_VIEWS_TABLE}
    WHERE table_catalog = {database}
      AND table_schema IN ({schemas})
)"#
    );

    let Some(max_days) = windows.iter().copied().max() else {
        let sql = format!(
            r#"{all_datasets_cte}
SELECT
    d.FULL_OBJECT_NAME,
    d.SCHEMA_NAME,
    d.TABLE_NAME
FROM all_datasets d
ORDER BY d.FULL_OBJECT_NAME"#
        );

        return Ok(BuiltQuery {
            sql,
            params: params.values,
            windows,
        });
    };

    let now = params.bind(format_timestamp(query.now));

    let usage_select_clause = windows
        .iter()
        .map(|&days| {
            format!(
                r#"        COUNT(DISTINCT CASE
            WHEN query_start_time >= datetime({now}, '-{days} days') THEN query_id
        END) AS {last},
        COUNT(DISTINCT CASE
            WHEN query_start_time >= datetime({now}, '-{double} days')
             AND query_start_time < datetime({now}, '-{days} days') THEN query_id
        END) AS {previous}"#,
                double = days * 2,
                last = last_column(days),
                previous = previous_column(days),
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    // The previous period of the largest window reaches back twice its length
    let usage_counts_cte = format!(
        r#", usage_counts AS (
    SELECT
        accessed_object_name AS ACCESSED_OBJECT_NAME,
{usage_select_clause}
    FROM {USAGE_HISTORY_TABLE}
    WHERE query_start_time >= datetime({now}, '-{lookback} days')
    GROUP BY accessed_object_name
)"#,
        lookback = max_days * 2,
    );

    let final_select_clause = windows
        .iter()
        .flat_map(|&days| [last_column(days), previous_column(days)])
        .map(|col| format!("    COALESCE(u.{col}, 0) AS {col}"))
        .collect::<Vec<_>>()
        .join(",\n");

    let sql = format!(
        r#"{all_datasets_cte}
{usage_counts_cte}
SELECT
    d.FULL_OBJECT_NAME,
    d.SCHEMA_NAME,
    d.TABLE_NAME,
{final_select_clause}
FROM all_datasets d
LEFT JOIN usage_counts u
    ON d.FULL_OBJECT_NAME = u.ACCESSED_OBJECT_NAME
ORDER BY {sort_col} DESC, d.FULL_OBJECT_NAME"#,
        sort_col = last_column(max_days),
    );

    debug!(schema = %query.schema, windows = ?windows, "Built usage query");

    Ok(BuiltQuery {
        sql,
        params: params.values,
        windows,
    })
}

/// Build the per-user drill-down for one object
///
/// Counts distinct queries per user over the fixed 7 and 30 day windows,
/// limited to activity in the last 30 days.
pub fn build_user_usage_query(object_name: &str, now: DateTime<Utc>) -> Result<BuiltQuery> {
    validate_object_name(object_name)?;

    let mut params = Params::default();
    let object = params.bind(object_name);
    let now = params.bind(format_timestamp(now));

    let short = USER_SHORT_WINDOW_DAYS;
    let long = USER_LONG_WINDOW_DAYS;

    let sql = format!(
        r#"SELECT
    user_name AS USER_NAME,
    COUNT(DISTINCT CASE
        WHEN query_start_time >= datetime({now}, '-{short} days') THEN query_id
    END) AS {short_col},
    COUNT(DISTINCT CASE
        WHEN query_start_time >= datetime({now}, '-{long} days') THEN query_id
    END) AS {long_col}
FROM {USAGE_HISTORY_TABLE}
WHERE accessed_object_name = {object}
  AND query_start_time >= datetime({now}, '-{long} days')
GROUP BY user_name
ORDER BY {long_col} DESC, USER_NAME"#,
        short_col = last_column(short),
        long_col = last_column(long),
    );

    Ok(BuiltQuery {
        sql,
        params: params.values,
        windows: vec![short, long],
    })
}

/// Map one result row of [`build_usage_query`] into a [`UsageRow`]
pub fn map_usage_row(row: &rusqlite::Row<'_>, windows: &[u32]) -> rusqlite::Result<UsageRow> {
    let entry = CatalogEntry {
        full_object_name: row.get(0)?,
        schema_name: row.get(1)?,
        table_name: row.get(2)?,
    };

    let windows = windows
        .iter()
        .enumerate()
        .map(|(i, &days)| {
            Ok(WindowCounts {
                days,
                last: row.get(3 + 2 * i)?,
                previous: row.get(4 + 2 * i)?,
            })
        })
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(UsageRow { entry, windows })
}

/// Map one result row of [`build_user_usage_query`] into a [`UserUsageRow`]
pub fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserUsageRow> {
    Ok(UserUsageRow {
        user_name: row.get(0)?,
        queries_last_7_days: row.get(1)?,
        queries_last_30_days: row.get(2)?,
    })
}
