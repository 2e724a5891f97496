//! Chart Data Module
//!
//! Reshapes wide usage rows (one count column per window) into the long form
//! a grouped bar chart consumes: one point per object per period.
//!
//! # Charts
//!
//! - **Top usage**: the busiest objects by the largest selected window, one
//!   bar group per window, faceted by period when several windows are shown
//! - **Comparison**: the busiest objects by one window, side by side with
//!   the window before it

use dpusage_core::config::{previous_label, window_label};
use dpusage_core::{SchemaChoice, UsageRow};
use serde::Serialize;

// ===== Chart Types =====

/// One bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub full_object_name: String,
    pub table_name: String,
    pub schema_name: String,
    /// `Last 7 Days`, `Previous 30 Days`, ...
    pub period: String,
    pub query_count: i64,
}

/// Everything the page needs to draw one chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chart {
    pub title: String,
    /// Period labels in display order
    pub periods: Vec<String>,
    /// Draw one panel per period instead of grouping bars
    pub facet_by_period: bool,
    /// Colour legend by schema
    pub show_legend: bool,
    pub points: Vec<ChartPoint>,
}

/// A chart, or the reason there is nothing to draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartOutcome {
    Ready(Chart),
    Empty { message: String },
}

impl ChartOutcome {
    fn empty(message: &str) -> Self {
        ChartOutcome::Empty {
            message: message.to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ChartOutcome::Ready(_))
    }
}

const NO_WINDOW_MESSAGE: &str = "Please select a time window above to view the usage graph.";
const NO_ROWS_MESSAGE: &str = "No data to display in graph.";
const NO_USAGE_MESSAGE: &str = "No query usage to display in the graph for the selected filter.";

// ===== Reshaping =====

/// The `top_n` rows with the highest count returned by `key`
///
/// Ties keep their input order.
fn top_rows<F>(rows: &[UsageRow], top_n: usize, key: F) -> Vec<&UsageRow>
where
    F: Fn(&UsageRow) -> i64,
{
    let mut ranked: Vec<&UsageRow> = rows.iter().collect();
    ranked.sort_by(|a, b| key(b).cmp(&key(a)));
    ranked.truncate(top_n);
    ranked
}

fn point(row: &UsageRow, period: String, query_count: i64) -> ChartPoint {
    ChartPoint {
        full_object_name: row.entry.full_object_name.clone(),
        table_name: row.entry.table_name.clone(),
        schema_name: row.entry.schema_name.clone(),
        period,
        query_count,
    }
}

/// Unpivot the "last" counts of `windows` into one point per row per window
///
/// Points are grouped by window in `windows` order, rows in input order
/// within each window.
pub fn melt<'a, I>(rows: I, windows: &[u32]) -> Vec<ChartPoint>
where
    I: IntoIterator<Item = &'a UsageRow>,
    I::IntoIter: Clone,
{
    let rows = rows.into_iter();
    windows
        .iter()
        .flat_map(|&days| {
            rows.clone()
                .map(move |row| point(row, window_label(days), row.last(days)))
        })
        .collect()
}

// ===== Charts =====

/// Top-usage bar chart over every selected window
pub fn top_usage_chart(
    rows: &[UsageRow],
    windows: &[u32],
    top_n: usize,
    schema: SchemaChoice,
) -> ChartOutcome {
    let Some(&sort_days) = windows.iter().max() else {
        return ChartOutcome::empty(NO_WINDOW_MESSAGE);
    };
    if rows.is_empty() {
        return ChartOutcome::empty(NO_ROWS_MESSAGE);
    }

    let top = top_rows(rows, top_n, |r| r.last(sort_days));
    if top.iter().map(|r| r.last(sort_days)).sum::<i64>() == 0 {
        return ChartOutcome::empty(NO_USAGE_MESSAGE);
    }

    let faceted = windows.len() > 1;
    let title = if faceted {
        format!("Top {} Used Data Products by Time Period", top_n)
    } else {
        format!("Top {} Used Data Products (by {}-day usage)", top_n, windows[0])
    };

    ChartOutcome::Ready(Chart {
        title,
        periods: windows.iter().map(|&d| window_label(d)).collect(),
        facet_by_period: faceted,
        show_legend: schema.shows_legend(),
        points: melt(top.iter().copied(), windows),
    })
}

/// Last `days` days next to the `days` days before, for the busiest objects
pub fn comparison_chart(
    rows: &[UsageRow],
    days: Option<u32>,
    top_n: usize,
    schema: SchemaChoice,
) -> ChartOutcome {
    let Some(days) = days else {
        return ChartOutcome::empty(NO_WINDOW_MESSAGE);
    };
    if rows.is_empty() {
        return ChartOutcome::empty(NO_ROWS_MESSAGE);
    }

    let top = top_rows(rows, top_n, |r| r.last(days));
    if top.iter().all(|r| r.last(days) == 0 && r.previous(days) == 0) {
        return ChartOutcome::empty(NO_USAGE_MESSAGE);
    }

    let current = window_label(days);
    let previous = previous_label(days);

    let mut points: Vec<ChartPoint> = top
        .iter()
        .map(|row| point(row, current.clone(), row.last(days)))
        .collect();
    points.extend(
        top.iter()
            .map(|row| point(row, previous.clone(), row.previous(days))),
    );

    ChartOutcome::Ready(Chart {
        title: format!("Top {} Usage Comparison", top_n),
        periods: vec![current, previous],
        facet_by_period: false,
        show_legend: schema.shows_legend(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpusage_core::{CatalogEntry, WindowCounts};
    use pretty_assertions::assert_eq;

    fn row(table: &str, schema: &str, counts: &[(u32, i64, i64)]) -> UsageRow {
        UsageRow {
            entry: CatalogEntry {
                full_object_name: format!("DATAPRODUKTER.{}.{}", schema, table),
                schema_name: schema.to_string(),
                table_name: table.to_string(),
            },
            windows: counts
                .iter()
                .map(|&(days, last, previous)| WindowCounts {
                    days,
                    last,
                    previous,
                })
                .collect(),
        }
    }

    fn sample() -> Vec<UsageRow> {
        vec![
            row("A", "INTERNE", &[(7, 1, 0), (30, 4, 2)]),
            row("B", "EKSTERNE", &[(7, 3, 1), (30, 9, 0)]),
            row("C", "INTERNE", &[(7, 0, 0), (30, 0, 5)]),
        ]
    }

    fn ready(outcome: ChartOutcome) -> Chart {
        match outcome {
            ChartOutcome::Ready(chart) => chart,
            ChartOutcome::Empty { message } => panic!("expected a chart, got: {message}"),
        }
    }

    #[test]
    fn test_melt_point_count_and_labels() {
        let rows = sample();
        let points = melt(&rows, &[7, 30]);
        assert_eq!(points.len(), 2 * rows.len());
        assert!(points[..3].iter().all(|p| p.period == "Last 7 Days"));
        assert!(points[3..].iter().all(|p| p.period == "Last 30 Days"));
        assert_eq!(points[4].table_name, "B");
        assert_eq!(points[4].query_count, 9);
    }

    #[test]
    fn test_top_usage_sorted_by_largest_window() {
        let chart = ready(top_usage_chart(&sample(), &[7, 30], 2, SchemaChoice::Both));
        let first_period: Vec<&str> = chart
            .points
            .iter()
            .filter(|p| p.period == "Last 7 Days")
            .map(|p| p.table_name.as_str())
            .collect();
        assert_eq!(first_period, vec!["B", "A"]);
        assert_eq!(chart.title, "Top 2 Used Data Products by Time Period");
        assert!(chart.facet_by_period);
        assert!(chart.show_legend);
        assert_eq!(chart.periods, vec!["Last 7 Days", "Last 30 Days"]);
    }

    #[test]
    fn test_top_usage_single_window_title() {
        let chart = ready(top_usage_chart(&sample(), &[7], 12, SchemaChoice::Internal));
        assert_eq!(chart.title, "Top 12 Used Data Products (by 7-day usage)");
        assert!(!chart.facet_by_period);
        assert!(!chart.show_legend);
        assert_eq!(chart.points.len(), 3);
    }

    #[test]
    fn test_top_usage_empty_cases() {
        let rows = sample();
        assert_eq!(
            top_usage_chart(&rows, &[], 12, SchemaChoice::Both),
            ChartOutcome::empty(NO_WINDOW_MESSAGE)
        );
        assert_eq!(
            top_usage_chart(&[], &[7], 12, SchemaChoice::Both),
            ChartOutcome::empty(NO_ROWS_MESSAGE)
        );
        let idle = vec![row("C", "INTERNE", &[(7, 0, 3)])];
        assert_eq!(
            top_usage_chart(&idle, &[7], 12, SchemaChoice::Both),
            ChartOutcome::empty(NO_USAGE_MESSAGE)
        );
    }

    #[test]
    fn test_comparison_chart() {
        let chart = ready(comparison_chart(&sample(), Some(30), 2, SchemaChoice::Both));
        assert_eq!(chart.title, "Top 2 Usage Comparison");
        assert_eq!(chart.periods, vec!["Last 30 Days", "Previous 30 Days"]);

        let summary: Vec<(&str, &str, i64)> = chart
            .points
            .iter()
            .map(|p| (p.table_name.as_str(), p.period.as_str(), p.query_count))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("B", "Last 30 Days", 9),
                ("A", "Last 30 Days", 4),
                ("B", "Previous 30 Days", 0),
                ("A", "Previous 30 Days", 2),
            ]
        );
    }

    #[test]
    fn test_comparison_chart_empty_cases() {
        assert!(!comparison_chart(&sample(), None, 10, SchemaChoice::Both).is_ready());
        assert!(!comparison_chart(&[], Some(7), 10, SchemaChoice::Both).is_ready());
        let idle = vec![row("C", "INTERNE", &[(7, 0, 0)])];
        assert!(!comparison_chart(&idle, Some(7), 10, SchemaChoice::Both).is_ready());
    }
}
