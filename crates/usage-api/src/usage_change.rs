//! Current vs. previous period comparison shown next to the usage chart.

use dpusage_core::UsageRow;
use serde::Serialize;
use std::fmt;

/// Change between two consecutive equal-length periods
///
/// The four cases are not symmetric: growth from zero carries
/// no percentage, while a drop to zero reports a fixed `100% decrease`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsageChange {
    /// Previous period was non-zero; `percent` may be negative or zero
    Percent { percent: f64 },
    /// Previous period was zero, current is not
    Increase,
    /// Current period is zero, previous was not
    FullDecrease,
    /// Both periods are zero
    NoChange,
}

impl UsageChange {
    pub fn compute(current: i64, previous: i64) -> Self {
        if current == 0 && previous > 0 {
            return UsageChange::FullDecrease;
        }

        if previous > 0 {
            UsageChange::Percent {
                percent: (current - previous) as f64 / previous as f64 * 100.0,
            }
        } else if current > 0 {
            UsageChange::Increase
        } else {
            UsageChange::NoChange
        }
    }

    /// Text rendered under the metric
    pub fn text(&self) -> String {
        match self {
            UsageChange::Percent { percent } => {
                let direction = if *percent > 0.0 { "increase" } else { "decrease" };
                format!("{:.2}% {}", percent.abs(), direction)
            }
            UsageChange::Increase => "Increase".to_string(),
            UsageChange::FullDecrease => "100% decrease".to_string(),
            UsageChange::NoChange => "No change".to_string(),
        }
    }
}

impl fmt::Display for UsageChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// The metric tile: a headline number and its change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageMetric {
    pub label: String,
    /// `"{current} queries"`
    pub value: String,
    pub delta: String,
    pub current: i64,
    pub previous: i64,
    pub change: UsageChange,
}

/// Metric tile, or the reason there is nothing to show
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    Ready(UsageMetric),
    Empty { message: String },
}

/// Build the metric for the first requested window
///
/// With a selected row the numbers are that row's, otherwise they are summed
/// over `rows`.
pub fn usage_metric(
    rows: &[UsageRow],
    windows: &[u32],
    selected: Option<&UsageRow>,
) -> MetricOutcome {
    let Some(&days) = windows.first() else {
        return empty_metric();
    };
    if rows.is_empty() {
        return empty_metric();
    }

    let (label, current, previous) = match selected {
        Some(row) => (
            format!("Change for {}", row.entry.table_name),
            row.last(days),
            row.previous(days),
        ),
        None => (
            format!("Change from Previous {} Days", days),
            rows.iter().map(|r| r.last(days)).sum(),
            rows.iter().map(|r| r.previous(days)).sum(),
        ),
    };

    let change = UsageChange::compute(current, previous);

    MetricOutcome::Ready(UsageMetric {
        label,
        value: format!("{} queries", current),
        delta: change.text(),
        current,
        previous,
        change,
    })
}

fn empty_metric() -> MetricOutcome {
    MetricOutcome::Empty {
        message: "No data to display.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpusage_core::{CatalogEntry, WindowCounts};

    fn row(table: &str, days: u32, last: i64, previous: i64) -> UsageRow {
        UsageRow {
            entry: CatalogEntry {
                full_object_name: format!("DATAPRODUKTER.INTERNE.{}", table),
                schema_name: "INTERNE".to_string(),
                table_name: table.to_string(),
            },
            windows: vec![WindowCounts {
                days,
                last,
                previous,
            }],
        }
    }

    #[test]
    fn test_change_text_cases() {
        assert_eq!(UsageChange::compute(150, 100).text(), "50.00% increase");
        assert_eq!(UsageChange::compute(50, 100).text(), "50.00% decrease");
        assert_eq!(UsageChange::compute(0, 0).text(), "No change");
        assert_eq!(UsageChange::compute(20, 0).text(), "Increase");
        assert_eq!(UsageChange::compute(0, 50).text(), "100% decrease");
    }

    #[test]
    fn test_equal_non_zero_periods_read_as_decrease() {
        assert_eq!(UsageChange::compute(40, 40).text(), "0.00% decrease");
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(UsageChange::compute(4, 3).text(), "33.33% increase");
        assert_eq!(UsageChange::compute(1, 3).text(), "66.67% decrease");
    }

    #[test]
    fn test_change_variants() {
        assert_eq!(UsageChange::compute(0, 7), UsageChange::FullDecrease);
        assert_eq!(UsageChange::compute(3, 0), UsageChange::Increase);
        assert_eq!(UsageChange::compute(0, 0), UsageChange::NoChange);
        assert_eq!(
            UsageChange::compute(200, 100),
            UsageChange::Percent { percent: 100.0 }
        );
    }

    #[test]
    fn test_metric_sums_visible_rows() {
        let rows = vec![row("A", 7, 10, 5), row("B", 7, 5, 5)];
        let MetricOutcome::Ready(metric) = usage_metric(&rows, &[7], None) else {
            panic!("expected a metric");
        };
        assert_eq!(metric.label, "Change from Previous 7 Days");
        assert_eq!(metric.value, "15 queries");
        assert_eq!(metric.delta, "50.00% increase");
    }

    #[test]
    fn test_metric_for_selected_row() {
        let rows = vec![row("A", 30, 0, 4), row("B", 30, 9, 1)];
        let MetricOutcome::Ready(metric) = usage_metric(&rows, &[30], Some(&rows[0])) else {
            panic!("expected a metric");
        };
        assert_eq!(metric.label, "Change for A");
        assert_eq!(metric.value, "0 queries");
        assert_eq!(metric.delta, "100% decrease");
    }

    #[test]
    fn test_metric_uses_first_window() {
        let mut r = row("A", 7, 1, 1);
        r.windows.push(WindowCounts {
            days: 30,
            last: 8,
            previous: 0,
        });
        let MetricOutcome::Ready(metric) = usage_metric(&[r], &[7, 30], None) else {
            panic!("expected a metric");
        };
        assert_eq!(metric.current, 1);
        assert_eq!(metric.label, "Change from Previous 7 Days");
    }

    #[test]
    fn test_metric_empty_inputs() {
        let rows = vec![row("A", 7, 1, 1)];
        assert!(matches!(usage_metric(&rows, &[], None), MetricOutcome::Empty { .. }));
        assert!(matches!(usage_metric(&[], &[7], None), MetricOutcome::Empty { .. }));
    }
}
