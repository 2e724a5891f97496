//! Name Filter Module
//!
//! Narrows the product listing by display name:
//! - **Pattern filter**: case-insensitive regex search on the view name
//! - **Multi-version filter**: keeps views that exist in more than one
//!   `_V<n>` version
//!
//! A pattern that does not compile never fails the request. The rows pass
//! through unfiltered and the compile error is returned next to them so the
//! page can show it.

use dpusage_core::validation::MAX_FILTER_PATTERN_LEN;
use dpusage_core::UsageRow;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Maximum compiled regex size limit (bytes)
const MAX_REGEX_SIZE_LIMIT: usize = 10 * 1024; // 10KB

/// Rows left after filtering, plus the pattern error if there was one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOutcome {
    pub rows: Vec<UsageRow>,
    /// `Invalid Regex: ...` when the pattern was rejected
    pub error: Option<String>,
}

/// Compile a user pattern with the same safety limits used everywhere else
pub fn compile_pattern(pattern: &str) -> Result<Regex, String> {
    if pattern.len() > MAX_FILTER_PATTERN_LEN {
        return Err(format!(
            "pattern is {} characters, the limit is {}",
            pattern.len(),
            MAX_FILTER_PATTERN_LEN
        ));
    }

    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(MAX_REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| e.to_string())
}

/// Keep rows whose table name contains a match for `pattern`
///
/// An empty pattern keeps everything.
pub fn filter_by_name(rows: &[UsageRow], pattern: &str) -> FilterOutcome {
    if pattern.is_empty() {
        return FilterOutcome {
            rows: rows.to_vec(),
            error: None,
        };
    }

    match compile_pattern(pattern) {
        Ok(re) => {
            let kept: Vec<UsageRow> = rows
                .iter()
                .filter(|row| re.is_match(&row.entry.table_name))
                .cloned()
                .collect();
            debug!(pattern = %pattern, total = rows.len(), kept = kept.len(), "Applied name filter");
            FilterOutcome {
                rows: kept,
                error: None,
            }
        }
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Rejected name filter pattern");
            FilterOutcome {
                rows: rows.to_vec(),
                error: Some(format!("Invalid Regex: {}. Please correct the filter.", e)),
            }
        }
    }
}

/// Strip a trailing `_V<digits>` suffix (case-insensitive)
///
/// `SALES_V2` -> `SALES`, `SALES` -> `SALES`.
pub fn base_name(name: &str) -> &str {
    let without_digits = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() == name.len() {
        return name;
    }

    without_digits
        .strip_suffix("_V")
        .or_else(|| without_digits.strip_suffix("_v"))
        .unwrap_or(name)
}

/// Keep only rows whose base name is shared by at least two rows
///
/// Row order is preserved.
pub fn multi_version_only(rows: Vec<UsageRow>) -> Vec<UsageRow> {
    let mut members: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        *members
            .entry(base_name(&row.entry.table_name).to_string())
            .or_default() += 1;
    }

    rows.into_iter()
        .filter(|row| {
            members
                .get(base_name(&row.entry.table_name))
                .is_some_and(|&count| count > 1)
        })
        .collect()
}
