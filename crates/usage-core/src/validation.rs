//! Input validation for dpusage
//!
//! Provides validation functions for:
//! - Time windows requested by the dashboard
//! - Catalog identifiers and fully qualified object names
//! - Session identifiers handed out to browsers
//!
//! Object and schema names always reach the warehouse as bound parameters;
//! only validated window sizes are rendered into SQL text.

use crate::config::MAX_WINDOW_DAYS;
use crate::{Result, UsageError};

/// Maximum length for a single identifier part (database, schema, view)
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Maximum length for `database.schema.table`
pub const MAX_OBJECT_NAME_LEN: usize = 3 * MAX_IDENTIFIER_LEN + 2;

/// Maximum length for a session identifier
pub const MAX_SESSION_ID_LEN: usize = 64;

/// Maximum number of distinct windows in one request
pub const MAX_WINDOWS: usize = 16;

/// Maximum length for a name filter pattern
pub const MAX_FILTER_PATTERN_LEN: usize = 1000;

/// Validate and normalize requested time windows
///
/// Requirements:
/// - Every window is between 1 and `MAX_WINDOW_DAYS` days
/// - At most `MAX_WINDOWS` distinct windows
///
/// Duplicates are dropped, keeping the first occurrence so column order
/// follows the request.
pub fn validate_windows(windows: &[u32]) -> Result<Vec<u32>> {
    let mut normalized = Vec::with_capacity(windows.len());

    for &days in windows {
        if days == 0 {
            return Err(UsageError::InvalidWindow(
                "Time window must be at least 1 day".to_string(),
            ));
        }

        if days > MAX_WINDOW_DAYS {
            return Err(UsageError::InvalidWindow(format!(
                "Time window too large: {} > {} days",
                days, MAX_WINDOW_DAYS
            )));
        }

        if !normalized.contains(&days) {
            normalized.push(days);
        }
    }

    if normalized.len() > MAX_WINDOWS {
        return Err(UsageError::InvalidWindow(format!(
            "Too many time windows: {} > {}",
            normalized.len(),
            MAX_WINDOWS
        )));
    }

    Ok(normalized)
}

/// Parse a comma separated window list such as `"7,30"`
///
/// An empty string yields no windows.
pub fn parse_windows(raw: &str) -> Result<Vec<u32>> {
    let mut windows = Vec::new();

    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let days = part
            .parse::<u32>()
            .map_err(|_| UsageError::InvalidWindow(format!("'{}' is not a day count", part)))?;
        windows.push(days);
    }

    validate_windows(&windows)
}

/// Validate one part of a qualified name
///
/// Requirements:
/// - Not empty
/// - <= 255 characters
/// - Alphanumeric, underscore, hyphen, dollar only
pub fn validate_identifier_part(part: &str) -> Result<()> {
    if part.is_empty() {
        return Err(UsageError::InvalidObjectName(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if part.len() > MAX_IDENTIFIER_LEN {
        return Err(UsageError::InvalidObjectName(format!(
            "Identifier too long: {} > {} characters",
            part.len(),
            MAX_IDENTIFIER_LEN
        )));
    }

    if !part
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '$')
    {
        return Err(UsageError::InvalidObjectName(format!(
            "Identifier '{}' contains invalid characters (allowed: alphanumeric, _, -, $)",
            part
        )));
    }

    Ok(())
}

/// Validate a fully qualified object name (`database.schema.table`)
pub fn validate_object_name(name: &str) -> Result<()> {
    if name.len() > MAX_OBJECT_NAME_LEN {
        return Err(UsageError::InvalidObjectName(format!(
            "Object name too long: {} > {} characters",
            name.len(),
            MAX_OBJECT_NAME_LEN
        )));
    }

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() != 3 {
        return Err(UsageError::InvalidObjectName(format!(
            "'{}' is not of the form database.schema.table",
            name
        )));
    }

    for part in parts {
        validate_identifier_part(part)?;
    }

    Ok(())
}

/// Validate a session identifier
///
/// Requirements:
/// - Not empty
/// - <= 64 characters
/// - ASCII alphanumeric and hyphen only
pub fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(UsageError::ValidationError(
            "Session id cannot be empty".to_string(),
        ));
    }

    if id.len() > MAX_SESSION_ID_LEN {
        return Err(UsageError::ValidationError(format!(
            "Session id too long: {} > {} characters",
            id.len(),
            MAX_SESSION_ID_LEN
        )));
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(UsageError::ValidationError(
            "Session id contains invalid characters (allowed: alphanumeric, -)".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_windows_dedupes_in_order() {
        assert_eq!(validate_windows(&[30, 7, 30]).unwrap(), vec![30, 7]);
        assert_eq!(validate_windows(&[]).unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn test_validate_windows_bounds() {
        assert!(validate_windows(&[0]).is_err());
        assert!(validate_windows(&[MAX_WINDOW_DAYS]).is_ok());
        assert!(validate_windows(&[MAX_WINDOW_DAYS + 1]).is_err());
        assert!(validate_windows(&[7, 0]).is_err());
    }

    #[test]
    fn test_validate_windows_count_limit() {
        let at_limit: Vec<u32> = (1..=MAX_WINDOWS as u32).collect();
        assert_eq!(validate_windows(&at_limit).unwrap().len(), MAX_WINDOWS);

        let over: Vec<u32> = (1..=1200).collect();
        assert!(matches!(
            validate_windows(&over),
            Err(UsageError::InvalidWindow(_))
        ));

        // Duplicates do not count towards the limit
        let repeated = vec![7; MAX_WINDOWS * 4];
        assert_eq!(validate_windows(&repeated).unwrap(), vec![7]);
    }

    #[test]
    fn test_parse_windows() {
        assert_eq!(parse_windows("7,30").unwrap(), vec![7, 30]);
        assert_eq!(parse_windows(" 90 ").unwrap(), vec![90]);
        assert_eq!(parse_windows("").unwrap(), Vec::<u32>::new());
        assert!(parse_windows("7,abc").is_err());
        assert!(parse_windows("-7").is_err());
    }

    #[test]
    fn test_valid_object_names() {
        assert!(validate_object_name("DATAPRODUKTER.INTERNE.SALES_V1").is_ok());
        assert!(validate_object_name("db.schema.view-2").is_ok());
    }

    #[test]
    fn test_invalid_object_names() {
        assert!(validate_object_name("").is_err()); // Empty
        assert!(validate_object_name("SALES_V1").is_err()); // Unqualified
        assert!(validate_object_name("a.b").is_err()); // Two parts
        assert!(validate_object_name("a.b.c.d").is_err()); // Four parts
        assert!(validate_object_name("a..c").is_err()); // Empty part
        assert!(validate_object_name("a.b.c'; DROP TABLE x;--").is_err()); // Quote
        assert!(validate_object_name("a.b.my view").is_err()); // Space
    }

    #[test]
    fn test_validate_identifier_part() {
        assert!(validate_identifier_part("INTERNE").is_ok());
        assert!(validate_identifier_part(&"a".repeat(256)).is_err());
        assert!(validate_identifier_part("a.b").is_err());
    }

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("6f1c2d0e-8a7b-4c3d-9e2f-1a2b3c4d5e6f").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id(&"a".repeat(65)).is_err());
        assert!(validate_session_id("abc def").is_err());
    }
}
