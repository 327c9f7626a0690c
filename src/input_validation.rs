//! Parsing of user-typed inputs
//!
//! The presentation layer hands over raw text; these helpers turn it into
//! typed values or reject it before any state changes.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::error::IntervalError;

/// Parse a backup interval given in minutes.
///
/// Accepts surrounding whitespace. Zero, negative and non-numeric input are
/// all `InvalidInterval`.
pub fn parse_interval_minutes(input: &str) -> Result<u64, IntervalError> {
    let value: i64 = input
        .trim()
        .parse()
        .map_err(|_| IntervalError::InvalidInterval)?;
    validate_interval_minutes(value)
}

/// One year. Keeps minutes * 60 well inside u64.
pub const MAX_INTERVAL_MINUTES: u64 = 60 * 24 * 365;

pub fn validate_interval_minutes(minutes: i64) -> Result<u64, IntervalError> {
    if minutes <= 0 || minutes as u64 > MAX_INTERVAL_MINUTES {
        return Err(IntervalError::InvalidInterval);
    }
    Ok(minutes as u64)
}

/// Validate a path argument typed by the user and convert it.
pub fn parse_path_argument(path: &str) -> Result<PathBuf> {
    let trimmed = path.trim();

    if trimmed.is_empty() {
        bail!("Path cannot be empty");
    }

    if trimmed.len() > 4096 {
        bail!("Path too long: {} bytes (max: 4096)", trimmed.len());
    }

    if trimmed.contains('\0') || trimmed.contains('\n') || trimmed.contains('\r') {
        bail!("Path contains control characters");
    }

    Ok(PathBuf::from(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval_valid() {
        assert_eq!(parse_interval_minutes("10"), Ok(10));
        assert_eq!(parse_interval_minutes(" 5 \n"), Ok(5));
    }

    #[test]
    fn test_parse_interval_rejects_non_positive() {
        assert_eq!(parse_interval_minutes("0"), Err(IntervalError::InvalidInterval));
        assert_eq!(parse_interval_minutes("-5"), Err(IntervalError::InvalidInterval));
    }

    #[test]
    fn test_parse_interval_rejects_garbage() {
        assert!(parse_interval_minutes("ten").is_err());
        assert!(parse_interval_minutes("").is_err());
        assert!(parse_interval_minutes("1.5").is_err());
    }

    #[test]
    fn test_validate_interval_upper_bound() {
        assert!(validate_interval_minutes(60 * 24 * 365).is_ok());
        assert!(validate_interval_minutes(60 * 24 * 365 + 1).is_err());
    }

    #[test]
    fn test_parse_path_argument() {
        assert_eq!(
            parse_path_argument("  /Users/test/Documents ").unwrap(),
            PathBuf::from("/Users/test/Documents")
        );
        assert!(parse_path_argument("").is_err());
        assert!(parse_path_argument("/path\0with\0null").is_err());
        assert!(parse_path_argument(&"/".repeat(5000)).is_err());
    }
}
