use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Cell, MAX_COUNT, REDACTED};

/// Missing value tokens
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "na", "n/a", "NULL", "null", "NaN", "nan", ".", "-", "--", "missing",
    "MISSING", "None", "none", "#N/A", "#VALUE!", "#REF!", "#DIV/0!", "#NUM!", "#NAME?", "#NULL!",
];

// Period (date) patterns. Slash and dash dates are day-first, as written by the extract tooling.
static DATE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // ISO format: 2020-11-16
        (Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap(), "%Y-%m-%d"),
        // Day first: 16/11/2020 or 6/1/2021
        (Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").unwrap(), "%d/%m/%Y"),
        // Day first with dashes: 16-11-2020
        (Regex::new(r"^\d{1,2}-\d{1,2}-\d{4}$").unwrap(), "%d-%m-%Y"),
        // ISO with dots: 2020.11.16
        (Regex::new(r"^\d{4}\.\d{2}\.\d{2}$").unwrap(), "%Y.%m.%d"),
        // ISO with slashes: 2020/11/16
        (Regex::new(r"^\d{4}/\d{2}/\d{2}$").unwrap(), "%Y/%m/%d"),
    ]
});

// Datetime patterns; the time part is dropped when used as a period
static DATETIME_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // 2020-11-16T00:00:00 or 2020-11-16 00:00:00
        (
            Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}$").unwrap(),
            "%Y-%m-%dT%H:%M:%S",
        ),
        (
            Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap(),
            "%Y-%m-%d %H:%M:%S",
        ),
        // With milliseconds: 2020-11-16T00:00:00.000
        (
            Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+$").unwrap(),
            "%Y-%m-%dT%H:%M:%S%.f",
        ),
    ]
});

/// Check if a value represents a missing value
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    MISSING_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
}

/// Parse a numeric value
pub fn parse_numeric(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// Round a non-negative number up to a whole count.
/// `None` when it is not finite, negative, or above [`MAX_COUNT`].
pub fn whole_count(num: f64) -> Option<u64> {
    if !num.is_finite() || num < 0.0 {
        return None;
    }
    let whole = num.ceil();
    if whole > MAX_COUNT as f64 {
        return None;
    }
    Some(whole as u64)
}

/// Parse a counts field.
///
/// Returns `None` for malformed input (text, non-finite or oversized numbers); callers
/// degrade those to [`Cell::Missing`]. Negative numbers fall below any
/// threshold and come back redacted. Fractional counts are rounded up, which
/// gives the same result under the threshold test and round-up.
pub fn parse_count(value: &str) -> Option<Cell> {
    let trimmed = value.trim();
    if trimmed == REDACTED {
        return Some(Cell::Redacted);
    }
    if is_missing(trimmed) {
        return Some(Cell::Missing);
    }

    let num = parse_numeric(trimmed)?;
    if !num.is_finite() {
        return None;
    }
    if num < 0.0 {
        return Some(Cell::Redacted);
    }
    whole_count(num).map(Cell::Count)
}

/// Parse a period key
pub fn parse_period(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for (pattern, format) in DATE_PATTERNS.iter() {
        if pattern.is_match(trimmed) {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Some(date);
            }
        }
    }

    for (pattern, format) in DATETIME_PATTERNS.iter() {
        if pattern.is_match(trimmed) {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Some(datetime.date());
            }
        }
    }
    None
}
