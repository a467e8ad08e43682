use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::core::error::ValidationError;

lazy_static! {
    /// Calendar month in `YYYY-MM` form
    /// - Valid: "2024-01", "1999-12"
    /// - Invalid: "2024-1", "2024-13", "24-01", "2024/01"
    pub static ref MONTH_REGEX: Regex = Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").unwrap();

    /// Calendar date in `YYYY-MM-DD` form (range checked separately)
    pub static ref DATE_REGEX: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();

    /// Bare file extension filter, without the leading dot
    pub static ref EXTENSION_REGEX: Regex = Regex::new(r"^[a-z0-9]{1,10}$").unwrap();
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    if !DATE_REGEX.is_match(value) {
        return Err(ValidationError::InvalidDate(value.to_string()));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

/// Parse a `YYYY-MM` month into its first day
pub fn parse_month(value: &str) -> Result<NaiveDate, ValidationError> {
    if !MONTH_REGEX.is_match(value) {
        return Err(ValidationError::InvalidMonth(value.to_string()));
    }
    NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidMonth(value.to_string()))
}

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Half-open UTC interval `[first of month, first of next month)`
pub fn month_bounds(first_day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = first_day
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    (start_of_day(first_day), start_of_day(next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_regex() {
        assert!(MONTH_REGEX.is_match("2024-01"));
        assert!(MONTH_REGEX.is_match("1999-12"));
        assert!(!MONTH_REGEX.is_match("2024-1"));
        assert!(!MONTH_REGEX.is_match("2024-13"));
        assert!(!MONTH_REGEX.is_match("2024-00"));
        assert!(!MONTH_REGEX.is_match("2024/01"));
    }

    #[test]
    fn test_parse_date_rejects_impossible_days() {
        assert!(parse_date("2024-02-29").is_ok());
        assert_eq!(
            parse_date("2023-02-29"),
            Err(ValidationError::InvalidDate("2023-02-29".to_string()))
        );
        assert!(parse_date("29-02-2024").is_err());
    }

    #[test]
    fn test_month_bounds_roll_over_year() {
        let first = parse_month("2024-12").unwrap();
        let (start, end) = month_bounds(first);
        assert_eq!(start.to_rfc3339(), "2024-12-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_extension_regex() {
        assert!(EXTENSION_REGEX.is_match("jpg"));
        assert!(EXTENSION_REGEX.is_match("mp4"));
        assert!(!EXTENSION_REGEX.is_match(".jpg"));
        assert!(!EXTENSION_REGEX.is_match("JPG"));
    }
}
