//! `YYYY-MM` time buckets.

use chrono::{Datelike, Months, NaiveDate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BucketError {
    #[error("time bucket `{0}` is not in YYYY-MM form")]
    Format(String),
    #[error("time bucket `{0}` overflows the calendar")]
    Overflow(String),
}

/// Parse a `YYYY-MM` label into the first day of that month.
pub fn parse_bucket(label: &str) -> Result<NaiveDate, BucketError> {
    let label = label.trim();
    let bytes = label.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return Err(BucketError::Format(label.to_string()));
    }
    NaiveDate::parse_from_str(&format!("{label}-01"), "%Y-%m-%d")
        .map_err(|_| BucketError::Format(label.to_string()))
}

/// Move a bucket label `months` months forward, rolling over year boundaries.
pub fn add_months(label: &str, months: u32) -> Result<String, BucketError> {
    let start = parse_bucket(label)?;
    let next = start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| BucketError::Overflow(label.to_string()))?;
    Ok(format!("{:04}-{:02}", next.year(), next.month()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn december_rolls_into_january() {
        assert_eq!(add_months("2023-12", 1).unwrap(), "2024-01");
        assert_eq!(add_months("2023-11", 3).unwrap(), "2024-02");
        assert_eq!(add_months("2023-01", 0).unwrap(), "2023-01");
    }

    #[test]
    fn rejects_non_month_labels() {
        assert!(parse_bucket("2023-1").is_err());
        assert!(parse_bucket("2023/01").is_err());
        assert!(parse_bucket("2023-13").is_err());
        assert!(parse_bucket("2023-01-05").is_err());
        assert!(parse_bucket("2023-01").is_ok());
    }
}
