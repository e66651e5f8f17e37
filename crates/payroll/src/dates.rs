//! Calendar-day parsing for ledger rows.
//!
//! Clients send days as ISO `2024-01-31`, French `31/01/2024` or a full
//! RFC 3339 timestamp; the ledger stores a `NaiveDate` and every export
//! renders it back as ISO.

use chrono::{DateTime, NaiveDate};

use easypaies_core::{DomainError, DomainResult};

pub const EXPORT_FORMAT: &str = "%Y-%m-%d";

pub fn parse_day(raw: &str) -> DomainResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| DomainError::validation(format!("'{raw}' is not a valid date")))
}

pub fn format_day(day: NaiveDate) -> String {
    day.format(EXPORT_FORMAT).to_string()
}

pub fn ensure_ordered(start: NaiveDate, end: NaiveDate) -> DomainResult<()> {
    if end < start {
        return Err(DomainError::validation("end date must not precede start date"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_client_format() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(parse_day("2024-01-31").unwrap(), expected);
        assert_eq!(parse_day("31/01/2024").unwrap(), expected);
        assert_eq!(parse_day("2024-01-31T08:00:00Z").unwrap(), expected);
        assert!(parse_day("31-01-2024").is_err());
    }

    #[test]
    fn renders_iso() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(format_day(day), "2024-01-01");
    }
}
