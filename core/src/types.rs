//! Shared primitive types used across the whole system.

use crate::error::WsmsError;
use chrono::{Datelike, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type CustomerId = i64;
pub type GroupId    = i64;
pub type ReadingId  = i64;
pub type BillId     = i64;
pub type UserId     = i64;

/// Meter units as printed on the meter face.
pub type Units = u64;

/// Largest unit count SQLite's signed INTEGER column can hold.
pub const MAX_STORED_UNITS: Units = i64::MAX as Units;

/// A billing period. One period = one calendar month.
///
/// Rendered and stored as `YYYY-MM`. Parsing also accepts a full
/// `YYYY-MM-DD` date and keeps only its month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year:  i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, WsmsError> {
        if !(1..=12).contains(&month) {
            return Err(WsmsError::Validation(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = WsmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let full = if trimmed.len() == 7 {
            format!("{trimmed}-01")
        } else {
            trimmed.to_string()
        };
        let date = NaiveDate::parse_from_str(&full, "%Y-%m-%d").map_err(|e| {
            WsmsError::Validation(format!("invalid period '{s}': {e}"))
        })?;
        Ok(Self::from_date(date))
    }
}

impl TryFrom<String> for Period {
    type Error = WsmsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl ToSql for Period {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Period {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: WsmsError| FromSqlError::Other(e.to_string().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_month_and_full_date() {
        let a: Period = "2024-03".parse().unwrap();
        let b: Period = "2024-03-17".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "2024-03");
    }

    #[test]
    fn rejects_garbage() {
        assert!("March".parse::<Period>().is_err());
        assert!("2024-13".parse::<Period>().is_err());
        assert!(Period::new(2024, 0).is_err());
    }

    #[test]
    fn orders_chronologically_across_years() {
        let dec: Period = "2023-12".parse().unwrap();
        let jan: Period = "2024-01".parse().unwrap();
        assert!(dec < jan);
        assert_eq!(dec.next(), jan);
        assert_eq!(jan.previous(), dec);
    }

    #[test]
    fn serializes_as_plain_string() {
        let p = Period::new(2025, 7).unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"2025-07\"");
        let back: Period = serde_json::from_str("\"2025-07-01\"").unwrap();
        assert_eq!(back, p);
    }
}
