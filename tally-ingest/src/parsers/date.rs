//! Date cells from bank exports.
//!
//! Accepted:
//!   2024-01-05   2024/01/05   01/05/2024   01/05/24   01-05-2024
//!   05 Jan 2024  Jan 05, 2024
//!   2024-01-05 13:45:00   2024-01-05T13:45:00   2024-01-05T13:45:00-05:00

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Month-first wins for ambiguous slash dates (US bank exports). Two-digit
/// years must be tried before `%Y`, which would read `24` as year 24.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y", "%d %b %Y", "%b %d, %Y",
    "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse a date cell; the time of day, if any, is dropped.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}
