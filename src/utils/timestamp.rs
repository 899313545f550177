// src/utils/timestamp.rs

//! Parsing, formatting and comparison of timestamps that arrive as text in
//! several shapes (RFC 3339, Postgres `timestamptz::TEXT`, naive date-times,
//! plain dates).

use std::cmp::Ordering;

use chrono::{
    DateTime, Local, NaiveDate, NaiveDateTime, Utc,
    format::{Item, StrftimeItems},
};

/// Formats with an explicit offset. `%#z` accepts `+00` as well as `+00:00`.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Formats without zone information; read as UTC.
const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

#[derive(Debug, Clone, Copy)]
pub enum TimestampFormat<'a> {
    /// RFC 3339.
    Iso,
    /// `20240131_142500`, for file names.
    Filename,
    /// `31.01.2024 14:25:00`
    Display,
    /// `31.01.2024`
    Date,
    /// strftime pattern. Invalid patterns fall back to RFC 3339.
    Custom(&'a str),
}

/// Parses a timestamp in any of the supported textual forms.
/// Naive values are taken as UTC. Returns `None` when nothing matches.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

pub fn format_timestamp<Tz>(dt: &DateTime<Tz>, format: TimestampFormat<'_>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match format {
        TimestampFormat::Iso => dt.to_rfc3339(),
        TimestampFormat::Filename => dt.format("%Y%m%d_%H%M%S").to_string(),
        TimestampFormat::Display => dt.format("%d.%m.%Y %H:%M:%S").to_string(),
        TimestampFormat::Date => dt.format("%d.%m.%Y").to_string(),
        TimestampFormat::Custom(fmt) => {
            let items: Vec<Item<'_>> = StrftimeItems::new(fmt).collect();
            if items.iter().any(|item| matches!(item, Item::Error)) {
                tracing::warn!("Invalid timestamp format {:?}, using ISO", fmt);
                dt.to_rfc3339()
            } else {
                dt.format_with_items(items.into_iter()).to_string()
            }
        }
    }
}

/// Current local time in the given format.
pub fn current_timestamp(format: TimestampFormat<'_>) -> String {
    format_timestamp(&Local::now(), format)
}

/// Compares two textual timestamps, treating differences within `tolerance_secs` as equal.
/// `None` when either side cannot be parsed.
pub fn compare_timestamps(a: &str, b: &str, tolerance_secs: f64) -> Option<Ordering> {
    let a = parse_timestamp(a)?;
    let b = parse_timestamp(b)?;

    let diff = (a - b).num_milliseconds() as f64 / 1000.0;
    if diff.abs() <= tolerance_secs {
        Some(Ordering::Equal)
    } else if diff > 0.0 {
        Some(Ordering::Greater)
    } else {
        Some(Ordering::Less)
    }
}

/// `Some(true)` when `a` is later than `b` by more than the tolerance.
pub fn is_timestamp_newer(a: &str, b: &str, tolerance_secs: f64) -> Option<bool> {
    compare_timestamps(a, b, tolerance_secs).map(|o| o == Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_rfc3339_variants() {
        assert_eq!(
            parse_timestamp("2024-01-01T12:00:00Z"),
            Some(utc(2024, 1, 1, 12, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-01-01T14:00:00+02:00"),
            Some(utc(2024, 1, 1, 12, 0, 0))
        );
    }

    #[test]
    fn test_parse_postgres_text() {
        assert_eq!(
            parse_timestamp("2024-01-01 12:00:00.123456+00"),
            Some(utc(2024, 1, 1, 12, 0, 0) + chrono::Duration::microseconds(123456))
        );
        assert_eq!(
            parse_timestamp("2024-01-01 12:00:00+00"),
            Some(utc(2024, 1, 1, 12, 0, 0))
        );
    }

    #[test]
    fn test_parse_naive_and_dates() {
        assert_eq!(
            parse_timestamp("2024-01-01 12:00:00"),
            Some(utc(2024, 1, 1, 12, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-01-01T12:00:00.5"),
            Some(utc(2024, 1, 1, 12, 0, 0) + chrono::Duration::milliseconds(500))
        );
        assert_eq!(parse_timestamp("31.01.2024"), Some(utc(2024, 1, 31, 0, 0, 0)));
        assert_eq!(parse_timestamp("31/01/2024"), Some(utc(2024, 1, 31, 0, 0, 0)));
        assert_eq!(parse_timestamp("2024-01-31"), Some(utc(2024, 1, 31, 0, 0, 0)));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_compare_with_tolerance() {
        let base = "2024-01-01T12:00:00Z";
        assert_eq!(
            compare_timestamps("2024-01-01T12:00:00.500Z", base, 1.0),
            Some(Ordering::Equal)
        );
        assert_eq!(
            compare_timestamps("2024-01-01T12:00:02Z", base, 1.0),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_timestamps("2024-01-01T11:59:58Z", base, 1.0),
            Some(Ordering::Less)
        );
        assert_eq!(compare_timestamps("nope", base, 1.0), None);
    }

    #[test]
    fn test_is_newer_mixed_representations() {
        assert_eq!(
            is_timestamp_newer("2024-01-01 12:00:02+00", "2024-01-01T12:00:00Z", 1.0),
            Some(true)
        );
        assert_eq!(
            is_timestamp_newer("2024-01-01 12:00:00.5+00", "2024-01-01T12:00:00Z", 1.0),
            Some(false)
        );
    }

    #[test]
    fn test_format() {
        let dt = utc(2024, 1, 31, 14, 25, 0);
        assert_eq!(format_timestamp(&dt, TimestampFormat::Filename), "20240131_142500");
        assert_eq!(format_timestamp(&dt, TimestampFormat::Display), "31.01.2024 14:25:00");
        assert_eq!(format_timestamp(&dt, TimestampFormat::Date), "31.01.2024");
        assert_eq!(format_timestamp(&dt, TimestampFormat::Custom("%Y")), "2024");
        assert_eq!(
            format_timestamp(&dt, TimestampFormat::Custom("%Y %Q")),
            "2024-01-31T14:25:00+00:00"
        );
        assert_eq!(
            parse_timestamp(&format_timestamp(&dt, TimestampFormat::Iso)),
            Some(dt)
        );
    }
}
