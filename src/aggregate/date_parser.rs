use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::ingest::Value;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Parse a calendar date (optionally with a time of day).
/// Returns None for anything not in the accepted formats.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Only text cells carry dates; numbers and empties never parse.
pub fn parse_cell(v: &Value) -> Option<NaiveDateTime> {
    match v {
        Value::Text(s) => parse_datetime(s),
        _ => None,
    }
}

/// `YYYY-MM-DD` at midnight, full timestamp otherwise.
pub fn format_point(dt: &NaiveDateTime) -> String {
    if dt.time() == NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(parse_datetime("2003-02-24"), Some(ymd(2003, 2, 24)));
        assert_eq!(parse_datetime("2003/02/24"), Some(ymd(2003, 2, 24)));
        assert_eq!(parse_datetime("2/24/2003 0:00"), Some(ymd(2003, 2, 24)));
        assert_eq!(parse_datetime("24.02.2003"), Some(ymd(2003, 2, 24)));
        assert_eq!(
            parse_datetime("2003-02-24T13:05:00"),
            NaiveDate::from_ymd_opt(2003, 2, 24)
                .unwrap()
                .and_hms_opt(13, 5, 0)
        );
        assert_eq!(
            parse_datetime("2003-02-24T13:05:00+02:00"),
            NaiveDate::from_ymd_opt(2003, 2, 24)
                .unwrap()
                .and_hms_opt(13, 5, 0)
        );
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert_eq!(parse_datetime("not a date"), None);
        assert_eq!(parse_datetime("2003-13-40"), None);
        assert_eq!(parse_datetime(""), None);
        assert_eq!(parse_cell(&Value::Number(20030224.0)), None);
    }

    #[test]
    fn test_format_point() {
        assert_eq!(format_point(&ymd(2003, 2, 24)), "2003-02-24");
        let dt = NaiveDate::from_ymd_opt(2003, 2, 24)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(format_point(&dt), "2003-02-24 09:30:00");
    }
}
