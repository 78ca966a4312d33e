// src/utils/date.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Accepted layouts for dates without an offset; all are read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses the date strings the dashboards send (RFC 3339 from `Date.toJSON()`,
/// `datetime-local` inputs, plain dates). Returns `None` when nothing matches.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical wire form for scheduled dates.
pub fn to_canonical(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses and rewrites a scheduled date into canonical form.
pub fn normalize_scheduled_date(raw: &str) -> Option<String> {
    parse_datetime(raw).map(|dt| to_canonical(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_with_offset_is_converted_to_utc() {
        assert_eq!(
            normalize_scheduled_date("2024-11-05T10:30:00+05:30").as_deref(),
            Some("2024-11-05T05:00:00.000Z")
        );
    }

    #[test]
    fn javascript_date_json_is_accepted() {
        assert_eq!(
            normalize_scheduled_date("2024-11-05T10:30:00.123Z").as_deref(),
            Some("2024-11-05T10:30:00.123Z")
        );
    }

    #[test]
    fn naive_layouts_are_read_as_utc() {
        assert_eq!(
            normalize_scheduled_date("2024-11-05T09:15").as_deref(),
            Some("2024-11-05T09:15:00.000Z")
        );
        assert_eq!(
            normalize_scheduled_date("2024-11-05 09:15:30").as_deref(),
            Some("2024-11-05T09:15:30.000Z")
        );
        assert_eq!(
            normalize_scheduled_date(" 2024-11-05 ").as_deref(),
            Some("2024-11-05T00:00:00.000Z")
        );
    }

    #[test]
    fn unparseable_dates_yield_none() {
        assert_eq!(normalize_scheduled_date(""), None);
        assert_eq!(normalize_scheduled_date("next tuesday"), None);
        assert_eq!(normalize_scheduled_date("2024-13-45"), None);
    }
}
