//! UTC timestamp formatting shared by CSV output and backup files

use chrono::{DateTime, NaiveDateTime, Utc};

/// ISO-8601 with milliseconds, always UTC
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp as `2000-01-01T01:00:00.000Z`
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a timestamp produced by [`format_time`]
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT).map(|t| t.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_format_converts_to_utc() {
        let t = FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2006, 1, 2, 15, 4, 5)
            .unwrap();
        assert_eq!(format_time(&t.with_timezone(&Utc)), "2006-01-02T08:04:05.000Z");
    }

    #[test]
    fn test_parse_format() {
        let t = parse_time("2001-01-01T00:00:00.123Z").unwrap();
        assert_eq!(format_time(&t), "2001-01-01T00:00:00.123Z");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_time("foo").is_err());
        assert!(parse_time("2001-01-01").is_err());
    }
}
