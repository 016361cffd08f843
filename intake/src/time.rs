use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Civil zone every stored timestamp is rendered in.
pub const TIMESTAMP_ZONE: Tz = chrono_tz::Asia::Kolkata;

/// Month first, 12-hour clock, lowercase meridiem: `10/16/2026, 03:04:05 pm`.
/// Existing documents were written in this shape, keep it byte-for-byte.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %P";

pub trait TimeSource {
    // Return a display timestamp in TIMESTAMP_FORMAT
    fn current_time(&self) -> String;
}

#[derive(Clone)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn current_time(&self) -> String {
        format_timestamp(Utc::now())
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&TIMESTAMP_ZONE)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Reads back a timestamp produced by [`format_timestamp`].
pub fn parse_timestamp(value: &str) -> Option<DateTime<Tz>> {
    let naive = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()?;
    TIMESTAMP_ZONE.from_local_datetime(&naive).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn formats_afternoon_in_ist() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 34, 5).unwrap();
        assert_eq!(format_timestamp(at), "10/16/2026, 03:04:05 pm");
    }

    #[test]
    fn formats_midnight_as_twelve_am() {
        // 18:30 UTC is the start of the next day in Kolkata
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 18, 30, 0).unwrap();
        assert_eq!(format_timestamp(at), "01/02/2024, 12:00:00 am");
    }

    #[test]
    fn formats_noon_as_twelve_pm() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 6, 30, 59).unwrap();
        assert_eq!(format_timestamp(at), "03/09/2025, 12:00:59 pm");
    }

    #[test]
    fn parses_back_to_the_same_second() {
        let now = Utc::now();
        let rendered = SystemTime {}.current_time();
        let parsed = parse_timestamp(&rendered).expect("timestamp should parse");
        let local = now.with_timezone(&TIMESTAMP_ZONE);

        assert_eq!(parsed.day(), local.day());
        assert_eq!(parsed.month(), local.month());
        assert_eq!(parsed.year(), local.year());
        assert_eq!(parsed.hour(), local.hour());
        assert_eq!(parsed.minute(), local.minute());
        assert!((parsed.timestamp() - now.timestamp()).abs() <= 1);
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(parse_timestamp("2026-10-16T09:34:05Z").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
