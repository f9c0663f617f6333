//! Timestamp utilities

use chrono::{DateTime, Local, Utc};

/// Wire format for ballot edit timestamps (`castAt`)
pub const CAST_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Current local wall-clock time in the ballot edit format
pub fn cast_at_now() -> String {
    format_cast_at(&Local::now())
}

/// Format a timestamp in the ballot edit format
pub fn format_cast_at<Tz: chrono::TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(CAST_AT_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_millis_to_duration_one_minute() {
        let duration = millis_to_duration(60_000);
        assert_eq!(duration, Duration::from_secs(60));
    }

    #[test]
    fn test_millis_to_duration_zero() {
        assert_eq!(millis_to_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_format_cast_at_pads_fields() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format_cast_at(&at), "2024-03-05 07:08:09");
    }

    #[test]
    fn test_cast_at_now_has_expected_shape() {
        let stamp = cast_at_now();
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], " ");
    }
}
