// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_drops_subseconds() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(format_utc_rfc3339(date), "2024-03-01T08:30:00Z");
    }

    #[test]
    fn test_offset_timestamp_formats_in_utc() {
        let parsed = chrono::DateTime::parse_from_rfc3339("2024-03-01T10:30:00+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_utc_rfc3339(parsed), "2024-03-01T08:30:00Z");
    }
}
