// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and calendar-day comparison.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 timestamp stored in Firestore.
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whether two timestamps fall on the same UTC calendar day.
pub fn is_same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.ordinal() == b.ordinal()
}

/// Whole calendar days (UTC) from `earlier` to `later`.
///
/// Compares dates, not 24h periods: 23:59 to 00:01 the next day is 1.
/// Negative when `later` is on an earlier date.
pub fn calendar_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    later.date_naive().num_days_from_ce() as i64 - earlier.date_naive().num_days_from_ce() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_rfc3339(s).unwrap()
    }

    #[test]
    fn same_day_ignores_time_of_day() {
        assert!(is_same_calendar_day(
            ts("2024-03-10T00:01:00Z"),
            ts("2024-03-10T23:59:00Z")
        ));
        assert!(!is_same_calendar_day(
            ts("2024-03-10T23:59:00Z"),
            ts("2024-03-11T00:01:00Z")
        ));
    }

    #[test]
    fn days_between_uses_calendar_dates() {
        assert_eq!(
            calendar_days_between(ts("2024-03-10T23:59:00Z"), ts("2024-03-11T00:01:00Z")),
            1
        );
        assert_eq!(
            calendar_days_between(ts("2024-03-10T08:00:00Z"), ts("2024-03-10T20:00:00Z")),
            0
        );
        assert_eq!(
            calendar_days_between(ts("2024-02-28T12:00:00Z"), ts("2024-03-01T12:00:00Z")),
            2
        );
    }

    #[test]
    fn format_round_trips() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let formatted = format_utc_rfc3339(date);
        assert_eq!(formatted, "2024-01-15T10:30:00Z");
        assert_eq!(parse_rfc3339(&formatted), Some(date));
    }
}
