// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interpretation of the `timestamp` attribute.
//!
//! Dialects disagree about the zone of the timestamp: Ant writes UTC while the JUnit 5 console
//! launcher writes local time, and neither carries a zone designator. Timestamps that do carry one
//! (RFC 3339) are always taken at face value.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

/// How timestamps without an explicit zone are interpreted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimestampZone {
    /// Interpret as the host's local time.
    Local,

    /// Interpret as UTC.
    Utc,
}

impl TimestampZone {
    /// Returns the zone used when no explicit choice was made, based on the suite name.
    pub fn for_suite(suite_name: &str) -> Self {
        if crate::outcome::JUNIT_PLATFORM_SUITE_NAMES.contains(&suite_name) {
            TimestampZone::Local
        } else {
            TimestampZone::Utc
        }
    }

    /// Converts a boolean "is local time" flag into a zone.
    pub fn from_is_local_time(is_local_time: bool) -> Self {
        if is_local_time {
            TimestampZone::Local
        } else {
            TimestampZone::Utc
        }
    }
}

static NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a timestamp attribute value.
///
/// Returns `None` if the value is not in any known format, or if it names a local time that does
/// not exist (for example, one skipped over by a daylight saving transition).
pub fn parse_timestamp(input: &str, zone: TimestampZone) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(input) {
        return Some(timestamp);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())?;

    match zone {
        TimestampZone::Utc => Some(Utc.from_utc_datetime(&naive).fixed_offset()),
        TimestampZone::Local => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.fixed_offset()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn naive_as_utc() {
        let parsed = parse_timestamp("2024-01-15T10:30:00", TimestampZone::Utc).unwrap();
        let expected = DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.offset().local_minus_utc(), 0);
    }

    #[test]
    fn naive_as_local() {
        let parsed = parse_timestamp("2024-01-15T10:30:00", TimestampZone::Local).unwrap();
        let naive =
            NaiveDateTime::parse_from_str("2024-01-15T10:30:00", "%Y-%m-%dT%H:%M:%S").unwrap();
        let expected = Local.from_local_datetime(&naive).earliest().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.naive_local(), naive);
    }

    #[test_case("2024-01-15T10:30:00.123", 123_000_000 ; "fractional")]
    #[test_case("2024-01-15 10:30:00", 0 ; "space separated")]
    #[test_case("  2024-01-15T10:30:00\n", 0 ; "surrounding whitespace")]
    fn naive_variants(input: &str, nanos: u32) {
        let parsed = parse_timestamp(input, TimestampZone::Utc).unwrap();
        assert_eq!(parsed.timestamp(), 1_705_314_600);
        assert_eq!(parsed.timestamp_subsec_nanos(), nanos);
    }

    #[test]
    fn explicit_zone_wins() {
        let parsed = parse_timestamp("2024-01-15T10:30:00+02:00", TimestampZone::Utc).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 2 * 3600);
        let parsed = parse_timestamp("2024-01-15T10:30:00Z", TimestampZone::Local).unwrap();
        assert_eq!(parsed.timestamp(), 1_705_314_600);
    }

    #[test_case("" ; "empty")]
    #[test_case("yesterday" ; "words")]
    #[test_case("2024-13-45T10:30:00" ; "out of range")]
    fn malformed(input: &str) {
        assert_eq!(parse_timestamp(input, TimestampZone::Utc), None);
    }

    #[test]
    fn zone_for_suite() {
        assert_eq!(TimestampZone::for_suite("JUnit Jupiter"), TimestampZone::Local);
        assert_eq!(TimestampZone::for_suite("JUnit Vintage"), TimestampZone::Local);
        assert_eq!(
            TimestampZone::for_suite("myorg.mytest.JUnit4Tests"),
            TimestampZone::Utc
        );
    }
}
