//! Utility functions and helpers for binexport
//!
//! This module provides common utility functions used throughout the application:
//! - Duration parsing and formatting (`500ms`, `30s`, `15m`, `6h`, `1d`, `2w`)
//! - ISO-8601 timestamp rendering
//! - File system helpers (safe file names, output directory checks)

/// Time and duration utilities
pub mod time {
    use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

    /// Parse a human duration such as `90s`, `15m`, `6h` or `1d`.
    ///
    /// Compound values (`1h30m`) are accepted. A bare number is read as seconds.
    ///
    /// # Arguments
    /// * `input` - Duration text
    ///
    /// # Returns
    /// * `Option<TimeDelta>` - Parsed duration, or None if the text is invalid
    pub fn parse_duration(input: &str) -> Option<TimeDelta> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(secs) = s.parse::<i64>() {
            return TimeDelta::try_seconds(secs);
        }

        let mut total = TimeDelta::zero();
        let mut rest = s;
        while !rest.is_empty() {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return None;
            }
            let value: i64 = rest[..digits].parse().ok()?;
            rest = &rest[digits..];

            let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
            let unit = &rest[..unit_len];
            rest = &rest[unit_len..];

            let part = match unit {
                "ms" => TimeDelta::try_milliseconds(value)?,
                "s" => TimeDelta::try_seconds(value)?,
                "m" => TimeDelta::try_minutes(value)?,
                "h" => TimeDelta::try_hours(value)?,
                "d" => TimeDelta::try_days(value)?,
                "w" => TimeDelta::try_weeks(value)?,
                _ => return None,
            };
            total = total.checked_add(&part)?;
        }

        Some(total)
    }

    /// Format a duration using the largest exact units, e.g. `1d6h`, `45m`, `1500ms`.
    pub fn format_duration(delta: TimeDelta) -> String {
        let mut ms = delta.num_milliseconds();
        if ms == 0 {
            return "0s".to_string();
        }

        let mut out = String::new();
        if ms < 0 {
            out.push('-');
            ms = -ms;
        }

        if ms % 1000 != 0 {
            out.push_str(&format!("{ms}ms"));
            return out;
        }

        let mut secs = ms / 1000;
        for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
            if secs >= size {
                out.push_str(&format!("{}{}", secs / size, unit));
                secs %= size;
            }
        }
        out
    }

    /// Render a UTC timestamp as RFC 3339 with millisecond precision.
    pub fn to_iso8601(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Parse an RFC 3339 timestamp into UTC.
    pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(input.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// File system utilities
pub mod fs {
    use std::path::Path;

    use crate::error::{ConfigError, Result};

    /// Character substituted for anything unsafe in a file name.
    pub const SUBSTITUTE: char = '_';

    /// Make a string safe to use as one path component.
    ///
    /// Keeps ASCII alphanumerics, `-`, `_` and `.`; every other character is
    /// replaced by [`SUBSTITUTE`].
    pub fn sanitize_file_component(value: &str) -> String {
        let out: String = value
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                    ch
                } else {
                    SUBSTITUTE
                }
            })
            .collect();

        if out.is_empty() {
            SUBSTITUTE.to_string()
        } else {
            out
        }
    }

    /// Create the output directory if needed and check that it is writable.
    pub fn ensure_writable_dir(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| {
            ConfigError::OutputDirectory(format!("{}: {}", path.display(), e))
        })?;

        let probe = path.join(format!(".binexport-probe-{}", std::process::id()));
        std::fs::write(&probe, b"")
            .and_then(|_| std::fs::remove_file(&probe))
            .map_err(|e| ConfigError::OutputDirectory(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::fs::*;
    use super::time::*;
    use chrono::{TimeDelta, TimeZone, Utc};

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(TimeDelta::milliseconds(500)));
        assert_eq!(parse_duration("30s"), Some(TimeDelta::seconds(30)));
        assert_eq!(parse_duration("15m"), Some(TimeDelta::minutes(15)));
        assert_eq!(parse_duration("6h"), Some(TimeDelta::hours(6)));
        assert_eq!(parse_duration("1d"), Some(TimeDelta::days(1)));
        assert_eq!(parse_duration("2w"), Some(TimeDelta::weeks(2)));
        assert_eq!(parse_duration("120"), Some(TimeDelta::seconds(120)));
    }

    #[test]
    fn test_parse_duration_compound() {
        assert_eq!(parse_duration("1h30m"), Some(TimeDelta::minutes(90)));
        assert_eq!(parse_duration(" 1d12h "), Some(TimeDelta::hours(36)));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("10y"), None);
        assert_eq!(parse_duration("1.5h"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::hours(30)), "1d6h");
        assert_eq!(format_duration(TimeDelta::minutes(45)), "45m");
        assert_eq!(format_duration(TimeDelta::milliseconds(1500)), "1500ms");
        assert_eq!(format_duration(TimeDelta::zero()), "0s");
    }

    #[test]
    fn test_iso8601_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(to_iso8601(&ts), "2024-03-01T12:30:00.000Z");
        assert_eq!(parse_timestamp("2024-03-01T14:30:00+02:00"), Some(ts));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(
            sanitize_file_component("2024-03-01T12:30:00.000Z"),
            "2024-03-01T12_30_00.000Z"
        );
        assert_eq!(sanitize_file_component("app/logs events"), "app_logs_events");
        assert_eq!(sanitize_file_component(""), "_");
    }

    #[test]
    fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_writable_dir(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }
}
