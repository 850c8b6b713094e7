//! Human duration strings ↔ integer seconds.
//!
//! Accepted units: `s`, `m`, `h`, `d`, `w`. Bare digits are seconds. Zero
//! is rejected — a zero-length window can never accumulate samples.

use crate::error::{DslError, DslResult};

const MINUTE: u64 = 60;
const HOUR: u64 = 3600;
const DAY: u64 = 86_400;
const WEEK: u64 = 604_800;

/// Parse a duration string like `"30s"`, `"15m"`, `"1h"`, `"2d"`, `"1w"`
/// into seconds.
pub fn parse_duration(input: &str) -> DslResult<u64> {
    let s = input.trim();

    let secs = if let Some(n) = s.strip_suffix('s') {
        n.parse::<u64>().ok()
    } else if let Some(n) = s.strip_suffix('m') {
        n.parse::<u64>().ok().map(|m| m * MINUTE)
    } else if let Some(n) = s.strip_suffix('h') {
        n.parse::<u64>().ok().map(|h| h * HOUR)
    } else if let Some(n) = s.strip_suffix('d') {
        n.parse::<u64>().ok().map(|d| d * DAY)
    } else if let Some(n) = s.strip_suffix('w') {
        n.parse::<u64>().ok().map(|w| w * WEEK)
    } else {
        s.parse::<u64>().ok()
    };

    match secs {
        Some(secs) if secs > 0 => Ok(secs),
        _ => Err(DslError::InvalidDuration {
            input: input.to_string(),
        }),
    }
}

/// Render seconds as the largest evenly dividing unit: `3600` → `"1h"`,
/// `5400` → `"90m"`, `90` → `"90s"`.
pub fn format_duration(secs: u64) -> String {
    for (unit, suffix) in [(WEEK, 'w'), (DAY, 'd'), (HOUR, 'h'), (MINUTE, 'm')] {
        if secs >= unit && secs % unit == 0 {
            return format!("{}{}", secs / unit, suffix);
        }
    }
    format!("{secs}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_unit() {
        assert_eq!(parse_duration("30s"), Ok(30));
        assert_eq!(parse_duration("15m"), Ok(900));
        assert_eq!(parse_duration("1h"), Ok(3600));
        assert_eq!(parse_duration("12h"), Ok(43_200));
        assert_eq!(parse_duration("2d"), Ok(172_800));
        assert_eq!(parse_duration("1w"), Ok(604_800));
    }

    #[test]
    fn plain_digits_are_seconds() {
        assert_eq!(parse_duration("45"), Ok(45));
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(parse_duration(" 5m "), Ok(300));
    }

    #[test]
    fn rejects_garbage_and_zero() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("1x").is_err());
        assert!(parse_duration("one minute").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("0").is_err());
    }

    #[test]
    fn round_trips_through_the_label() {
        for label in ["30s", "90s", "15m", "90m", "1h", "12h", "2d", "1w"] {
            let secs = parse_duration(label).unwrap();
            assert_eq!(format_duration(secs), label);
            assert_eq!(parse_duration(&format_duration(secs)), Ok(secs));
        }
        // One hour normalizes however it was spelled.
        assert_eq!(format_duration(parse_duration("3600s").unwrap()), "1h");
        assert_eq!(format_duration(parse_duration("60m").unwrap()), "1h");
    }
}
