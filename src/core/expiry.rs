//! Expiry parsing: RFC3339 timestamps, or a `<number><unit>` duration
//! grammar, optionally combined as a sum (spec.md 4.3).

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, ValidationError};

/// Parse an expiry string into an absolute UTC timestamp. Tries RFC3339
/// first, then the duration grammar. Storage form is always absolute
/// RFC3339 UTC (callers add this to "now").
pub fn parse_expiry(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if input.trim().is_empty() {
        return Err(ValidationError::InvalidExpiry(input.to_string()).into());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let duration =
        parse_duration(input).ok_or_else(|| ValidationError::InvalidExpiry(input.to_string()))?;
    Ok(now + duration)
}

/// Parse a duration string like `24h`, `90m`, or `1h30m` into a
/// [`chrono::Duration`]. Recognized units: `ns, us, µs, ms, s, m, h`.
fn parse_duration(input: &str) -> Option<Duration> {
    let mut total = Duration::zero();
    let mut any = false;
    let mut rest = input.trim();

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return None;
        }
        let (num_str, after_num) = rest.split_at(digits_end);
        let number: f64 = num_str.parse().ok()?;

        let unit_end = after_num
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(after_num.len());
        let (unit, remainder) = after_num.split_at(unit_end);
        if unit.is_empty() {
            return None;
        }

        let nanos_per_unit: f64 = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" => 1_000_000_000.0,
            "m" => 60_000_000_000.0,
            "h" => 3_600_000_000_000.0,
            _ => return None,
        };

        let nanos = (number * nanos_per_unit) as i64;
        total = total + Duration::nanoseconds(nanos);
        any = true;
        rest = remainder;
    }

    if any {
        Some(total)
    } else {
        None
    }
}
