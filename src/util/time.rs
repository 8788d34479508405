//! Backup date stamps and `modified since` parsing.

use crate::error::{Result, XportError};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Format used in archive names (`XRAY-2025-03-14.zip`).
pub const STAMP_FORMAT: &str = "%Y-%m-%d";

/// Today's local date as an archive stamp.
#[must_use]
pub fn today_stamp() -> String {
    Local::now().format(STAMP_FORMAT).to_string()
}

/// Parse a `modified since` value into a UTC instant.
///
/// Supports:
/// - RFC3339: `2025-01-15T12:00:00Z`
/// - Simple date: `2025-01-15` (local midnight)
/// - Relative look-back: `7d`, `12h`, `2w`, `30m` (that long before `now`)
///
/// # Errors
///
/// Returns a validation error if the value matches none of the forms or the
/// local time is ambiguous.
pub fn parse_modified_since(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, STAMP_FORMAT) {
        let naive_dt = date.and_time(NaiveTime::MIN);
        let local_dt = Local
            .from_local_datetime(&naive_dt)
            .earliest()
            .ok_or_else(|| XportError::validation("modified-since", "ambiguous local time"))?;
        return Ok(local_dt.with_timezone(&Utc));
    }

    let rest = s.strip_prefix('-').unwrap_or(s);
    if let Some(unit_char) = rest.chars().last() {
        let amount_str = &rest[..rest.len() - unit_char.len_utf8()];
        if let Ok(amount) = amount_str.parse::<i64>() {
            let duration = match unit_char {
                'm' => Duration::minutes(amount),
                'h' => Duration::hours(amount),
                'd' => Duration::days(amount),
                'w' => Duration::weeks(amount),
                _ => {
                    return Err(XportError::validation(
                        "modified-since",
                        "invalid unit (use m, h, d, w)",
                    ));
                }
            };
            return Ok(now - duration);
        }
    }

    Err(XportError::validation(
        "modified-since",
        format!("unrecognized time '{s}' (use RFC3339, YYYY-MM-DD, or 7d)"),
    ))
}

/// Render an instant the way the backup endpoint expects it.
#[must_use]
pub fn format_modified_since(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
