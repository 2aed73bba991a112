//! XMLTV timestamp codec.
//!
//! The accepted grammar is exactly `YYYYMMDDhhmmss ±hhmm`; any other shape is
//! rejected. Formatting always emits UTC components with a `+0000` suffix.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{14}) ([+-])(\d{2})(\d{2})$").unwrap());

/// Parse an XMLTV timestamp into an absolute instant.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let caps = TIMESTAMP_RE
        .captures(s)
        .ok_or_else(|| format!("invalid XMLTV timestamp: '{s}'"))?;

    let naive = NaiveDateTime::parse_from_str(&caps[1], "%Y%m%d%H%M%S")
        .map_err(|e| format!("invalid date/time components in '{s}': {e}"))?;

    let sign = if &caps[2] == "-" { -1 } else { 1 };
    let hours: i32 = caps[3]
        .parse()
        .map_err(|_| format!("bad offset hours in '{s}'"))?;
    let minutes: i32 = caps[4]
        .parse()
        .map_err(|_| format!("bad offset minutes in '{s}'"))?;
    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("offset out of range in '{s}'"))?;

    match offset.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        _ => Err(format!("ambiguous local time in '{s}'")),
    }
}

/// Format an instant in the same grammar, always as UTC `+0000`.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H%M%S +0000").to_string()
}
