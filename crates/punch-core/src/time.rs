//! Server timestamp parsing and local display.
//!
//! The API writes UTC ISO-8601 timestamps with a trailing `Z`. Older rows were
//! written without any offset; those are UTC as well.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fmt::Display;

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DISPLAY_FORMAT: &str = "%-I:%M %p";

pub fn parse_server_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(err) => NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|_| err),
    }
}

/// Format a server timestamp as wall-clock time in `tz`.
pub fn format_in<Tz: TimeZone>(ts: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    ts.with_timezone(tz).format(DISPLAY_FORMAT).to_string()
}

/// Format a server timestamp in the viewer's local time zone.
pub fn format_local(ts: &DateTime<Utc>) -> String {
    format_in(ts, &chrono::Local)
}
