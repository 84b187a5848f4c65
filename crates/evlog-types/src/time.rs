use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};

/// Fixed-width calendar format of the `time` property.
pub const TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Format a stored timestamp in the local time zone.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    format_timestamp_in(timestamp, &Local)
}

/// Format a stored timestamp in an explicit time zone.
pub fn format_timestamp_in<Tz>(timestamp: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.with_timezone(tz).format(TIME_FORMAT).to_string()
}
