//! Time utilities

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{AppError, AppResult};

/// Default layout used by [`format_datetime`]
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([0-9]+(?:\.[0-9]*)?)([mu]?)s?$").expect("valid time regex")
});

static MEMORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([0-9]+(?:\.[0-9]*)?)([kmg])b?$").expect("valid memory regex")
});

/// Get current UTC time
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Format a datetime with `strftime` placeholders, defaulting to `%Y-%m-%d %H:%M:%S`
pub fn format_datetime(dt: &DateTime<Utc>, fmt: Option<&str>) -> String {
    dt.format(fmt.unwrap_or(DEFAULT_DATETIME_FORMAT)).to_string()
}

/// Parse a duration such as `1s`, `1.5s`, `500ms` or `250us` into whole milliseconds
pub fn parse_time_ms(input: &str) -> AppResult<u64> {
    let caps = TIME_RE
        .captures(input.trim())
        .ok_or_else(|| AppError::Validation(format!("{} error parsing time", input)))?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| AppError::Validation(format!("{} error parsing time", input)))?;
    let factor = match caps[2].to_ascii_lowercase().as_str() {
        "m" => 1.0,
        "u" => 0.001,
        _ => 1000.0,
    };
    Ok((value * factor).floor() as u64)
}

/// Parse a size such as `256m`, `1g`, `512kb` into whole megabytes, rounding up
pub fn parse_memory_mb(input: &str) -> AppResult<u64> {
    let caps = MEMORY_RE
        .captures(input.trim())
        .ok_or_else(|| AppError::Validation(format!("{} error parsing memory", input)))?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| AppError::Validation(format!("{} error parsing memory", input)))?;
    let factor = match caps[2].to_ascii_lowercase().as_str() {
        "k" => 1.0 / 1024.0,
        "g" => 1024.0,
        _ => 1.0,
    };
    Ok((value * factor).ceil() as u64)
}
