//! Utility functions

pub mod content;
pub mod crypto;
pub mod time;
pub mod validation;

pub use content::{ContentFormat, ProblemSource, build_content};
pub use crypto::{hash_bytes, hash_string, random_string};
pub use time::{format_datetime, now_utc, parse_memory_mb, parse_time_ms};
pub use validation::{is_diff, parse_category, parse_pid, validate_language};
