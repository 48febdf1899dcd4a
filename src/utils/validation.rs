//! Input validation and parameter parsing

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::constants::{
    self, MAX_PROBLEM_ALIAS_LENGTH, MAX_PROBLEM_CONTENT_LENGTH, MAX_PROBLEM_TITLE_LENGTH,
    MAX_SOURCE_CODE_SIZE,
};
use crate::models::ProblemKey;

static PID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").expect("valid pid regex"));

/// Validate programming language
pub fn validate_language(language: &str) -> Result<(), &'static str> {
    if constants::languages::ALL.contains(&language) {
        Ok(())
    } else {
        Err("Unsupported programming language")
    }
}

/// Validate source code size
pub fn validate_source_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Source code cannot be empty");
    }
    if code.len() > MAX_SOURCE_CODE_SIZE {
        return Err("Source code exceeds maximum size of 64KB");
    }
    Ok(())
}

/// Sanitize string input (remove control characters, trim whitespace)
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Validate and sanitize problem title
pub fn validate_problem_title(title: &str) -> Result<String, &'static str> {
    let sanitized = sanitize_string(title);
    if sanitized.is_empty() {
        return Err("Problem title cannot be empty");
    }
    if sanitized.chars().count() as u64 > MAX_PROBLEM_TITLE_LENGTH {
        return Err("Problem title must be at most 64 characters");
    }
    Ok(sanitized)
}

/// Validate problem statement length
pub fn validate_problem_content(content: &str) -> Result<(), &'static str> {
    if content.trim().is_empty() {
        return Err("Problem content cannot be empty");
    }
    if content.chars().count() as u64 > MAX_PROBLEM_CONTENT_LENGTH {
        return Err("Problem content is too long");
    }
    Ok(())
}

/// Validate a human readable problem alias such as `A1000`
///
/// Aliases share the path segment with problem ids, so an alias that parses
/// as a UUID would be unreachable and is rejected.
pub fn validate_problem_alias(alias: &str) -> Result<(), &'static str> {
    if alias.len() > MAX_PROBLEM_ALIAS_LENGTH {
        return Err("Problem id must be at most 64 characters");
    }
    if !PID_RE.is_match(alias) {
        return Err("Problem id must start with a letter and contain only letters, digits, '_' or '-'");
    }
    if Uuid::parse_str(alias).is_ok() {
        return Err("Problem id cannot look like a UUID");
    }
    Ok(())
}

/// Split a category expression (`dp+graph,tree`) into trimmed names
pub fn parse_category(value: &str) -> Vec<String> {
    value
        .split('+')
        .flat_map(|part| part.split(','))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Interpret a path segment as a problem id or alias
pub fn parse_pid(value: &str) -> ProblemKey {
    match Uuid::parse_str(value) {
        Ok(id) => ProblemKey::Id(id),
        Err(_) => ProblemKey::Alias(value.to_string()),
    }
}

/// Whether two lists differ as multisets
pub fn is_diff<T: Ord + Clone>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return true;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a != b
}
