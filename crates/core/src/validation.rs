//! Validation patterns for rule types, descriptions, and attribute paths.

use once_cell::sync::Lazy;
use regex::Regex;

/// Separator between dotted segments of an attribute path (`a.b.c`).
pub const ATTRIBUTE_PATH_SEPARATOR: char = '.';

/// Rule type regex pattern string: lowercase letters, hyphens allowed, not
/// consecutive, up to 51 characters.
pub const RULE_TYPE_PATTERN: &str = r"^[a-z]([-][a-z]|[a-z]){0,50}$";

/// Description regex pattern string: alphanumeric and common punctuation.
pub const DESCRIPTION_PATTERN: &str = r#"^[a-zA-Z0-9,.<>/?*()&#;\-_=+:'"!\[\]{}\s]{0,200}$"#;

pub static RULE_TYPE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(RULE_TYPE_PATTERN).expect("invalid RULE_TYPE_PATTERN"));

pub static DESCRIPTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(DESCRIPTION_PATTERN).expect("invalid DESCRIPTION_PATTERN"));

/// Validate a rule type string (e.g. `"premium-calculation"`).
pub fn is_valid_rule_type(rule_type: &str) -> bool {
    RULE_TYPE_REGEX.is_match(rule_type)
}

/// Validate a free-form rule description.
pub fn is_valid_description(desc: &str) -> bool {
    DESCRIPTION_REGEX.is_match(desc)
}

/// Validate a dotted attribute path: non-empty, and non-empty between
/// separators (`a..b` and leading/trailing dots are rejected).
pub fn is_valid_attribute_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    path.split(ATTRIBUTE_PATH_SEPARATOR).all(|seg| !seg.is_empty())
}

/// Split a dotted attribute path into its segments.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(ATTRIBUTE_PATH_SEPARATOR)
}
