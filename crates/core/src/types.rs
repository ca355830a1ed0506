//! Core identifiers: rule IDs and dotted attribute paths.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation;

/// Unique identifier for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse as a UUID, or derive a deterministic UUIDv5 from the string if
    /// it isn't one — lets callers key rules by a stable human-readable name.
    pub fn from_string(s: &str) -> Self {
        if let Ok(uuid) = Uuid::parse_str(s) {
            Self(uuid)
        } else {
            Self(Uuid::new_v5(&Uuid::NAMESPACE_DNS, s.as_bytes()))
        }
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_hex_string(&self) -> String {
        self.0.as_simple().to_string()
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dotted path identifying a computed or input attribute value, e.g.
/// `"customer.age"`. Segments navigate nested objects and arrays in the
/// execution context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributePath(pub String);

impl AttributePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validation::is_valid_attribute_path(&self.0)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        validation::path_segments(&self.0)
    }
}

impl From<String> for AttributePath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AttributePath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
