//! Actions and column classifications.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The kind of change a log record describes.
///
/// Lifecycle hooks produce the three built-in actions; manual events may use
/// any identifier. Actions are stored by identifier and created on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Update,
    Delete,
    Custom(String),
}

impl Action {
    /// Return the identifier stored in the action table.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Custom(identifier) => identifier,
        }
    }
}

impl From<&str> for Action {
    fn from(identifier: &str) -> Self {
        match identifier {
            "insert" => Self::Insert,
            "update" => Self::Update,
            "delete" => Self::Delete,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ValueKind
// ---------------------------------------------------------------------------

/// Semantic type classification of a column.
///
/// Only the numeric/non-numeric split matters to the engine: it decides
/// whether a key lands in `affectedId` or `affectedStringId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Number,
    Other,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
