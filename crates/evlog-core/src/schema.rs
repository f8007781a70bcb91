//! Schema facts the engine needs from the store.

use serde::{Deserialize, Serialize};

use crate::enums::ValueKind;

/// A primary-key column with its semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumn {
    pub name: String,
    pub kind: ValueKind,
}

impl KeyColumn {
    #[must_use]
    pub fn number(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ValueKind::Number,
        }
    }

    #[must_use]
    pub fn other(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ValueKind::Other,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.kind == ValueKind::Number
    }
}
