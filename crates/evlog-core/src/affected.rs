//! Affected-record key derivation.
//!
//! The log table has three fixed key columns (`affectedId`,
//! `affectedSecondaryId`, `affectedStringId`), so only one- and two-column
//! primary keys can be recorded:
//!
//! ```text
//! key shape                 affectedId  affectedSecondaryId  affectedStringId
//! (number)                  set         -                    -
//! (other)                   -           -                    set
//! (number, number)          set         set                  -
//! (number, other)           set         -                    -
//! (other, number)           -           set                  set
//! 0 or 3+ columns           -           -                    -
//! ```

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::schema::KeyColumn;
use crate::value::Value;

/// Key of the record a log entry is about.
///
/// Serialized under the log table's column names, so it can be flattened
/// into a `LogRecord` next to the row's own `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AffectedKey {
    #[serde(rename = "affectedId")]
    pub id: Option<i64>,
    #[serde(rename = "affectedSecondaryId")]
    pub secondary_id: Option<i64>,
    #[serde(rename = "affectedStringId")]
    pub string_id: Option<String>,
}

impl AffectedKey {
    /// Derive the affected key from a record's key columns and values.
    ///
    /// Unsupported key shapes yield an empty key rather than an error.
    #[must_use]
    pub fn derive(keys: &[KeyColumn], values: &BTreeMap<String, Value>) -> Self {
        let mut key = Self::default();
        if keys.is_empty() || keys.len() > 2 {
            return key;
        }

        let first = &keys[0];
        if let Some(value) = values.get(&first.name) {
            if first.is_numeric() {
                key.id = value.as_i64();
            } else {
                key.string_id = value.to_key_string();
            }
        }

        if let [_, second] = keys {
            if second.is_numeric() {
                key.secondary_id = values.get(&second.name).and_then(Value::as_i64);
            }
        }

        key
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.id.is_none() && self.secondary_id.is_none() && self.string_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn single_numeric_key_sets_id_only() {
        let key = AffectedKey::derive(
            &[KeyColumn::number("id")],
            &values(&[("id", Value::Integer(69))]),
        );
        assert_eq!(key.id, Some(69));
        assert_eq!(key.string_id, None);
        assert_eq!(key.secondary_id, None);
    }

    #[test]
    fn single_text_key_sets_string_id_only() {
        let key = AffectedKey::derive(
            &[KeyColumn::other("slug")],
            &values(&[("slug", Value::Text("hello-world".into()))]),
        );
        assert_eq!(key.id, None);
        assert_eq!(key.string_id.as_deref(), Some("hello-world"));
    }

    #[test]
    fn two_numeric_columns_set_both_ids() {
        let key = AffectedKey::derive(
            &[KeyColumn::number("id_article"), KeyColumn::number("id_tag")],
            &values(&[
                ("id_article", Value::Integer(3)),
                ("id_tag", Value::Integer(9)),
            ]),
        );
        assert_eq!(
            key,
            AffectedKey {
                id: Some(3),
                secondary_id: Some(9),
                string_id: None,
            }
        );
    }

    #[test]
    fn non_numeric_second_column_is_dropped() {
        let key = AffectedKey::derive(
            &[KeyColumn::number("id"), KeyColumn::other("locale")],
            &values(&[("id", Value::Integer(1)), ("locale", Value::Text("de".into()))]),
        );
        assert_eq!(key.id, Some(1));
        assert_eq!(key.secondary_id, None);
        assert_eq!(key.string_id, None);
    }

    #[test]
    fn three_column_key_records_nothing() {
        let key = AffectedKey::derive(
            &[
                KeyColumn::number("a"),
                KeyColumn::number("b"),
                KeyColumn::number("c"),
            ],
            &values(&[
                ("a", Value::Integer(1)),
                ("b", Value::Integer(2)),
                ("c", Value::Integer(3)),
            ]),
        );
        assert!(key.is_empty());
    }

    #[test]
    fn keyless_table_records_nothing() {
        assert!(AffectedKey::derive(&[], &BTreeMap::new()).is_empty());
    }
}
