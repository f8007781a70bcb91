//! Logical database configuration for the libSQL store.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One logical database backed by a local libSQL file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Logical database name, as reported to the engine.
    pub name: String,

    /// Path to the database file.
    pub path: String,
}

pub(crate) fn validate_databases(databases: &[DatabaseConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for db in databases {
        if db.name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "databases.name".into(),
                reason: "must not be empty".into(),
            });
        }
        if db.path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("databases.{}.path", db.name),
                reason: "must not be empty".into(),
            });
        }
        if !seen.insert(db.name.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "databases.name".into(),
                reason: format!("duplicate database name '{}'", db.name),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str, path: &str) -> DatabaseConfig {
        DatabaseConfig {
            name: name.into(),
            path: path.into(),
        }
    }

    #[test]
    fn distinct_names_pass() {
        assert!(validate_databases(&[db("main", "a.db"), db("archive", "b.db")]).is_ok());
    }

    #[test]
    fn duplicate_names_fail() {
        let err = validate_databases(&[db("main", "a.db"), db("main", "b.db")]).unwrap_err();
        assert!(err.to_string().contains("duplicate database name 'main'"));
    }

    #[test]
    fn empty_path_fails() {
        assert!(validate_databases(&[db("main", "")]).is_err());
    }
}
