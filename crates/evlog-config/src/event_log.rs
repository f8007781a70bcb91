//! Event-log engine configuration.

use std::time::Duration;

use evlog_core::tables::{DEFAULT_PREFIX, TableNames};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_table_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventLogConfig {
    /// Prefix of the five event-log tables (`eventLog`, `eventLogEntity`, ...).
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Seconds between automatic configuration reloads. `0` disables polling.
    #[serde(default)]
    pub reload_interval_secs: u64,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
            reload_interval_secs: 0,
        }
    }
}

impl EventLogConfig {
    #[must_use]
    pub fn table_names(&self) -> TableNames {
        TableNames::new(&self.table_prefix)
    }

    /// Polling interval, if periodic reload is enabled.
    #[must_use]
    pub const fn reload_interval(&self) -> Option<Duration> {
        if self.reload_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.reload_interval_secs))
        }
    }

    /// The prefix ends up inside table names, so keep it to identifier characters.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.table_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "event_log.table_prefix".into(),
                reason: "must not be empty".into(),
            });
        }
        if !self
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::InvalidValue {
                field: "event_log.table_prefix".into(),
                reason: format!(
                    "'{}' may only contain ASCII letters, digits and '_'",
                    self.table_prefix
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = EventLogConfig::default();
        assert_eq!(config.table_prefix, "eventLog");
        assert_eq!(config.reload_interval(), None);
        assert_eq!(config.table_names().entity, "eventLogEntity");
    }

    #[test]
    fn rejects_prefix_with_quotes() {
        let config = EventLogConfig {
            table_prefix: "event\"Log".into(),
            ..EventLogConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nonzero_interval_enables_polling() {
        let config = EventLogConfig {
            reload_interval_secs: 30,
            ..EventLogConfig::default()
        };
        assert_eq!(config.reload_interval(), Some(Duration::from_secs(30)));
    }
}
