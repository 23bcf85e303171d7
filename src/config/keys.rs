//! Settable configuration keys.
//!
//! Every key that can be read or written by name is listed in [`ConfigKey`];
//! each variant maps to a typed accessor on [`Config`].

use super::types::Config;
use crate::error::{ItemError, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A named, settable configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    StoreDbPath,
    IdsTaskPrefix,
    IdsEpicPrefix,
    IdsLength,
    HistoryPageSize,
    HistoryStatusRetentionDays,
    HistoryOtherRetentionDays,
    ReportStaleThresholdSecs,
    ReportRecentDoneLimit,
}

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Path(PathBuf),
    Text(String),
    Count(usize),
    Integer(i64),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Path(p) => write!(f, "{}", p.display()),
            ConfigValue::Text(s) => f.write_str(s),
            ConfigValue::Count(n) => write!(f, "{}", n),
            ConfigValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::StoreDbPath,
        ConfigKey::IdsTaskPrefix,
        ConfigKey::IdsEpicPrefix,
        ConfigKey::IdsLength,
        ConfigKey::HistoryPageSize,
        ConfigKey::HistoryStatusRetentionDays,
        ConfigKey::HistoryOtherRetentionDays,
        ConfigKey::ReportStaleThresholdSecs,
        ConfigKey::ReportRecentDoneLimit,
    ];

    /// Dotted name as written in YAML.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::StoreDbPath => "store.db_path",
            ConfigKey::IdsTaskPrefix => "ids.task_prefix",
            ConfigKey::IdsEpicPrefix => "ids.epic_prefix",
            ConfigKey::IdsLength => "ids.length",
            ConfigKey::HistoryPageSize => "history.page_size",
            ConfigKey::HistoryStatusRetentionDays => "history.status_retention_days",
            ConfigKey::HistoryOtherRetentionDays => "history.other_retention_days",
            ConfigKey::ReportStaleThresholdSecs => "report.stale_threshold_secs",
            ConfigKey::ReportRecentDoneLimit => "report.recent_done_limit",
        }
    }

    pub fn get(&self, config: &Config) -> ConfigValue {
        match self {
            ConfigKey::StoreDbPath => ConfigValue::Path(config.store.db_path.clone()),
            ConfigKey::IdsTaskPrefix => ConfigValue::Text(config.ids.task_prefix.clone()),
            ConfigKey::IdsEpicPrefix => ConfigValue::Text(config.ids.epic_prefix.clone()),
            ConfigKey::IdsLength => ConfigValue::Count(config.ids.length),
            ConfigKey::HistoryPageSize => ConfigValue::Integer(config.history.page_size),
            ConfigKey::HistoryStatusRetentionDays => {
                ConfigValue::Integer(config.history.status_retention_days)
            }
            ConfigKey::HistoryOtherRetentionDays => {
                ConfigValue::Integer(config.history.other_retention_days)
            }
            ConfigKey::ReportStaleThresholdSecs => {
                ConfigValue::Integer(config.report.stale_threshold_secs)
            }
            ConfigKey::ReportRecentDoneLimit => {
                ConfigValue::Integer(config.report.recent_done_limit)
            }
        }
    }

    /// Parse `raw` for this key and store it. The config is left unchanged
    /// if the value does not parse or fails validation.
    pub fn set(&self, config: &mut Config, raw: &str) -> Result<()> {
        let mut updated = config.clone();
        match self {
            ConfigKey::StoreDbPath => updated.store.db_path = PathBuf::from(raw.trim()),
            ConfigKey::IdsTaskPrefix => updated.ids.task_prefix = raw.trim().to_string(),
            ConfigKey::IdsEpicPrefix => updated.ids.epic_prefix = raw.trim().to_string(),
            ConfigKey::IdsLength => updated.ids.length = self.parse(raw)?,
            ConfigKey::HistoryPageSize => updated.history.page_size = self.parse(raw)?,
            ConfigKey::HistoryStatusRetentionDays => {
                updated.history.status_retention_days = self.parse(raw)?
            }
            ConfigKey::HistoryOtherRetentionDays => {
                updated.history.other_retention_days = self.parse(raw)?
            }
            ConfigKey::ReportStaleThresholdSecs => {
                updated.report.stale_threshold_secs = self.parse(raw)?
            }
            ConfigKey::ReportRecentDoneLimit => {
                updated.report.recent_done_limit = self.parse(raw)?
            }
        }
        updated.validate()?;
        *config = updated;
        Ok(())
    }

    fn parse<T: FromStr>(&self, raw: &str) -> Result<T> {
        raw.trim().parse().map_err(|_| {
            ItemError::invalid(self.name(), format!("Invalid value '{}' for {}", raw, self.name()))
        })
    }
}

impl FromStr for ConfigKey {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.name() == name)
            .ok_or_else(|| {
                let valid: Vec<&str> = ConfigKey::ALL.iter().map(|k| k.name()).collect();
                ItemError::invalid("key", format!("Unknown config key '{}'", name))
                    .with_details(format!("Valid keys: {}", valid.join(", ")))
            })
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_every_key_roundtrips_by_name() {
        for key in ConfigKey::ALL {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_get_and_set_typed() {
        let mut config = Config::default();
        let key: ConfigKey = "ids.length".parse().unwrap();
        assert_eq!(key.get(&config), ConfigValue::Count(6));

        key.set(&mut config, "12").unwrap();
        assert_eq!(config.ids.length, 12);

        ConfigKey::IdsTaskPrefix.set(&mut config, " tk ").unwrap();
        assert_eq!(ConfigKey::IdsTaskPrefix.get(&config).to_string(), "tk");
    }

    #[test]
    fn test_set_rejects_bad_values_without_mutation() {
        let mut config = Config::default();
        let err = ConfigKey::IdsLength.set(&mut config, "many").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);

        let err = ConfigKey::IdsLength.set(&mut config, "0").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unknown_key() {
        let err = "ids.colour".parse::<ConfigKey>().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert!(err.details.unwrap().contains("ids.length"));
    }
}
