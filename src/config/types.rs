//! Configuration types and structures.

use crate::error::{ItemError, Result};
use crate::id::DEFAULT_ID_LENGTH;
use crate::types::ItemType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Project-level config file, relative to the working directory.
pub const PROJECT_CONFIG_PATH: &str = ".item-graph/config.yaml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ids: IdsConfig,

    /// Per-project overrides of ID settings.
    #[serde(default)]
    pub projects: BTreeMap<String, IdsConfig>,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Store location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".item-graph/items.db")
}

/// ID generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdsConfig {
    #[serde(default = "default_task_prefix")]
    pub task_prefix: String,

    #[serde(default = "default_epic_prefix")]
    pub epic_prefix: String,

    /// Length of the random suffix.
    #[serde(default = "default_id_length")]
    pub length: usize,
}

impl Default for IdsConfig {
    fn default() -> Self {
        Self {
            task_prefix: default_task_prefix(),
            epic_prefix: default_epic_prefix(),
            length: default_id_length(),
        }
    }
}

impl IdsConfig {
    /// Prefix used for items of the given type.
    pub fn prefix_for(&self, item_type: ItemType) -> &str {
        match item_type {
            ItemType::Task => &self.task_prefix,
            ItemType::Epic => &self.epic_prefix,
        }
    }
}

fn default_task_prefix() -> String {
    "task".to_string()
}

fn default_epic_prefix() -> String {
    "epic".to_string()
}

fn default_id_length() -> usize {
    DEFAULT_ID_LENGTH
}

/// History paging and retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Page size when a query carries no limit.
    #[serde(default = "default_page_size")]
    pub page_size: i64,

    /// Retention for status-class events, in days.
    #[serde(default = "default_status_retention_days")]
    pub status_retention_days: i64,

    /// Retention for all other events, in days.
    #[serde(default = "default_other_retention_days")]
    pub other_retention_days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            status_retention_days: default_status_retention_days(),
            other_retention_days: default_other_retention_days(),
        }
    }
}

fn default_page_size() -> i64 {
    50
}

fn default_status_retention_days() -> i64 {
    30
}

fn default_other_retention_days() -> i64 {
    7
}

/// Status report settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// In-progress items not updated within this window are stale.
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_secs: i64,

    /// Number of recently completed items to include.
    #[serde(default = "default_recent_done_limit")]
    pub recent_done_limit: i64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            stale_threshold_secs: default_stale_threshold(),
            recent_done_limit: default_recent_done_limit(),
        }
    }
}

fn default_stale_threshold() -> i64 {
    300 // 5 minutes
}

fn default_recent_done_limit() -> i64 {
    10
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ItemError::storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ItemError::invalid("config", format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when it exists, defaults otherwise, then apply environment
    /// overrides. A file that exists but does not parse is an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file to use: an explicit path, else the project file, else the
    /// user file when only that exists.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let project = PathBuf::from(PROJECT_CONFIG_PATH);
        if project.exists() {
            return project;
        }
        match user_config_path() {
            Some(user) if user.exists() => user,
            _ => project,
        }
    }

    /// `ITEM_GRAPH_DB_PATH` and `ITEM_GRAPH_ID_LENGTH`.
    fn apply_env_overrides(&mut self) {
        if let Ok(db_path) = std::env::var("ITEM_GRAPH_DB_PATH") {
            self.store.db_path = PathBuf::from(db_path);
        }

        if let Ok(length) = std::env::var("ITEM_GRAPH_ID_LENGTH") {
            match length.parse() {
                Ok(length) if length > 0 => self.ids.length = length,
                _ => tracing::warn!("Ignoring invalid ITEM_GRAPH_ID_LENGTH '{}'", length),
            }
        }
    }

    /// Write configuration as YAML, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ItemError::storage)?;
        }
        let yaml = serde_yaml::to_string(self).map_err(ItemError::storage)?;
        std::fs::write(path, yaml).map_err(ItemError::storage)?;
        Ok(())
    }

    /// ID settings for a project, falling back to the global section.
    pub fn ids_for(&self, project: &str) -> &IdsConfig {
        self.projects.get(project).unwrap_or(&self.ids)
    }

    /// Reject values no operation can work with.
    pub fn validate(&self) -> Result<()> {
        for (scope, ids) in std::iter::once(("ids", &self.ids))
            .chain(self.projects.iter().map(|(name, ids)| (name.as_str(), ids)))
        {
            if ids.length == 0 {
                return Err(ItemError::invalid(
                    "ids.length",
                    format!("ID length for '{}' must be at least 1", scope),
                ));
            }
        }
        if self.history.page_size <= 0 {
            return Err(ItemError::invalid("history.page_size", "page size must be positive"));
        }
        if self.history.status_retention_days < 0 || self.history.other_retention_days < 0 {
            return Err(ItemError::invalid(
                "history",
                "retention days must not be negative",
            ));
        }
        if self.report.recent_done_limit < 0 {
            return Err(ItemError::invalid(
                "report.recent_done_limit",
                "recent done limit must not be negative",
            ));
        }
        if self.report.stale_threshold_secs < 0 {
            return Err(ItemError::invalid(
                "report.stale_threshold_secs",
                "stale threshold must not be negative",
            ));
        }
        Ok(())
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(ItemError::storage)?;
        }
        Ok(())
    }
}

/// User-level config file (`~/.item-graph/config.yaml`), if a home directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".item-graph").join("config.yaml"))
}
