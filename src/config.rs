//! Layered configuration.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults (Monday 20:30 to 23:00, `last_seen` duplicate policy)
//! 2. `doulos.toml` in the working directory
//! 3. `DOULOS_*` environment variables, `__` separating nested keys
//!    (`DOULOS_WINDOW__START=19:00`)
//! 4. A plain `DATABASE_URL`

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::window::{TimeWindow, WindowError};

pub const DEFAULT_CONFIG_FILE: &str = "doulos.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid check-in window: {0}")]
    Window(#[from] WindowError),
    #[error("DATABASE_URL must be set to a Postgres instance")]
    MissingDatabaseUrl,
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Load(Box::new(error))
    }
}

/// Which evidence the duplicate guard sees as "last seen".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The member's rolling `last_seen_at` field.
    #[default]
    LastSeen,
    /// Latest attendance row in the meeting's week.
    Ledger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    pub start: String,
    pub end: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            day_of_week: 1,
            start: "20:30".to_string(),
            end: "23:00".to_string(),
        }
    }
}

impl WindowConfig {
    pub fn to_window(&self) -> Result<TimeWindow, WindowError> {
        TimeWindow::parse(self.day_of_week, &self.start, &self.end)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Loads and validates; a malformed window fails here rather than at check-in.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path).extract()?;
        config.window.to_window()?;
        Ok(config)
    }

    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DOULOS_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn time_window(&self) -> Result<TimeWindow, WindowError> {
        self.window.to_window()
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_monday_evening() {
        let config = Config::default();
        assert_eq!(config.time_window().unwrap(), TimeWindow::default());
        assert_eq!(config.duplicate_policy, DuplicatePolicy::LastSeen);
        assert!(matches!(
            config.database_url(),
            Err(ConfigError::MissingDatabaseUrl)
        ));
    }

    #[test]
    fn duplicate_policy_uses_snake_case() {
        let policy: DuplicatePolicy = serde_json::from_str("\"ledger\"").unwrap();
        assert_eq!(policy, DuplicatePolicy::Ledger);
    }
}
