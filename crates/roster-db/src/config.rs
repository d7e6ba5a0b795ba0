//! # Roster Configuration
//!
//! File and environment configuration for binaries embedding Roster.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ROSTER_DATABASE_PATH=./roster.db                                   │
//! │     ROSTER_MAX_CONNECTIONS=5                                           │
//! │     ROSTER_FLUSH_MODE=commit                                           │
//! │     ROSTER_LOG=debug                                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/roster/roster.toml (Linux)                               │
//! │     ~/Library/Application Support/com.roster.roster/roster.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "roster.db"
//! max_connections = 5
//! flush_mode = "auto"   # auto | commit
//! run_migrations = true
//!
//! [logging]
//! filter = "info,roster_db=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use crate::unit_of_work::FlushMode;

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default)]
    pub flush_mode: FlushMode,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_path() -> PathBuf {
    PathBuf::from("roster.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_path(),
            max_connections: default_max_connections(),
            flush_mode: FlushMode::default(),
            run_migrations: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` still wins.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_filter(),
        }
    }
}

// =============================================================================
// Roster Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl RosterConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, or `roster.toml` in the platform config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading roster config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load roster config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DbError::Config(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| DbError::Config(e.to_string()))?;
        std::fs::write(&path, contents).map_err(|e| DbError::Config(e.to_string()))?;

        info!(?path, "Roster config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(DbError::Config("logging.filter must not be empty".into()));
        }
        Ok(())
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let base = if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
        };
        base.flush_mode(self.database.flush_mode)
            .run_migrations(self.database.run_migrations)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("ROSTER_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("ROSTER_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %max, "Ignoring invalid ROSTER_MAX_CONNECTIONS"),
            }
        }

        if let Some(mode) = lookup("ROSTER_FLUSH_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding flush mode from environment");
                    self.database.flush_mode = parsed;
                }
                Err(e) => warn!(error = %e, "Ignoring ROSTER_FLUSH_MODE"),
            }
        }

        if let Some(filter) = lookup("ROSTER_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "roster", "roster")
            .map(|dirs| dirs.config_dir().join("roster.toml"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RosterConfig::default();
        assert_eq!(config.database.path, PathBuf::from("roster.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.flush_mode, FlushMode::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RosterConfig::from_toml(
            r#"
            [database]
            path = ":memory:"
            flush_mode = "commit"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.flush_mode, FlushMode::Commit);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.filter, "info");

        let db_config = config.db_config();
        assert!(db_config.is_in_memory());
        assert_eq!(db_config.flush_mode, FlushMode::Commit);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            RosterConfig::from_toml("[database]\nflush_mode = \"never\""),
            Err(DbError::Config(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ROSTER_DATABASE_PATH", "/tmp/other.db"),
            ("ROSTER_MAX_CONNECTIONS", "not-a-number"),
            ("ROSTER_FLUSH_MODE", "commit"),
            ("ROSTER_LOG", "debug"),
        ]);

        let mut config = RosterConfig::default();
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.flush_mode, FlushMode::Commit);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_validation() {
        let mut config = RosterConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        config.database.max_connections = 1;
        config.logging.filter = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("roster-{}.toml", uuid::Uuid::new_v4()));
        let mut config = RosterConfig::default();
        config.database.max_connections = 3;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[database]"));
        let loaded = RosterConfig::from_toml(&contents).unwrap();
        assert_eq!(loaded.database.max_connections, 3);

        let _ = std::fs::remove_file(&path);
    }
}
