//! Configuration management.
//!
//! Settings come from a TOML file, then environment overrides:
//!
//! ```toml
//! uri = "sqlite:///var/lib/app/data.db"
//! batch_policy = "continue"   # or "abort"
//!
//! [logging]
//! format = "json"             # or "pretty"
//! filter = "warn,dbflex=debug"
//! file = "/var/log/dbflex.log"
//!
//! [sqlite]
//! busy_timeout_ms = 5000
//! ```
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `DBFLEX_CONFIG_PATH` | config file location |
//! | `DBFLEX_URI` | `uri` |
//! | `DBFLEX_LOG` | `logging.filter` |
//! | `DBFLEX_LOG_FORMAT` | `logging.format` |

use crate::observability::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "DBFLEX_CONFIG_PATH";

/// How a batch reacts when one item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Run every item and report all failures together.
    #[default]
    ContinueOnError,
    /// Stop at the first failure.
    AbortOnError,
}

impl BatchPolicy {
    /// Parses `"continue"` or `"abort"`, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" | "continue_on_error" => Some(Self::ContinueOnError),
            "abort" | "abort_on_error" => Some(Self::AbortOnError),
            _ => None,
        }
    }
}

/// `SQLite` driver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteSettings {
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteSettings {
    /// Busy timeout as a duration.
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Main configuration for dbflex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbflexConfig {
    /// Default connection URI.
    pub uri: Option<String>,
    /// Batch failure policy.
    pub batch_policy: BatchPolicy,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// `SQLite` driver settings.
    pub sqlite: SqliteSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Default connection URI.
    pub uri: Option<String>,
    /// `"continue"` or `"abort"`.
    pub batch_policy: Option<String>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// `SQLite` section.
    pub sqlite: Option<ConfigFileSqlite>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// `"json"` or `"pretty"`.
    pub format: Option<String>,
    /// `EnvFilter` directives.
    pub filter: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// `SQLite` section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileSqlite {
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u64>,
}

impl DbflexConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default URI.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Sets the batch policy.
    #[must_use]
    pub const fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    /// Sets the logging settings.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] for invalid TOML, unknown keys or
    /// unknown enum values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Platform config file location (`<config dir>/dbflex/config.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "dbflex")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns default configuration if no config file is found or it
    /// cannot be read.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
            Self::default()
        })
    }

    /// Loads from `explicit`, else `DBFLEX_CONFIG_PATH`, else the default
    /// location, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be loaded.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `DBFLEX_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] for an unknown log format.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(uri) = lookup("DBFLEX_URI").filter(|v| !v.trim().is_empty()) {
            self.uri = Some(uri);
        }
        if let Some(filter) = lookup("DBFLEX_LOG").filter(|v| !v.trim().is_empty()) {
            self.logging.filter = filter;
        }
        if let Some(format) = lookup("DBFLEX_LOG_FORMAT") {
            self.logging.format = parse_log_format(&format)?;
        }
        Ok(self)
    }

    /// Converts a `ConfigFile` to `DbflexConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self {
            uri: file.uri,
            ..Self::default()
        };
        if let Some(policy) = file.batch_policy {
            config.batch_policy = BatchPolicy::parse(&policy).ok_or_else(|| Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: format!("unknown batch_policy '{policy}', expected 'continue' or 'abort'"),
            })?;
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = parse_log_format(&format)?;
            }
            if let Some(filter) = logging.filter {
                config.logging.filter = filter;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(busy_timeout_ms) = file.sqlite.and_then(|s| s.busy_timeout_ms) {
            config.sqlite.busy_timeout_ms = busy_timeout_ms;
        }
        Ok(config)
    }
}

fn parse_log_format(s: &str) -> Result<LogFormat> {
    LogFormat::parse(s).ok_or_else(|| Error::OperationFailed {
        operation: "parse_config".to_string(),
        cause: format!("unknown log format '{s}', expected 'json' or 'pretty'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DbflexConfig::default();
        assert_eq!(config.batch_policy, BatchPolicy::ContinueOnError);
        assert_eq!(config.sqlite.busy_timeout(), Duration::from_secs(5));
        assert!(config.uri.is_none());
    }

    #[test]
    fn test_from_toml() {
        let config = DbflexConfig::from_toml(
            r#"
            uri = "mem://app"
            batch_policy = "abort"

            [logging]
            format = "json"
            file = "/tmp/dbflex.log"

            [sqlite]
            busy_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.uri.as_deref(), Some("mem://app"));
        assert_eq!(config.batch_policy, BatchPolicy::AbortOnError);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/dbflex.log")));
        assert_eq!(config.sqlite.busy_timeout_ms, 250);
    }

    #[test]
    fn test_rejects_unknown_values() {
        assert!(DbflexConfig::from_toml("batch_policy = \"sometimes\"").is_err());
        assert!(DbflexConfig::from_toml("colour = \"blue\"").is_err());
        assert!(DbflexConfig::from_toml("[logging]\nformat = \"xml\"").is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("DBFLEX_URI", "sqlite:///tmp/x.db"),
            ("DBFLEX_LOG", "debug"),
            ("DBFLEX_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();
        let config = DbflexConfig::new()
            .with_uri("mem://from-file")
            .with_overrides(|k| env.get(k).map(ToString::to_string))
            .unwrap();
        assert_eq!(config.uri.as_deref(), Some("sqlite:///tmp/x.db"));
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "uri = \"mem://file\"\n").unwrap();
        let config = DbflexConfig::load_from_file(&path).unwrap();
        assert_eq!(config.uri.as_deref(), Some("mem://file"));
        assert!(DbflexConfig::load_from_file(&dir.path().join("missing.toml")).is_err());
    }
}
