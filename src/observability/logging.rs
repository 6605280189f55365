//! Logging settings.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter when neither config nor `DBFLEX_LOG` sets one.
pub const DEFAULT_FILTER: &str = "warn,dbflex=info";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses `"json"` or `"pretty"`, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Where and how log events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `"dbflex=debug"`.
    pub filter: String,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Raises the filter to `debug` for dbflex events.
    #[must_use]
    pub fn verbose(mut self) -> Self {
        self.filter = format!("{},dbflex=debug", self.filter);
        self
    }

    /// Builds the filter, falling back to the default on bad directives.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_verbose_appends_directive() {
        let config = LoggingConfig::default().verbose();
        assert!(config.filter.ends_with("dbflex=debug"));
    }

    #[test]
    fn test_bad_filter_falls_back() {
        let config = LoggingConfig {
            filter: "dbflex=notalevel".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(config.env_filter().to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
    }
}
