//! Typed views over a [`ConfigSource`].
//!
//! Every server namespace `N` understands `N.disabled`, `N.address` and
//! `N.shutdown_timeout`. Logging reads `logger.level` and `logger.format`.

use std::str::FromStr;
use std::time::Duration;

use crate::config::loader::ConfigError;
use crate::config::source::ConfigSource;

/// Per-namespace server settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSettings {
    /// Forces the server absent even when an address is configured.
    pub disabled: bool,

    /// Listen address (`host:port`). Absent or empty means no server.
    pub address: Option<String>,

    /// Overrides the global shutdown timeout for this server.
    pub shutdown_timeout: Option<Duration>,
}

impl ServerSettings {
    /// Read the settings of one namespace.
    pub fn from_source(source: &dyn ConfigSource, namespace: &str) -> Result<Self, ConfigError> {
        let address = source
            .get_string(&format!("{namespace}.address"))?
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty());

        Ok(Self {
            disabled: source
                .get_bool(&format!("{namespace}.disabled"))?
                .unwrap_or(false),
            address,
            shutdown_timeout: source.get_duration(&format!("{namespace}.shutdown_timeout"))?,
        })
    }

    /// True when the namespace should produce a running server.
    pub fn is_enabled(&self) -> bool {
        !self.disabled && self.address.is_some()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "console" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(other.to_string()),
        }
    }
}

/// Logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggerConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let format = match source.get_string("logger.format")? {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Type {
                key: "logger.format".to_string(),
                expected: "log format (text or json)",
            })?,
            None => defaults.format,
        };

        Ok(Self {
            level: source.get_string("logger.level")?.unwrap_or(defaults.level),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn unconfigured_namespace_is_disabled() {
        let settings = ServerSettings::from_source(&Settings::new(), "pprof").unwrap();
        assert_eq!(settings, ServerSettings::default());
        assert!(!settings.is_enabled());
    }

    #[test]
    fn blank_address_counts_as_absent() {
        let mut source = Settings::new();
        source.set("api.address", "   ");

        let settings = ServerSettings::from_source(&source, "api").unwrap();
        assert_eq!(settings.address, None);
    }

    #[test]
    fn disabled_wins_over_address() {
        let mut source = Settings::new();
        source.set("metrics.address", ":8090");
        source.set("metrics.disabled", true);

        let settings = ServerSettings::from_source(&source, "metrics").unwrap();
        assert!(settings.disabled);
        assert!(!settings.is_enabled());
    }

    #[test]
    fn logger_defaults_and_overrides() {
        assert_eq!(
            LoggerConfig::from_source(&Settings::new()).unwrap(),
            LoggerConfig::default()
        );

        let mut source = Settings::new();
        source.set("logger.level", "debug");
        source.set("logger.format", "JSON");
        let config = LoggerConfig::from_source(&source).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);

        source.set("logger.format", "xml");
        assert!(LoggerConfig::from_source(&source).is_err());
    }
}
