//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::source::Settings;

/// Error type for configuration loading and lookups.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config key {key:?} must be a {expected}")]
    Type { key: String, expected: &'static str },

    #[error("config key {key:?} holds an invalid duration {value:?}")]
    Duration { key: String, value: String },
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = Settings::from_toml(&content)?;

    tracing::debug!(path = %path.display(), "Configuration file loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use std::io::Write;

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[grpc]\naddress = \":9000\"").unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(
            settings.get_string("grpc.address").unwrap().as_deref(),
            Some(":9000")
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api\naddress = ").unwrap();

        let err = load_settings(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
