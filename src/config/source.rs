//! Key/value configuration lookups.
//!
//! Keys are dotted paths (`api.address`) into a TOML table. When an
//! environment prefix is set, `<PREFIX>_<KEY>` overrides the file value,
//! with `.` and `-` mapped to `_` and the key upper-cased.

use std::time::Duration;

use crate::config::loader::ConfigError;

/// Typed configuration lookups. `Ok(None)` means the key is not present.
pub trait ConfigSource: Send + Sync {
    /// Look up a string value.
    fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError>;

    /// Look up a boolean value.
    fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError>;

    /// Look up a duration value.
    fn get_duration(&self, key: &str) -> Result<Option<Duration>, ConfigError>;
}

/// TOML-backed settings with optional environment overrides.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    table: toml::Table,
    env_prefix: Option<String>,
}

impl Settings {
    /// Empty settings: every lookup is "not present".
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = content.parse()?;
        Ok(Self {
            table,
            env_prefix: None,
        })
    }

    /// Enable environment overrides under the given prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Set a value, creating intermediate tables as needed.
    ///
    /// An intermediate key that holds a non-table value is replaced.
    pub fn set(&mut self, key: &str, value: impl Into<toml::Value>) {
        let mut parts: Vec<&str> = key.split('.').collect();
        let Some(leaf) = parts.pop() else {
            return;
        };

        let mut table = &mut self.table;
        for part in parts {
            let entry = table
                .entry(part.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = toml::Value::Table(toml::Table::new());
            }
            let Some(inner) = entry.as_table_mut() else {
                return;
            };
            table = inner;
        }
        table.insert(leaf.to_string(), value.into());
    }

    fn lookup(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut value = self.table.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        Some(value)
    }

    fn env_override(&self, key: &str) -> Option<String> {
        let prefix = self.env_prefix.as_deref()?;
        let name = format!("{}_{}", prefix, key.replace(['.', '-'], "_")).to_uppercase();
        std::env::var(name).ok()
    }
}

impl ConfigSource for Settings {
    fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        if let Some(value) = self.env_override(key) {
            return Ok(Some(value));
        }
        match self.lookup(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ConfigError::Type {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        if let Some(value) = self.env_override(key) {
            return match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
                _ => Err(ConfigError::Type {
                    key: key.to_string(),
                    expected: "bool",
                }),
            };
        }
        match self.lookup(key) {
            None => Ok(None),
            Some(toml::Value::Boolean(b)) => Ok(Some(*b)),
            Some(_) => Err(ConfigError::Type {
                key: key.to_string(),
                expected: "bool",
            }),
        }
    }

    fn get_duration(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        let invalid = |value: String| ConfigError::Duration {
            key: key.to_string(),
            value,
        };

        if let Some(value) = self.env_override(key) {
            return parse_duration(&value).map(Some).ok_or_else(|| invalid(value));
        }
        match self.lookup(key) {
            None => Ok(None),
            Some(toml::Value::Integer(secs)) => u64::try_from(*secs)
                .map(|secs| Some(Duration::from_secs(secs)))
                .map_err(|_| invalid(secs.to_string())),
            Some(toml::Value::Float(secs)) => Duration::try_from_secs_f64(*secs)
                .map(Some)
                .map_err(|_| invalid(secs.to_string())),
            Some(toml::Value::String(s)) => {
                parse_duration(s).map(Some).ok_or_else(|| invalid(s.clone()))
            }
            Some(_) => Err(ConfigError::Type {
                key: key.to_string(),
                expected: "duration",
            }),
        }
    }
}

/// Parse `"1m30s"`, `"250ms"`, `"2h"` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(secs) = input.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(split);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let unit_nanos: u64 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return None,
        };

        let part = match number.parse::<u64>() {
            Ok(whole) => Duration::from_nanos(whole.checked_mul(unit_nanos)?),
            Err(_) => {
                let fraction: f64 = number.parse().ok()?;
                Duration::try_from_secs_f64(fraction * unit_nanos as f64 / 1e9).ok()?
            }
        };
        total = total.checked_add(part)?;
        rest = next;
    }
    Some(total)
}
