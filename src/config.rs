//! # Configuration
//!
//! Settings are read from environment variables, which in AKS come from the
//! pod spec (`env`/`envFrom`). Lookups go through [`ConfigSource`] so that the
//! samples can be exercised without touching the process environment.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::str::FromStr;

/// Read-only key/value lookup for settings
pub trait ConfigSource: Send + Sync {
    /// Raw value for `key`, if present
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory settings, mostly for tests
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapSource {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Value of `key`, treating an empty or whitespace-only value as unset
pub fn optional(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Value of `key`, failing with [`ConfigError::Missing`] when unset or empty
///
/// # Errors
/// Returns an error if the key is absent or blank
pub fn required(source: &dyn ConfigSource, key: &'static str) -> Result<String, ConfigError> {
    optional(source, key).ok_or(ConfigError::Missing(key))
}

/// Parsed value of `key`, or `default` when unset
///
/// A value that is present but does not parse is an error, not the default.
///
/// # Errors
/// Returns an error if the value is present but does not parse
pub fn parsed_or<T>(source: &dyn ConfigSource, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(source, key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Boolean flag; accepts true/1/yes/on in any case
pub fn flag(source: &dyn ConfigSource, key: &str) -> bool {
    optional(source, key).is_some_and(|v| {
        let v = v.to_lowercase();
        v == "true" || v == "1" || v == "yes" || v == "on"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_treats_blank_as_unset() {
        let source = MapSource::from([("A", "  "), ("B", " value ")]);
        assert_eq!(optional(&source, "A"), None);
        assert_eq!(optional(&source, "B").as_deref(), Some("value"));
        assert_eq!(optional(&source, "C"), None);
    }

    #[test]
    fn test_required_reports_key() {
        let source = MapSource::new();
        assert_eq!(
            required(&source, "SECRET_NAME"),
            Err(ConfigError::Missing("SECRET_NAME"))
        );
    }

    #[test]
    fn test_parsed_or_default_and_invalid() {
        let source = MapSource::from([("PORT", "9090"), ("BAD", "nine")]);
        assert_eq!(parsed_or(&source, "PORT", 8080_u16), Ok(9090));
        assert_eq!(parsed_or(&source, "MISSING", 8080_u16), Ok(8080));
        assert!(matches!(
            parsed_or(&source, "BAD", 8080_u16),
            Err(ConfigError::Invalid { key: "BAD", .. })
        ));
    }

    #[test]
    fn test_flag_values() {
        let source = MapSource::from([("A", "TRUE"), ("B", "on"), ("C", "0")]);
        assert!(flag(&source, "A"));
        assert!(flag(&source, "B"));
        assert!(!flag(&source, "C"));
        assert!(!flag(&source, "D"));
    }
}
