//! Session options and the sources they are loaded from.
//!
//! Options come from defaults, optionally a JSON document, then environment
//! variables prefixed with `FERROUS_FIXTURES_`, later sources winning.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::builder::SKIP_REASON;
use crate::error::{DiError, DiResult};
use crate::provider::DEFAULT_MAX_DEPTH;

/// Prefix of environment variables overriding [`SessionOptions`].
pub const ENV_PREFIX: &str = "FERROUS_FIXTURES";

/// Tunables of a test session.
///
/// ```rust
/// use ferrous_fixtures::SessionOptions;
///
/// let options = SessionOptions::default();
/// assert!(options.continue_after_skip);
/// assert_eq!(options.skip_reason_key, "_SKIPREASON");
/// assert_eq!(options.max_resolution_depth, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SessionOptions {
    /// Keep executing the remaining eager dependencies after a skip. The last
    /// skip reason wins either way.
    pub continue_after_skip: bool,
    /// Property key under which built fixtures and tests record their reason.
    pub skip_reason_key: String,
    /// Maximum nesting of factory resolutions.
    pub max_resolution_depth: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            continue_after_skip: true,
            skip_reason_key: SKIP_REASON.to_string(),
            max_resolution_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SessionOptions {
    /// Parses options from JSON; missing fields keep their defaults.
    ///
    /// ```rust
    /// use ferrous_fixtures::SessionOptions;
    ///
    /// let options = SessionOptions::from_json_str(r#"{ "continue_after_skip": false }"#).unwrap();
    /// assert!(!options.continue_after_skip);
    /// assert_eq!(options.skip_reason_key, "_SKIPREASON");
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DiResult<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| DiError::Config(format!("invalid session options: {e}")))?;
        options.validate()
    }

    /// Serializes the options as pretty JSON.
    #[cfg(feature = "config")]
    pub fn to_json_string(&self) -> DiResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiError::Config(e.to_string()))
    }

    /// Applies overrides from `FERROUS_FIXTURES_*` environment variables.
    pub fn with_env_overrides(self) -> DiResult<Self> {
        self.with_overrides(&EnvironmentConfigSource::with_prefix(ENV_PREFIX))
    }

    /// Applies overrides from any configuration source.
    pub fn with_overrides(mut self, source: &dyn ConfigSource) -> DiResult<Self> {
        if let Some(value) = source.get("continue_after_skip") {
            self.continue_after_skip = parse("continue_after_skip", &value)?;
        }
        if let Some(value) = source.get("skip_reason_key") {
            self.skip_reason_key = value;
        }
        if let Some(value) = source.get("max_resolution_depth") {
            self.max_resolution_depth = parse("max_resolution_depth", &value)?;
        }
        self.validate()
    }

    fn validate(self) -> DiResult<Self> {
        if self.skip_reason_key.trim().is_empty() {
            return Err(DiError::Config("skip_reason_key must not be empty".into()));
        }
        if self.max_resolution_depth == 0 {
            return Err(DiError::Config("max_resolution_depth must be at least 1".into()));
        }
        Ok(self)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> DiResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DiError::Config(format!("invalid value {value:?} for {key}: {e}")))
}

/// A source of raw option values.
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Raw value for `key`, if the source has one.
    fn get(&self, key: &str) -> Option<String>;
}

/// Environment variable configuration source
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    /// Prefix to filter environment variables
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(self.env_key(key)).ok()
    }
}

/// In-memory configuration source.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, String>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_overrides_are_parsed() {
        let source = MapConfigSource::new()
            .set("continue_after_skip", "false")
            .set("max_resolution_depth", " 32 ");
        let options = SessionOptions::default().with_overrides(&source).unwrap();

        assert!(!options.continue_after_skip);
        assert_eq!(options.max_resolution_depth, 32);
        assert_eq!(options.skip_reason_key, SKIP_REASON);
    }

    #[test]
    fn malformed_values_are_config_errors() {
        let source = MapConfigSource::new().set("continue_after_skip", "sometimes");
        let err = SessionOptions::default().with_overrides(&source).unwrap_err();
        assert!(matches!(err, DiError::Config(message) if message.contains("continue_after_skip")));
    }

    #[test]
    fn zero_depth_is_rejected() {
        let source = MapConfigSource::new().set("max_resolution_depth", "0");
        assert!(SessionOptions::default().with_overrides(&source).is_err());
    }

    #[test]
    fn env_keys_are_prefixed_and_uppercased() {
        let source = EnvironmentConfigSource::with_prefix("ferrous_fixtures");
        assert_eq!(source.env_key("skip_reason_key"), "FERROUS_FIXTURES_SKIP_REASON_KEY");
        assert_eq!(EnvironmentConfigSource::new().env_key("a"), "A");
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_round_trip_keeps_values() {
        let options = SessionOptions {
            continue_after_skip: false,
            skip_reason_key: "reason".into(),
            max_resolution_depth: 8,
        };
        let json = options.to_json_string().unwrap();
        assert_eq!(SessionOptions::from_json_str(&json).unwrap(), options);
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_errors_are_config_errors() {
        assert!(matches!(
            SessionOptions::from_json_str("{ \"max_resolution_depth\": -1 }"),
            Err(DiError::Config(_))
        ));
    }
}
