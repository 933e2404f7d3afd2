//! Credential store.
//!
//! Credentials are a flat key/value map loaded from JSON. The orchestrator
//! owns them for the whole run and enriches them in place once shared
//! infrastructure has been provisioned.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{ConfigError, Result};

/// Railway API token.
pub const RAILWAY_TOKEN: &str = "railway_token";
/// Railway project identifier.
pub const RAILWAY_PROJECT_ID: &str = "railway_project_id";
/// Shared cache connection string.
pub const REDIS_URL: &str = "redis_url";
/// Shared cache password.
pub const REDIS_PASSWORD: &str = "redis_password";
/// Shared cache host.
pub const REDIS_HOST: &str = "redis_host";
/// Shared cache port.
pub const REDIS_PORT: &str = "redis_port";
/// Remote identifier of the shared cache service.
pub const REDIS_SERVICE_ID: &str = "redis_service_id";

/// Keys that must be present before any remote call.
pub const REQUIRED_PROVIDER_KEYS: [&str; 2] = [RAILWAY_TOKEN, RAILWAY_PROJECT_ID];

/// Mutable credential map.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    /// Creates an empty credential set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads credentials from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse_json(&content)
    }

    /// Parses credentials from a JSON object.
    ///
    /// Strings, numbers and booleans are stored as strings; nulls are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a JSON object of scalars.
    pub fn parse_json(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, Value> = serde_json::from_str(content)
            .map_err(|e| ConfigError::parse("credentials", e.to_string()))?;

        let mut values = BTreeMap::new();
        for (key, value) in raw {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ConfigError::parse(
                        "credentials",
                        format!("value of '{key}' must be a scalar"),
                    )
                    .into());
                }
            };
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns a value, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns a value or the empty string.
    #[must_use]
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// Returns true if the key is present with a non-empty value.
    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Inserts or replaces a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the sorted subset of `keys` that are absent or empty.
    #[must_use]
    pub fn missing<'a>(&self, keys: &[&'a str]) -> Vec<&'a str> {
        let mut missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|k| !self.has_value(k))
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Fails with a descriptive error if any provider key is missing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCredentials` naming the missing keys.
    pub fn require_provider_keys(&self) -> Result<()> {
        let missing = self.missing(&REQUIRED_PROVIDER_KEYS);
        if missing.is_empty() {
            return Ok(());
        }

        Err(ConfigError::MissingCredentials {
            keys: missing.into_iter().map(String::from).collect(),
        }
        .into())
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        let creds = Credentials::parse_json(
            r#"{"railway_token": "tok", "railway_project_id": "proj", "redis_port": 6379, "debug": true, "unused": null}"#,
        )
        .expect("credentials should parse");

        assert_eq!(creds.get(RAILWAY_TOKEN), Some("tok"));
        assert_eq!(creds.get(REDIS_PORT), Some("6379"));
        assert_eq!(creds.get("debug"), Some("true"));
        assert_eq!(creds.get("unused"), None);
        assert_eq!(creds.len(), 4);
    }

    #[test]
    fn test_parse_rejects_nested_values() {
        let result = Credentials::parse_json(r#"{"railway_token": {"nested": 1}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_require_provider_keys() {
        let creds = Credentials::new().with(RAILWAY_TOKEN, "tok");

        let err = creds
            .require_provider_keys()
            .expect_err("project id is missing");
        assert!(err.to_string().contains("missing: railway_project_id"));

        let creds = creds.with(RAILWAY_PROJECT_ID, "proj");
        assert!(creds.require_provider_keys().is_ok());
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let creds = Credentials::new()
            .with(RAILWAY_TOKEN, "")
            .with(RAILWAY_PROJECT_ID, "");

        assert_eq!(
            creds.missing(&REQUIRED_PROVIDER_KEYS),
            vec![RAILWAY_PROJECT_ID, RAILWAY_TOKEN]
        );
    }

    #[test]
    fn test_debug_redacts_values() {
        let creds = Credentials::new().with(RAILWAY_TOKEN, "super-secret");
        let debug = format!("{creds:?}");

        assert!(debug.contains("railway_token"));
        assert!(!debug.contains("super-secret"));
    }
}
