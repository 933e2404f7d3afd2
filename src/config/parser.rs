//! Deployment spec parser.
//!
//! Loads the YAML spec and the optional `.env` file that sits next to it.

use crate::error::{ConfigError, DeployError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::DeploymentSpec;

/// Environment variable that overrides the spec's target environment.
pub const TARGET_ENV_VAR: &str = "BUDAI_TARGET_ENV";

/// Parser for deployment specs.
#[derive(Debug, Default)]
pub struct SpecParser {
    /// Base path used to locate `.env`.
    base_path: Option<PathBuf>,
}

impl SpecParser {
    /// Creates a new spec parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a spec from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeploymentSpec> {
        let path = path.as_ref();
        info!("Loading deployment spec from: {}", path.display());

        if !path.exists() {
            return Err(DeployError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(ConfigError::parse(
                path.display().to_string(),
                format!("failed to read file: {e}"),
            ))
        })?;

        self.parse_yaml(&content)
    }

    /// Parses a spec from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str) -> Result<DeploymentSpec> {
        debug!("Parsing YAML deployment spec");

        let spec: DeploymentSpec = serde_yaml::from_str(content)
            .map_err(|e| DeployError::Config(ConfigError::parse("deployment spec", e.to_string())))?;

        debug!(
            "Parsed spec for environment '{}' with {} service entries",
            spec.environment,
            spec.services.len()
        );
        Ok(spec)
    }

    /// Loads the `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                DeployError::Config(ConfigError::parse(
                    env_path.display().to_string(),
                    format!("failed to load .env file: {e}"),
                ))
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Resolves the effective environment name.
///
/// A non-empty override wins over the spec value.
#[must_use]
pub fn resolve_environment(spec: &DeploymentSpec, override_env: Option<&str>) -> String {
    match override_env.map(str::trim) {
        Some(env) if !env.is_empty() => {
            debug!("Environment override '{env}' replaces spec value '{}'", spec.environment);
            env.to_string()
        }
        _ => spec.environment.clone(),
    }
}

/// Returns the target environment override.
///
/// The command-line value wins. Otherwise [`TARGET_ENV_VAR`] is read from the
/// process environment, so call this after [`SpecParser::load_dotenv`].
#[must_use]
pub fn target_env_override(flag: Option<&str>) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| std::env::var(TARGET_ENV_VAR).ok())
}
