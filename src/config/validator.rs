//! Deployment spec validation.
//!
//! Collects every problem in a spec before anything is sent to the
//! provider. Unknown service names only warn: they are ignored by the
//! orchestrator rather than rejected.

use crate::error::{ConfigError, DeployError, Result};
use std::collections::BTreeSet;
use tracing::debug;
use validator::Validate;

use super::spec::{DeploymentSpec, ResourceRequest};

/// Validator for deployment specs.
#[derive(Debug, Default)]
pub struct SpecValidator {
    /// Service names that the catalog can deploy.
    known_services: BTreeSet<String>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl SpecValidator {
    /// Creates a validator that accepts the given service names.
    #[must_use]
    pub fn new<I, S>(known_services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_services: known_services.into_iter().map(Into::into).collect(),
        }
    }

    /// Validates a spec and returns every finding.
    #[must_use]
    pub fn check(&self, spec: &DeploymentSpec) -> ValidationResult {
        let mut result = ValidationResult::default();

        if spec.environment.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("environment"),
                message: String::from("Environment cannot be empty"),
            });
        } else if !is_valid_name(&spec.environment) {
            result.errors.push(ValidationError {
                field: String::from("environment"),
                message: format!(
                    "Environment '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    spec.environment
                ),
            });
        }

        if spec.version.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("version"),
                message: String::from("Version cannot be empty"),
            });
        }

        for (name, config) in &spec.services {
            if !self.known_services.contains(name) {
                result
                    .warnings
                    .push(format!("Service '{name}' is not in the catalog and will be ignored"));
                continue;
            }

            Self::check_resources(name, &config.resources, &mut result);
        }

        let enabled = self
            .known_services
            .iter()
            .filter(|name| spec.is_enabled(name))
            .count();
        if enabled == 0 {
            result
                .warnings
                .push(String::from("Every service is disabled; nothing will be deployed"));
        }

        result
    }

    /// Validates a spec, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, spec: &DeploymentSpec) -> Result<ValidationResult> {
        let result = self.check(spec);

        match result.errors.first() {
            None => {
                debug!("Spec validation passed with {} warning(s)", result.warnings.len());
                Ok(result)
            }
            Some(first) => Err(DeployError::Config(ConfigError::validation(
                first.message.clone(),
                first.field.clone(),
            ))),
        }
    }

    fn check_resources(name: &str, resources: &ResourceRequest, result: &mut ValidationResult) {
        if let Err(errors) = resources.validate() {
            result.errors.push(ValidationError {
                field: format!("services.{name}.resources"),
                message: format!("Invalid resources for '{name}': {errors}"),
            });
        }
    }
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks if a name is valid (lowercase alphanumeric with hyphens).
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}
