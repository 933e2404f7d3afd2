//! Error types for the railyard orchestrator.
//!
//! Errors are grouped by the layer that raises them: configuration and
//! credentials, the remote provider, plan construction and execution,
//! orchestration policy, and local report persistence.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for railyard.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Configuration or credential errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote provider errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Plan construction or execution errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Orchestration policy errors.
    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    /// Report persistence errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration and credential errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A spec or credentials file was not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A spec or credentials file could not be parsed.
    #[error("Failed to parse {what}: {message}")]
    ParseError {
        /// Which document failed to parse.
        what: String,
        /// Description of the parse error.
        message: String,
    },

    /// Validation failed.
    #[error("Validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Required provider credentials are missing.
    #[error("Railway credentials required (missing: {})", .keys.join(", "))]
    MissingCredentials {
        /// Sorted names of the missing keys.
        keys: Vec<String>,
    },

    /// A name in the deployment order has no descriptor.
    #[error("Unknown service in catalog: {name}")]
    UnknownService {
        /// The unknown service name.
        name: String,
    },

    /// A service is ordered before one of its hard dependencies.
    #[error("Service '{service}' is ordered before its dependency '{dependency}'")]
    OrderViolation {
        /// The dependent service.
        service: String,
        /// The dependency that must come first.
        dependency: String,
    },

    /// A service appears twice in the catalog or the order.
    #[error("Duplicate service name: {name}")]
    DuplicateService {
        /// The duplicated name.
        name: String,
    },
}

/// Remote provider errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication failed.
    #[error("Railway authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Railway API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("Railway API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with Railway: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from Railway API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// Environment name does not exist in the project.
    #[error("Environment '{name}' not found in project {project_id}")]
    EnvironmentNotFound {
        /// Requested environment name.
        name: String,
        /// Project that was searched.
        project_id: String,
    },

    /// Timeout waiting for a remote state.
    #[error("Timeout waiting for {service} to reach state {expected_state}")]
    Timeout {
        /// Remote service name.
        service: String,
        /// Expected state that was not reached.
        expected_state: String,
    },
}

/// Plan construction and execution errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A service requires secrets that the credentials do not carry.
    #[error("{service} requires credentials {} (missing: {})", .required.join(" and "), .missing.join(", "))]
    MissingSecrets {
        /// Service that needs the secrets.
        service: String,
        /// All secrets the service requires.
        required: Vec<String>,
        /// The subset that is missing.
        missing: Vec<String>,
    },

    /// Shared infrastructure has not been provisioned.
    #[error("Shared infrastructure not ready: credential '{key}' is missing")]
    MissingSharedInfrastructure {
        /// Credential key that should have been written by provisioning.
        key: String,
    },

    /// The plan no longer matches the configuration that produced it.
    #[error("Plan for {service} has drifted: checksum {expected} != {actual}")]
    ChecksumMismatch {
        /// Service whose plan drifted.
        service: String,
        /// Checksum carried by the plan.
        expected: String,
        /// Checksum of the current configuration.
        actual: String,
    },

    /// A plan step failed.
    #[error("Step '{step}' failed for {service}: {reason}")]
    StepFailed {
        /// Service being deployed.
        service: String,
        /// Description of the step.
        step: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Orchestration policy errors.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// No installer is registered for an enabled service.
    #[error("No installer available for service '{service}'")]
    InstallerUnavailable {
        /// Service without an installer.
        service: String,
    },

    /// An advanced-flow operation was called before installers were loaded.
    #[error("Installers have not been loaded")]
    InstallersNotLoaded,

    /// A lifecycle failure with rollback disabled stopped the run.
    #[error("Deployment halted at '{service}': {reason}")]
    Halted {
        /// Service whose failure stopped the run.
        service: String,
        /// Reason for the failure.
        reason: String,
    },
}

/// Report persistence errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// Stored report is corrupted.
    #[error("Stored report is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("Report serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// Writing a report failed.
    #[error("Failed to write report: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },
}

/// Result type alias for railyard operations.
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider(
                ProviderError::RateLimited { .. } | ProviderError::NetworkError { .. }
            )
        )
    }

    /// Returns the delay the server asked for before a retry, in seconds.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Provider(ProviderError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error for the named document.
    #[must_use]
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            what: what.into(),
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}
