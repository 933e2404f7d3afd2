//! Value types exchanged with installers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::ResourceRequest;
use crate::provider::{HealthState, InstanceDiagnosis};

/// Monthly price of one gigabyte of memory, in dollars.
pub const MEMORY_GB_MONTHLY_USD: f64 = 10.0;

/// Monthly price of one vCPU, in dollars.
pub const VCPU_MONTHLY_USD: f64 = 20.0;

/// What a service needs in order to be deployed.
#[derive(Debug, Clone, Serialize)]
pub struct Requirements {
    /// Capability name (the service name).
    pub capability: String,
    /// Version that will be deployed.
    pub version: String,
    /// Source repository URL.
    pub repository: String,
    /// Source branch.
    pub branch: String,
    /// Port the service listens on.
    pub port: u16,
    /// Requested resources.
    pub resources: ResourceRequest,
    /// Provider permissions the deployment uses.
    pub permissions: Vec<Permission>,
    /// Things that must exist first.
    pub dependencies: Vec<Dependency>,
    /// Estimated minimum monthly cost in dollars.
    pub estimated_monthly_cost: f64,
}

/// A provider permission triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permission {
    /// Provider name.
    pub provider: String,
    /// Resource kind.
    pub resource: String,
    /// Action on the resource.
    pub action: String,
}

/// Kind of dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Another service in the catalog.
    Service,
    /// Shared infrastructure.
    SharedCache,
    /// A credential.
    Secret,
}

/// A declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// Kind of dependency.
    pub kind: DependencyKind,
    /// What is needed.
    pub name: String,
    /// Whether deployment fails without it.
    pub required: bool,
}

/// Outcome of permission validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Everything checked out.
    Valid,
    /// At least one check failed.
    Invalid,
}

/// Result of validating credentials for one service.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionCheck {
    /// Overall status.
    pub status: ValidationStatus,
    /// Every failed check.
    pub validation_errors: Vec<String>,
}

/// Final result of a service deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentResult {
    /// The service was deployed.
    Success,
    /// The deployment failed.
    Failure,
}

/// Per-service deployment outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    /// Logical service name.
    pub service: String,
    /// Remote service name.
    pub remote_name: String,
    /// Target environment.
    pub environment: String,
    /// Result.
    pub result: DeploymentResult,
    /// Remote identifier, if known.
    pub service_id: Option<String>,
    /// Plan that was executed, if any.
    pub plan_id: Option<Uuid>,
    /// Steps applied.
    pub steps_applied: usize,
    /// Rollback actions that succeeded.
    pub rolled_back: usize,
    /// Error message on failure.
    pub error: Option<String>,
    /// When the deployment finished.
    pub finished_at: DateTime<Utc>,
}

/// Post-deploy health of one service.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Logical service name.
    pub service: String,
    /// Aggregated status.
    pub overall_status: HealthState,
    /// What the provider reported.
    pub diagnosis: Option<InstanceDiagnosis>,
    /// Error raised while checking.
    pub error: Option<String>,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}

/// Estimated monthly cost of a resource request.
#[must_use]
pub fn estimate_monthly_cost(resources: &ResourceRequest) -> f64 {
    f64::from(resources.replicas)
        * resources
            .memory_gb()
            .mul_add(MEMORY_GB_MONTHLY_USD, resources.vcpus() * VCPU_MONTHLY_USD)
}

impl Permission {
    /// Creates a Railway permission.
    #[must_use]
    pub fn railway(resource: &str, action: &str) -> Self {
        Self {
            provider: String::from("railway"),
            resource: resource.to_string(),
            action: action.to_string(),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.resource, self.action)
    }
}

impl PermissionCheck {
    /// Builds a check from collected errors.
    #[must_use]
    pub fn from_errors(validation_errors: Vec<String>) -> Self {
        let status = if validation_errors.is_empty() {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid
        };
        Self {
            status,
            validation_errors,
        }
    }

    /// Returns true if every check passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }
}

impl DeploymentReport {
    /// Report for a service that failed before or during execution.
    #[must_use]
    pub fn failed(service: &str, remote_name: &str, environment: &str, error: impl fmt::Display) -> Self {
        Self {
            service: service.to_string(),
            remote_name: remote_name.to_string(),
            environment: environment.to_string(),
            result: DeploymentResult::Failure,
            service_id: None,
            plan_id: None,
            steps_applied: 0,
            rolled_back: 0,
            error: Some(error.to_string()),
            finished_at: Utc::now(),
        }
    }

    /// Returns true if the deployment succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result == DeploymentResult::Success
    }
}

impl HealthReport {
    /// Report for a service whose check could not complete.
    #[must_use]
    pub fn failed(service: &str, error: impl fmt::Display) -> Self {
        Self {
            service: service.to_string(),
            overall_status: HealthState::Unhealthy,
            diagnosis: None,
            error: Some(error.to_string()),
            checked_at: Utc::now(),
        }
    }
}

impl fmt::Display for DeploymentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}
