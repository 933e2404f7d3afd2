//! Per-service installers.
//!
//! An installer owns the lifecycle of exactly one service: it describes
//! what the service needs, checks credentials, plans, deploys and verifies.
//! Implementations are registered statically by service name.

mod railway;
mod types;

use async_trait::async_trait;

use crate::config::{Credentials, ServiceConfig};
use crate::error::Result;
use crate::planner::Plan;

pub use railway::RailwayServiceInstaller;
pub use types::{
    Dependency, DependencyKind, DeploymentReport, DeploymentResult, HealthReport,
    MEMORY_GB_MONTHLY_USD, Permission, PermissionCheck, Requirements, VCPU_MONTHLY_USD,
    ValidationStatus, estimate_monthly_cost,
};

/// Lifecycle contract for one service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Installer: Send + Sync {
    /// Describes resources, permissions and dependencies.
    async fn describe_requirements(&self, environment: &str) -> Result<Requirements>;

    /// Checks credentials against the declared permissions.
    async fn validate_permissions(
        &self,
        credentials: &Credentials,
        environment: &str,
    ) -> Result<PermissionCheck>;

    /// Produces a checksummed plan.
    async fn plan(
        &self,
        config: &ServiceConfig,
        environment: &str,
        credentials: &Credentials,
    ) -> Result<Plan>;

    /// Executes a plan, rolling back on failure when allowed.
    async fn deploy_full_lifecycle(
        &self,
        plan: &Plan,
        config: &ServiceConfig,
        credentials: &Credentials,
        environment: &str,
        auto_rollback: bool,
    ) -> Result<DeploymentReport>;

    /// Checks post-deploy health.
    async fn verify(&self, environment: &str) -> Result<HealthReport>;
}
