//! Run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::ConfigHasher;
use crate::installer::DeploymentReport;
use crate::provider::{ProviderClient, SharedCache};

use super::DeploymentOrchestrator;

/// Shared resources provisioned during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraArtifacts {
    /// The shared cache.
    pub shared_cache: SharedCache,
    /// When it was provisioned or looked up.
    pub provisioned_at: DateTime<Utc>,
}

impl InfraArtifacts {
    /// Records a shared cache.
    #[must_use]
    pub fn new(shared_cache: SharedCache) -> Self {
        Self {
            shared_cache,
            provisioned_at: Utc::now(),
        }
    }
}

/// Aggregate of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Target environment.
    pub environment: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Checksum of the deployment spec.
    pub spec_checksum: String,
    /// Enabled services in the catalog.
    pub total: usize,
    /// Services a deployment was attempted for.
    pub deployed: usize,
    /// Successful deployments.
    pub succeeded: usize,
    /// Failed deployments.
    pub failed: usize,
    /// Infrastructure provisioned by the run.
    pub infrastructure: Option<InfraArtifacts>,
    /// Per-service reports in processing order.
    pub reports: Vec<DeploymentReport>,
}

impl RunReport {
    /// Returns true if nothing failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} deployed, {} succeeded, {} failed (of {} enabled)",
            self.environment, self.deployed, self.succeeded, self.failed, self.total
        )
    }
}

impl<P: ProviderClient + ?Sized + 'static> DeploymentOrchestrator<P> {
    /// Aggregates the reports accumulated so far.
    #[must_use]
    pub fn generate_report(&self) -> RunReport {
        let succeeded = self.reports.iter().filter(|r| r.is_success()).count();

        RunReport {
            run_id: Uuid::new_v4(),
            environment: self.environment.clone(),
            generated_at: Utc::now(),
            spec_checksum: ConfigHasher::new().hash_spec(&self.spec),
            total: self.enabled_services().len(),
            deployed: self.reports.len(),
            succeeded,
            failed: self.reports.len() - succeeded,
            infrastructure: self.infra.clone(),
            reports: self.reports.clone(),
        }
    }
}
