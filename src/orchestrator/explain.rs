//! Requirement explanation.

use serde::Serialize;
use tracing::info;

use crate::config::ResourceRequest;
use crate::error::{OrchestrationError, Result};
use crate::installer::Requirements;
use crate::provider::ProviderClient;

use super::DeploymentOrchestrator;

/// One service in an explanation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExplainEntry {
    /// The service is disabled in the spec.
    Disabled {
        /// Logical service name.
        service: String,
    },
    /// What the catalog declares about the service.
    Declared {
        /// Logical service name.
        service: String,
        /// Repository URL.
        repository: String,
        /// Source branch.
        branch: String,
        /// Port.
        port: u16,
        /// Requested resources.
        resources: ResourceRequest,
    },
    /// What the service's installer reports.
    Described(Box<Requirements>),
}

/// Requirements of every catalog service.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    /// Environment the explanation applies to.
    pub environment: String,
    /// Region preference from the spec.
    pub region: Option<String>,
    /// One entry per catalog service, in deployment order.
    pub entries: Vec<ExplainEntry>,
    /// Sum of installer cost estimates over enabled services.
    pub total_monthly_cost: f64,
}

impl Explanation {
    /// Number of enabled services.
    #[must_use]
    pub fn services_to_deploy(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !matches!(entry, ExplainEntry::Disabled { .. }))
            .count()
    }
}

impl<P: ProviderClient + ?Sized + 'static> DeploymentOrchestrator<P> {
    /// Explains what each service needs.
    ///
    /// Uses installer requirements when installers are loaded, otherwise the
    /// catalog declarations. Disabled services are listed but never costed.
    ///
    /// # Errors
    ///
    /// Returns an error if an installer fails to describe its service.
    pub async fn explain_requirements(&self) -> Result<Explanation> {
        let mut entries = Vec::new();
        let mut total_monthly_cost = 0.0;

        for descriptor in self.catalog.in_order() {
            if !self.spec.is_enabled(descriptor.name) {
                info!("Service: {} (DISABLED)", descriptor.name);
                entries.push(ExplainEntry::Disabled {
                    service: descriptor.name.to_string(),
                });
                continue;
            }

            let Some(installers) = self.installers.as_ref() else {
                info!(
                    "Service: {} ({}@{}, port {})",
                    descriptor.name,
                    descriptor.repo_url(),
                    descriptor.branch,
                    descriptor.port
                );
                entries.push(ExplainEntry::Declared {
                    service: descriptor.name.to_string(),
                    repository: descriptor.repo_url(),
                    branch: descriptor.branch.to_string(),
                    port: descriptor.port,
                    resources: self.spec.service_config(descriptor.name).resources,
                });
                continue;
            };

            let installer = installers.get(descriptor.name).ok_or_else(|| {
                OrchestrationError::InstallerUnavailable {
                    service: descriptor.name.to_string(),
                }
            })?;
            let requirements = installer.describe_requirements(&self.environment).await?;

            info!(
                "Service: {} (~${:.2}/month)",
                descriptor.name, requirements.estimated_monthly_cost
            );
            total_monthly_cost += requirements.estimated_monthly_cost;
            entries.push(ExplainEntry::Described(Box::new(requirements)));
        }

        Ok(Explanation {
            environment: self.environment.clone(),
            region: self.spec.region.clone(),
            entries,
            total_monthly_cost,
        })
    }
}
