//! Reconciling deploy of every enabled service.
//!
//! Each service is planned against remote state and executed without
//! rollback. A failing service is logged and recorded, and the loop moves
//! on to the next one.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::catalog::ServiceDescriptor;
use crate::error::Result;
use crate::installer::{DeploymentReport, DeploymentResult};
use crate::planner::{ExecutionResult, Plan, PlanBuilder, PlanContext, PlanExecutor};
use crate::provider::ProviderClient;

use super::DeploymentOrchestrator;

/// Railway dashboard URL of a service.
#[must_use]
pub fn dashboard_url(project_id: &str, service_id: &str) -> String {
    format!("https://railway.com/project/{project_id}/service/{service_id}")
}

impl<P: ProviderClient + ?Sized + 'static> DeploymentOrchestrator<P> {
    /// Deploys every enabled service in order.
    ///
    /// Returns true if every attempted service succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error only if the shared cache cannot be provisioned.
    /// Per-service failures are recorded and reported through the result.
    pub async fn deploy_all(&mut self) -> Result<bool> {
        info!("Deploying services to '{}'", self.environment);

        let mut all_success = true;
        let mut infra_ready = false;

        for descriptor in self.catalog.in_order().copied().collect::<Vec<_>>() {
            if !self.spec.is_enabled(descriptor.name) {
                info!("⊘ {}: disabled, skipping", descriptor.name);
                continue;
            }

            if !infra_ready {
                self.prepare_infrastructure().await?;
                infra_ready = true;
            }

            info!("--- Deploying {} ---", descriptor.name);
            let remote_name = self.catalog.remote_name(descriptor.name);

            let report = match self.reconcile_service(&descriptor).await {
                Ok((plan, execution)) => {
                    self.log_success(&plan, &execution);
                    DeploymentReport {
                        service: descriptor.name.to_string(),
                        remote_name,
                        environment: self.environment.clone(),
                        result: DeploymentResult::Success,
                        service_id: execution.service_id,
                        plan_id: Some(plan.plan_id),
                        steps_applied: execution.applied,
                        rolled_back: 0,
                        error: None,
                        finished_at: Utc::now(),
                    }
                }
                Err(e) => {
                    error!("✗ {}: {e}", descriptor.name);
                    all_success = false;
                    DeploymentReport::failed(descriptor.name, &remote_name, &self.environment, &e)
                }
            };

            self.reports.push(report);
        }

        if let Some(infra) = &self.infra {
            info!(
                "Shared cache: {} (host {}, port {}, service {})",
                infra.shared_cache.masked_url(),
                infra.shared_cache.host,
                infra.shared_cache.port,
                infra.shared_cache.service_id
            );
        }

        if all_success {
            info!("All services deployed");
        } else {
            error!("One or more services failed to deploy");
        }

        Ok(all_success)
    }

    async fn reconcile_service(&self, descriptor: &ServiceDescriptor) -> Result<(Plan, ExecutionResult)> {
        let config = self.spec.service_config(descriptor.name);
        let context = PlanContext {
            environment: &self.environment,
            project_id: &self.project_id,
            version: &self.spec.version,
        };

        let plan = PlanBuilder::new(&*self.provider, &self.catalog)
            .build(descriptor, &config.resources, &context, &self.credentials)
            .await?;

        let execution = PlanExecutor::new(&*self.provider)
            .execute(&plan)
            .await
            .into_result()?;

        Ok((plan, execution))
    }

    fn log_success(&self, plan: &Plan, execution: &ExecutionResult) {
        let dashboard = execution
            .service_id
            .as_deref()
            .map(|id| dashboard_url(&self.project_id, id))
            .unwrap_or_default();

        if plan.creates_service() {
            info!(
                "✓ {}: created; Railway deploys it once the instance is ready {dashboard}",
                plan.service
            );
        } else if let Some(step) = plan.steps.first() {
            info!("✓ {}: {step} {dashboard}", plan.service);
        } else {
            info!("✓ {}: no changes {dashboard}", plan.service);
        }
    }

    /// Checks that every enabled service exists remotely.
    ///
    /// # Errors
    ///
    /// Never fails; lookup errors count as a missing service.
    pub async fn verify_all(&self) -> Result<bool> {
        info!("Verifying services in '{}'", self.environment);
        let mut all_present = true;

        for descriptor in self.enabled_services() {
            let remote_name = self.catalog.remote_name(descriptor.name);

            match self
                .provider
                .get_service_by_name(&remote_name, &self.project_id)
                .await
            {
                Ok(Some(service)) => info!("✓ {}: present ({})", descriptor.name, service.id),
                Ok(None) => {
                    warn!("✗ {}: not found", descriptor.name);
                    all_present = false;
                }
                Err(e) => {
                    error!("✗ {}: {e}", descriptor.name);
                    all_present = false;
                }
            }
        }

        Ok(all_present)
    }
}
