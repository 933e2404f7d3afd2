//! Plan construction from desired and remote state.
//!
//! Only read-only provider queries happen here. Whether a service already
//! exists decides between the creation path and the variable-diff path.

use tracing::{debug, info};

use crate::catalog::{ServiceCatalog, ServiceDescriptor, ServiceVariables};
use crate::config::{ConfigHasher, Credentials, PlanFingerprint, ResourceRequest};
use crate::error::Result;
use crate::provider::ProviderClient;

use super::diff::VariableDiff;
use super::plan::{Plan, PlanStep, RollbackAction};

/// Run-wide values every plan needs.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    /// Target environment.
    pub environment: &'a str,
    /// Target project.
    pub project_id: &'a str,
    /// Version reported to services.
    pub version: &'a str,
}

/// Builds plans against the current remote state.
pub struct PlanBuilder<'a, P: ProviderClient + ?Sized> {
    provider: &'a P,
    catalog: &'a ServiceCatalog,
}

impl<'a, P: ProviderClient + ?Sized> PlanBuilder<'a, P> {
    /// Creates a new plan builder.
    pub const fn new(provider: &'a P, catalog: &'a ServiceCatalog) -> Self {
        Self { provider, catalog }
    }

    /// Builds the plan for one service.
    ///
    /// # Errors
    ///
    /// Returns an error if a required secret or the shared cache is missing,
    /// or if a provider query fails.
    pub async fn build(
        &self,
        descriptor: &ServiceDescriptor,
        resources: &ResourceRequest,
        context: &PlanContext<'_>,
        credentials: &Credentials,
    ) -> Result<Plan> {
        let variables = ServiceVariables::resolve(
            self.catalog,
            descriptor,
            context.environment,
            context.version,
            credentials,
        )?;
        let remote_name = self.catalog.remote_name(descriptor.name);
        let checksum = plan_checksum(self.catalog, descriptor, resources, context.environment, &variables);

        let mut plan = Plan::new(
            descriptor.name,
            remote_name.as_str(),
            context.environment,
            context.project_id,
            checksum,
        );

        let existing = self
            .provider
            .get_service_by_name(&remote_name, context.project_id)
            .await?;

        let Some(existing) = existing else {
            let initial = variables.initial();
            info!("{remote_name} is new; creating with {} variables", initial.len());
            plan.push(
                PlanStep::CreateService {
                    repo: descriptor.repo.to_string(),
                    branch: descriptor.branch.to_string(),
                    variables: initial,
                },
                RollbackAction::DeleteService,
            );
            plan.push(
                PlanStep::ConnectSource {
                    repo: descriptor.repo.to_string(),
                    branch: descriptor.branch.to_string(),
                },
                RollbackAction::Nothing,
            );
            return Ok(plan);
        };

        debug!("{remote_name} exists as {}", existing.id);
        plan.service_id = Some(existing.id.clone());

        let desired = variables.dynamic_non_empty();
        if desired.is_empty() {
            return Ok(plan);
        }

        let environment_id = self
            .provider
            .get_environment_id(context.project_id, context.environment)
            .await?;
        let current = self
            .provider
            .get_service_variables(context.project_id, &environment_id, &existing.id)
            .await?;

        let diff = VariableDiff::between(&desired, &current);
        if diff.is_empty() {
            info!("{remote_name}: variables up to date");
            return Ok(plan);
        }

        info!("{remote_name}: {} changed variable(s): {}", diff.len(), diff.keys());
        plan.push(
            PlanStep::UpdateVariables {
                variables: diff.changed,
            },
            RollbackAction::RestoreVariables {
                previous: diff.previous,
                remove: diff.added,
            },
        );

        Ok(plan)
    }
}

/// Checksum of everything that determines a service's plan.
#[must_use]
pub fn plan_checksum(
    catalog: &ServiceCatalog,
    descriptor: &ServiceDescriptor,
    resources: &ResourceRequest,
    environment: &str,
    variables: &ServiceVariables,
) -> String {
    let remote_name = catalog.remote_name(descriptor.name);
    let desired = variables.initial();

    ConfigHasher::new().hash_plan(&PlanFingerprint {
        service: descriptor.name,
        remote_name: &remote_name,
        environment,
        repo: descriptor.repo,
        branch: descriptor.branch,
        resources,
        variables: &desired,
    })
}
