//! The Railway installer used for every catalog service.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{OPENAI_API_KEY, ServiceCatalog, ServiceDescriptor, ServiceVariables};
use crate::config::{
    ConfigHasher, Credentials, REQUIRED_PROVIDER_KEYS, ResourceRequest, ServiceConfig,
};
use crate::error::{PlanError, Result};
use crate::planner::{Plan, PlanBuilder, PlanContext, PlanExecutor, plan_checksum};
use crate::provider::{InstanceInspector, ProviderClient};

use super::Installer;
use super::types::{
    Dependency, DependencyKind, DeploymentReport, DeploymentResult, HealthReport, Permission,
    PermissionCheck, Requirements, estimate_monthly_cost,
};

const PERMISSIONS: &[(&str, &str)] = &[
    ("service", "read"),
    ("service", "create"),
    ("service", "connect"),
    ("service", "delete"),
    ("variables", "read"),
    ("variables", "write"),
    ("variables", "delete"),
    ("environment", "read"),
];

/// Installer for one catalog service on Railway.
pub struct RailwayServiceInstaller<P: ProviderClient + ?Sized> {
    provider: Arc<P>,
    catalog: Arc<ServiceCatalog>,
    descriptor: ServiceDescriptor,
    project_id: String,
    version: String,
    resources: ResourceRequest,
}

impl<P: ProviderClient + ?Sized> RailwayServiceInstaller<P> {
    /// Creates an installer for `descriptor`.
    #[must_use]
    pub fn new(
        provider: Arc<P>,
        catalog: Arc<ServiceCatalog>,
        descriptor: ServiceDescriptor,
        project_id: impl Into<String>,
        version: impl Into<String>,
        resources: ResourceRequest,
    ) -> Self {
        Self {
            provider,
            catalog,
            descriptor,
            project_id: project_id.into(),
            version: version.into(),
            resources,
        }
    }

    fn remote_name(&self) -> String {
        self.catalog.remote_name(self.descriptor.name)
    }

    fn context<'a>(&'a self, environment: &'a str) -> PlanContext<'a> {
        PlanContext {
            environment,
            project_id: &self.project_id,
            version: &self.version,
        }
    }

    fn dependencies(&self) -> Vec<Dependency> {
        let mut dependencies: Vec<Dependency> = self
            .descriptor
            .depends_on
            .iter()
            .map(|name| Dependency {
                kind: DependencyKind::Service,
                name: (*name).to_string(),
                required: true,
            })
            .collect();

        dependencies.push(Dependency {
            kind: DependencyKind::SharedCache,
            name: String::from("redis"),
            required: true,
        });

        let mut credentials: Vec<&str> = self
            .descriptor
            .secrets
            .iter()
            .map(|s| s.credential)
            .chain([OPENAI_API_KEY])
            .collect();
        credentials.sort_unstable();
        credentials.dedup();

        dependencies.extend(credentials.into_iter().map(|credential| Dependency {
            kind: DependencyKind::Secret,
            name: credential.to_string(),
            required: self.descriptor.required_secrets.contains(&credential),
        }));

        dependencies
    }
}

#[async_trait]
impl<P: ProviderClient + ?Sized> Installer for RailwayServiceInstaller<P> {
    async fn describe_requirements(&self, environment: &str) -> Result<Requirements> {
        debug!("Describing {} for {environment}", self.descriptor.name);

        Ok(Requirements {
            capability: self.descriptor.name.to_string(),
            version: self.version.clone(),
            repository: self.descriptor.repo_url(),
            branch: self.descriptor.branch.to_string(),
            port: self.descriptor.port,
            resources: self.resources,
            permissions: PERMISSIONS
                .iter()
                .map(|(resource, action)| Permission::railway(resource, action))
                .collect(),
            dependencies: self.dependencies(),
            estimated_monthly_cost: estimate_monthly_cost(&self.resources),
        })
    }

    async fn validate_permissions(
        &self,
        credentials: &Credentials,
        environment: &str,
    ) -> Result<PermissionCheck> {
        let mut errors: Vec<String> = credentials
            .missing(&REQUIRED_PROVIDER_KEYS)
            .into_iter()
            .map(|key| format!("missing credential '{key}'"))
            .collect();

        let missing = credentials.missing(self.descriptor.required_secrets);
        if !missing.is_empty() {
            errors.push(format!(
                "{} requires {} (missing: {})",
                self.descriptor.name,
                self.descriptor.required_secrets.join(" and "),
                missing.join(", ")
            ));
        }

        // Only reach out once the provider keys are known to be there
        if errors.is_empty() {
            if let Err(e) = self
                .provider
                .get_environment_id(&self.project_id, environment)
                .await
            {
                errors.push(e.to_string());
            }
        }

        if !errors.is_empty() {
            warn!("{}: {} permission problem(s)", self.descriptor.name, errors.len());
        }

        Ok(PermissionCheck::from_errors(errors))
    }

    async fn plan(
        &self,
        config: &ServiceConfig,
        environment: &str,
        credentials: &Credentials,
    ) -> Result<Plan> {
        PlanBuilder::new(&*self.provider, &self.catalog)
            .build(
                &self.descriptor,
                &config.resources,
                &self.context(environment),
                credentials,
            )
            .await
    }

    async fn deploy_full_lifecycle(
        &self,
        plan: &Plan,
        config: &ServiceConfig,
        credentials: &Credentials,
        environment: &str,
        auto_rollback: bool,
    ) -> Result<DeploymentReport> {
        let variables = ServiceVariables::resolve(
            &self.catalog,
            &self.descriptor,
            environment,
            &self.version,
            credentials,
        )?;
        let actual = plan_checksum(
            &self.catalog,
            &self.descriptor,
            &config.resources,
            environment,
            &variables,
        );

        if !ConfigHasher::hashes_match(&plan.checksum, &actual) {
            return Err(PlanError::ChecksumMismatch {
                service: self.descriptor.name.to_string(),
                expected: plan.checksum.clone(),
                actual,
            }
            .into());
        }

        let execution = PlanExecutor::new(&*self.provider)
            .with_rollback(auto_rollback)
            .execute(plan)
            .await;

        Ok(DeploymentReport {
            service: self.descriptor.name.to_string(),
            remote_name: plan.remote_name.clone(),
            environment: environment.to_string(),
            result: if execution.success {
                DeploymentResult::Success
            } else {
                DeploymentResult::Failure
            },
            service_id: execution.service_id,
            plan_id: Some(plan.plan_id),
            steps_applied: execution.applied,
            rolled_back: execution.rolled_back,
            error: execution.error.map(|e| e.to_string()),
            finished_at: Utc::now(),
        })
    }

    async fn verify(&self, environment: &str) -> Result<HealthReport> {
        let diagnosis = InstanceInspector::new(&*self.provider, &self.project_id)
            .diagnose(&self.remote_name(), environment)
            .await?;

        Ok(HealthReport {
            service: self.descriptor.name.to_string(),
            overall_status: diagnosis.health(),
            diagnosis: Some(diagnosis),
            error: None,
            checked_at: Utc::now(),
        })
    }
}
