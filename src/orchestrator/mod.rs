//! The deployment orchestrator.
//!
//! Drives every catalog service through explain, validate, plan, deploy,
//! verify and report. Services are processed one at a time in the
//! catalog's deployment order, so a later service can rely on the remote
//! records and credentials produced by earlier ones.

mod explain;
mod lifecycle;
mod reconcile;
mod report;

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{ServiceCatalog, ServiceDescriptor};
use crate::config::{
    Credentials, DeploymentSpec, RAILWAY_PROJECT_ID, RAILWAY_TOKEN, REDIS_HOST, REDIS_PASSWORD,
    REDIS_PORT, REDIS_SERVICE_ID, REDIS_URL, resolve_environment,
};
use crate::error::{OrchestrationError, Result};
use crate::installer::{DeploymentReport, Installer, RailwayServiceInstaller};
use crate::provider::{ProviderClient, RailwayClient};

pub use explain::{ExplainEntry, Explanation};
pub use lifecycle::{HealthSummary, PermissionSummary, ServicePermissions};
pub use reconcile::dashboard_url;
pub use report::{InfraArtifacts, RunReport};

/// Installers keyed by service name.
pub type InstallerMap = BTreeMap<String, Box<dyn Installer>>;

/// Construction options.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Environment that replaces the spec's value when non-empty.
    pub environment_override: Option<String>,
    /// Catalog to use instead of the built-in one.
    pub catalog: Option<ServiceCatalog>,
}

/// Sequences deployments across all services.
pub struct DeploymentOrchestrator<P: ProviderClient + ?Sized + 'static> {
    spec: DeploymentSpec,
    credentials: Credentials,
    provider: Arc<P>,
    catalog: Arc<ServiceCatalog>,
    environment: String,
    project_id: String,
    installers: Option<InstallerMap>,
    reports: Vec<DeploymentReport>,
    infra: Option<InfraArtifacts>,
}

impl DeploymentOrchestrator<RailwayClient> {
    /// Creates an orchestrator talking to the Railway API.
    ///
    /// # Errors
    ///
    /// Returns an error if provider credentials are missing or the client
    /// cannot be built.
    pub fn connect(
        spec: DeploymentSpec,
        credentials: Credentials,
        options: OrchestratorOptions,
    ) -> Result<Self> {
        credentials.require_provider_keys()?;

        let client = RailwayClient::new(
            credentials.get_or_empty(RAILWAY_TOKEN),
            credentials.get_or_empty(RAILWAY_PROJECT_ID),
        )?;

        Self::new(spec, credentials, Arc::new(client), options)
    }
}

impl<P: ProviderClient + ?Sized + 'static> DeploymentOrchestrator<P> {
    /// Creates an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCredentials` if the provider token or
    /// project id is absent, or an error if the catalog is inconsistent.
    pub fn new(
        spec: DeploymentSpec,
        credentials: Credentials,
        provider: Arc<P>,
        options: OrchestratorOptions,
    ) -> Result<Self> {
        credentials.require_provider_keys()?;

        let catalog = match options.catalog {
            Some(catalog) => catalog,
            None => ServiceCatalog::builtin()?,
        };
        let environment = resolve_environment(&spec, options.environment_override.as_deref());
        let project_id = credentials.get_or_empty(RAILWAY_PROJECT_ID).to_string();

        info!(
            "Orchestrating {} service(s) into environment '{environment}'",
            catalog.order().len()
        );

        Ok(Self {
            spec,
            credentials,
            provider,
            catalog: Arc::new(catalog),
            environment,
            project_id,
            installers: None,
            reports: Vec::new(),
            infra: None,
        })
    }

    /// Registers the Railway installer for every catalog service.
    ///
    /// # Errors
    ///
    /// Returns an error if an enabled service ends up without an installer.
    pub fn load_installers(&mut self) -> Result<()> {
        let installers: InstallerMap = self
            .catalog
            .in_order()
            .map(|descriptor| {
                let installer: Box<dyn Installer> = Box::new(RailwayServiceInstaller::new(
                    Arc::clone(&self.provider),
                    Arc::clone(&self.catalog),
                    *descriptor,
                    self.project_id.as_str(),
                    self.spec.version.as_str(),
                    self.spec.service_config(descriptor.name).resources,
                ));
                (descriptor.name.to_string(), installer)
            })
            .collect();

        self.set_installers(installers)
    }

    /// Registers installers explicitly.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::InstallerUnavailable` if an enabled
    /// service has no installer.
    pub fn set_installers(&mut self, installers: InstallerMap) -> Result<()> {
        if let Some(missing) = self
            .enabled_services()
            .into_iter()
            .find(|d| !installers.contains_key(d.name))
        {
            return Err(OrchestrationError::InstallerUnavailable {
                service: missing.name.to_string(),
            }
            .into());
        }

        debug!("Loaded {} installer(s)", installers.len());
        self.installers = Some(installers);
        Ok(())
    }

    /// Ensures the shared cache exists and publishes it in the credentials.
    ///
    /// Does nothing if the credentials already carry a cache URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot provision the cache.
    pub async fn prepare_infrastructure(&mut self) -> Result<()> {
        if self.credentials.has_value(REDIS_URL) {
            debug!("Shared cache already configured; skipping provisioning");
            return Ok(());
        }

        info!("Ensuring shared cache for environment '{}'", self.environment);
        let cache = self.provider.ensure_shared_cache(&self.environment).await?;

        self.credentials.set(REDIS_URL, cache.url.as_str());
        self.credentials.set(REDIS_PASSWORD, cache.password.as_str());
        self.credentials.set(REDIS_HOST, cache.host.as_str());
        self.credentials.set(REDIS_PORT, cache.port.to_string());
        self.credentials.set(REDIS_SERVICE_ID, cache.service_id.as_str());

        info!(
            "Shared cache ready at {} (service {})",
            cache.masked_url(),
            cache.service_id
        );
        self.infra = Some(InfraArtifacts::new(cache));
        Ok(())
    }

    /// Enabled catalog services in deployment order.
    fn enabled_services(&self) -> Vec<ServiceDescriptor> {
        self.catalog
            .in_order()
            .filter(|d| self.spec.is_enabled(d.name))
            .copied()
            .collect()
    }

    fn installers(&self) -> Result<&InstallerMap> {
        self.installers
            .as_ref()
            .ok_or_else(|| OrchestrationError::InstallersNotLoaded.into())
    }

    /// Resolved environment name.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Target project.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Current credentials, including provisioned infrastructure.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The deployment spec.
    #[must_use]
    pub const fn spec(&self) -> &DeploymentSpec {
        &self.spec
    }

    /// The service catalog.
    #[must_use]
    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// The provider client.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Reports accumulated so far.
    #[must_use]
    pub fn reports(&self) -> &[DeploymentReport] {
        &self.reports
    }

    /// Infrastructure provisioned by this run.
    #[must_use]
    pub const fn infrastructure(&self) -> Option<&InfraArtifacts> {
        self.infra.as_ref()
    }

    /// Returns true once installers are registered.
    #[must_use]
    pub const fn installers_loaded(&self) -> bool {
        self.installers.is_some()
    }
}
