//! Provider client trait definition.
//!
//! This is the minimum surface the orchestrator needs from an
//! infrastructure provider. Every call is a single imperative operation;
//! the provider offers no multi-step transactions.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

use super::types::{CreateServiceRequest, ServiceInstance, ServiceRef, SharedCache};

/// Operations against a remote infrastructure provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Finds a service by its remote name.
    async fn get_service_by_name(&self, name: &str, project_id: &str) -> Result<Option<ServiceRef>>;

    /// Creates a service and returns its identifier.
    async fn create_service(&self, request: &CreateServiceRequest) -> Result<String>;

    /// Binds a service to a repository branch.
    async fn connect_service_repo(
        &self,
        service_id: &str,
        repo: &str,
        branch: &str,
        environment: &str,
    ) -> Result<()>;

    /// Resolves an environment name to its identifier.
    async fn get_environment_id(&self, project_id: &str, environment: &str) -> Result<String>;

    /// Returns the variables of a service in one environment.
    async fn get_service_variables(
        &self,
        project_id: &str,
        environment_id: &str,
        service_id: &str,
    ) -> Result<BTreeMap<String, String>>;

    /// Upserts variables of a service in one environment.
    async fn set_environment_variables(
        &self,
        service_id: &str,
        environment: &str,
        variables: &BTreeMap<String, String>,
        project_id: &str,
    ) -> Result<()>;

    /// Deletes variables of a service in one environment.
    async fn delete_variables(
        &self,
        service_id: &str,
        environment: &str,
        keys: &[String],
        project_id: &str,
    ) -> Result<()>;

    /// Deletes a service.
    async fn delete_service(&self, service_id: &str) -> Result<()>;

    /// Returns the shared cache of an environment, creating it if needed.
    async fn ensure_shared_cache(&self, environment: &str) -> Result<SharedCache>;

    /// Lists every service of a project.
    async fn list_services(&self, project_id: &str) -> Result<Vec<ServiceRef>>;

    /// Returns a service's instance in one environment, if it exists yet.
    async fn get_service_instance(
        &self,
        service_id: &str,
        environment_id: &str,
    ) -> Result<Option<ServiceInstance>>;

    /// Triggers a deployment and returns its identifier.
    ///
    /// Only valid once the provider has created the service instance.
    async fn deploy_service(
        &self,
        service_id: &str,
        environment: &str,
        project_id: &str,
    ) -> Result<String>;

    /// Runs an arbitrary GraphQL query.
    async fn run_query(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value>;
}
