//! Railway API client implementation.
//!
//! This module provides the HTTP client for the Railway GraphQL API and
//! implements [`ProviderClient`] on top of it.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::catalog::DEFAULT_INTERNAL_DOMAIN;
use crate::error::{DeployError, ProviderError, Result};

use super::api::ProviderClient;
use super::types::{CreateServiceRequest, ServiceInstance, ServiceRef, ServiceSource, SharedCache};

/// Railway API endpoint.
pub const RAILWAY_API_URL: &str = "https://backboard.railway.app/graphql/v2";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Default remote name of the shared cache.
pub const DEFAULT_CACHE_SERVICE: &str = "budai-redis";

/// Image the shared cache runs.
const CACHE_IMAGE: &str = "bitnami/redis:7.2";

/// Port the shared cache listens on.
const CACHE_PORT: u16 = 6379;

/// Variable holding the cache password on the cache service.
const CACHE_PASSWORD_VAR: &str = "REDIS_PASSWORD";

/// Railway API client.
#[derive(Debug, Clone)]
pub struct RailwayClient {
    /// HTTP client.
    client: Client,
    /// API token.
    token: String,
    /// Project the client works in.
    project_id: String,
    /// GraphQL endpoint.
    endpoint: String,
    /// Remote name of the shared cache service.
    cache_service_name: String,
}

/// GraphQL request structure.
#[derive(Debug, Serialize)]
struct GraphQLRequest {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<serde_json::Value>,
}

/// GraphQL response structure.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

/// GraphQL error structure.
#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

/// Relay-style connection.
#[derive(Debug, Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

impl<T> Connection<T> {
    fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|e| e.node).collect()
    }
}

#[derive(Debug, Deserialize)]
struct EnvironmentNode {
    id: String,
    name: String,
}

impl RailwayClient {
    /// Creates a new Railway API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token: &str, project_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: token.to_string(),
            project_id: project_id.to_string(),
            endpoint: RAILWAY_API_URL.to_string(),
            cache_service_name: DEFAULT_CACHE_SERVICE.to_string(),
        })
    }

    /// Points the client at another GraphQL endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the remote name of the shared cache service.
    #[must_use]
    pub fn with_cache_service_name(mut self, name: impl Into<String>) -> Self {
        self.cache_service_name = name.into();
        self
    }

    /// Returns the project identifier.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Replaces the HTTP client with one using the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(self)
    }

    /// Executes a GraphQL operation, retrying transient failures.
    ///
    /// Queries are retried on rate limits and network failures. Mutations are
    /// retried only on rate limits, since a network failure may hide a
    /// committed write.
    async fn execute<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<T> {
        let request = GraphQLRequest {
            query: query.to_string(),
            variables,
        };
        let mutation = is_mutation(query);

        let mut attempt = 1;
        loop {
            let error = match self.execute_once::<T>(&request).await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            let rate_limited = error.retry_delay_secs().is_some();
            if attempt >= MAX_RETRIES || !error.is_retryable() || (mutation && !rate_limited) {
                return Err(error);
            }

            let delay = error.retry_delay_secs().map_or_else(
                || Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)),
                Duration::from_secs,
            );
            debug!("Retry attempt {attempt} of {MAX_RETRIES} in {delay:?}: {error}");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Executes a single GraphQL request.
    async fn execute_once<T: for<'de> Deserialize<'de>>(
        &self,
        request: &GraphQLRequest,
    ) -> Result<T> {
        trace!("Executing GraphQL query: {}", request.query);

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::AuthenticationFailed {
                message: String::from("Invalid or unauthorized API token"),
            }
            .into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api_error(status.as_u16(), body).into());
        }

        let gql_response: GraphQLResponse<T> = response.json().await.map_err(|e| {
            ProviderError::invalid_response(format!("Failed to parse response: {e}"))
        })?;

        if let Some(errors) = gql_response.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::api_error(400, message).into());
        }

        gql_response
            .data
            .ok_or_else(|| ProviderError::invalid_response("No data in response").into())
    }
}

/// Returns true if the GraphQL document is a mutation.
fn is_mutation(query: &str) -> bool {
    query.trim_start().starts_with("mutation")
}

#[async_trait]
impl ProviderClient for RailwayClient {
    async fn get_service_by_name(&self, name: &str, project_id: &str) -> Result<Option<ServiceRef>> {
        let services = self.list_services(project_id).await?;
        Ok(services.into_iter().find(|s| s.name == name))
    }

    async fn create_service(&self, request: &CreateServiceRequest) -> Result<String> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "serviceCreate")]
            service: ServiceRef,
        }

        let query = r"
            mutation ServiceCreate($input: ServiceCreateInput!) {
                serviceCreate(input: $input) {
                    id
                    name
                }
            }
        ";

        let environment_id = self
            .get_environment_id(&request.project_id, &request.environment)
            .await?;

        let mut input = serde_json::json!({
            "projectId": request.project_id,
            "name": request.name,
            "environmentId": environment_id,
        });

        match &request.source {
            ServiceSource::Repo { repo, branch } => {
                input["source"] = serde_json::json!({ "repo": repo });
                input["branch"] = serde_json::json!(branch);
            }
            ServiceSource::Image { image } => {
                input["source"] = serde_json::json!({ "image": image });
            }
        }

        if let Some(variables) = &request.variables {
            input["variables"] = serde_json::json!(variables);
        }

        let variables = serde_json::json!({ "input": input });
        let response: Response = self.execute(query, Some(variables)).await?;

        info!("Created service {} ({})", response.service.name, response.service.id);
        Ok(response.service.id)
    }

    async fn connect_service_repo(
        &self,
        service_id: &str,
        repo: &str,
        branch: &str,
        environment: &str,
    ) -> Result<()> {
        let query = r"
            mutation ServiceConnect($id: String!, $input: ServiceConnectInput!) {
                serviceConnect(id: $id, input: $input) {
                    id
                }
            }
        ";

        debug!("Connecting {service_id} to {repo}@{branch} for {environment}");

        let variables = serde_json::json!({
            "id": service_id,
            "input": { "repo": repo, "branch": branch },
        });
        let _: serde_json::Value = self.execute(query, Some(variables)).await?;

        Ok(())
    }

    async fn get_environment_id(&self, project_id: &str, environment: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Response {
            project: Project,
        }
        #[derive(Deserialize)]
        struct Project {
            environments: Connection<EnvironmentNode>,
        }

        let query = r"
            query ProjectEnvironments($projectId: String!) {
                project(id: $projectId) {
                    environments {
                        edges {
                            node {
                                id
                                name
                            }
                        }
                    }
                }
            }
        ";

        let variables = serde_json::json!({ "projectId": project_id });
        let response: Response = self.execute(query, Some(variables)).await?;

        response
            .project
            .environments
            .into_nodes()
            .into_iter()
            .find(|e| e.name == environment)
            .map(|e| e.id)
            .ok_or_else(|| {
                ProviderError::EnvironmentNotFound {
                    name: environment.to_string(),
                    project_id: project_id.to_string(),
                }
                .into()
            })
    }

    async fn get_service_variables(
        &self,
        project_id: &str,
        environment_id: &str,
        service_id: &str,
    ) -> Result<BTreeMap<String, String>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            variables: Option<BTreeMap<String, String>>,
        }

        let query = r"
            query ServiceVariables($projectId: String!, $environmentId: String!, $serviceId: String) {
                variables(projectId: $projectId, environmentId: $environmentId, serviceId: $serviceId)
            }
        ";

        let variables = serde_json::json!({
            "projectId": project_id,
            "environmentId": environment_id,
            "serviceId": service_id,
        });
        let response: Response = self.execute(query, Some(variables)).await?;

        Ok(response.variables.unwrap_or_default())
    }

    async fn set_environment_variables(
        &self,
        service_id: &str,
        environment: &str,
        variables: &BTreeMap<String, String>,
        project_id: &str,
    ) -> Result<()> {
        let query = r"
            mutation VariableCollectionUpsert($input: VariableCollectionUpsertInput!) {
                variableCollectionUpsert(input: $input)
            }
        ";

        let environment_id = self.get_environment_id(project_id, environment).await?;

        let request = serde_json::json!({
            "input": {
                "projectId": project_id,
                "environmentId": environment_id,
                "serviceId": service_id,
                "variables": variables,
            }
        });
        let _: serde_json::Value = self.execute(query, Some(request)).await?;

        debug!("Upserted {} variable(s) on {service_id}", variables.len());
        Ok(())
    }

    async fn delete_variables(
        &self,
        service_id: &str,
        environment: &str,
        keys: &[String],
        project_id: &str,
    ) -> Result<()> {
        let query = r"
            mutation VariableDelete($input: VariableDeleteInput!) {
                variableDelete(input: $input)
            }
        ";

        let environment_id = self.get_environment_id(project_id, environment).await?;

        for key in keys {
            let request = serde_json::json!({
                "input": {
                    "projectId": project_id,
                    "environmentId": environment_id,
                    "serviceId": service_id,
                    "name": key,
                }
            });
            let _: serde_json::Value = self.execute(query, Some(request)).await?;
        }

        Ok(())
    }

    async fn delete_service(&self, service_id: &str) -> Result<()> {
        let query = r"
            mutation ServiceDelete($id: String!) {
                serviceDelete(id: $id)
            }
        ";

        let variables = serde_json::json!({ "id": service_id });
        let _: serde_json::Value = self.execute(query, Some(variables)).await?;

        info!("Deleted service {service_id}");
        Ok(())
    }

    async fn ensure_shared_cache(&self, environment: &str) -> Result<SharedCache> {
        let name = self.cache_service_name.as_str();
        let project_id = self.project_id.as_str();

        let (service_id, password) = match self.get_service_by_name(name, project_id).await? {
            Some(existing) => {
                debug!("Reusing shared cache {} ({})", existing.name, existing.id);
                let environment_id = self.get_environment_id(project_id, environment).await?;
                let vars = self
                    .get_service_variables(project_id, &environment_id, &existing.id)
                    .await?;
                let password = match vars.get(CACHE_PASSWORD_VAR) {
                    Some(password) => password.clone(),
                    None => {
                        info!("Provisioning shared cache {name} in {environment}");
                        let password = uuid::Uuid::new_v4().simple().to_string();
                        let update =
                            BTreeMap::from([(CACHE_PASSWORD_VAR.to_string(), password.clone())]);
                        self.set_environment_variables(&existing.id, environment, &update, project_id)
                            .await?;
                        password
                    }
                };
                (existing.id, password)
            }
            None => {
                info!("Creating shared cache {name} in {environment}");
                let password = uuid::Uuid::new_v4().simple().to_string();
                let request = CreateServiceRequest::from_image(name, project_id, CACHE_IMAGE, environment)
                    .with_variables(BTreeMap::from([(
                        CACHE_PASSWORD_VAR.to_string(),
                        password.clone(),
                    )]));
                let id = self.create_service(&request).await?;
                (id, password)
            }
        };

        let host = format!("{name}.{DEFAULT_INTERNAL_DOMAIN}");
        Ok(SharedCache {
            url: format!("redis://default:{password}@{host}:{CACHE_PORT}"),
            host,
            port: CACHE_PORT,
            password,
            service_id,
        })
    }

    async fn list_services(&self, project_id: &str) -> Result<Vec<ServiceRef>> {
        #[derive(Deserialize)]
        struct Response {
            project: Project,
        }
        #[derive(Deserialize)]
        struct Project {
            services: Connection<ServiceRef>,
        }

        let query = r"
            query ProjectServices($projectId: String!) {
                project(id: $projectId) {
                    services {
                        edges {
                            node {
                                id
                                name
                            }
                        }
                    }
                }
            }
        ";

        let variables = serde_json::json!({ "projectId": project_id });
        let response: Response = self.execute(query, Some(variables)).await?;

        Ok(response.project.services.into_nodes())
    }

    async fn get_service_instance(
        &self,
        service_id: &str,
        environment_id: &str,
    ) -> Result<Option<ServiceInstance>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "serviceInstance", default)]
            instance: Option<ServiceInstance>,
        }

        let query = r"
            query InstanceStatus($serviceId: String!, $environmentId: String!) {
                serviceInstance(serviceId: $serviceId, environmentId: $environmentId) {
                    id
                    environmentId
                    source {
                        repo
                        image
                    }
                    latestDeployment {
                        id
                        status
                        createdAt
                    }
                }
            }
        ";

        let variables = serde_json::json!({
            "serviceId": service_id,
            "environmentId": environment_id,
        });

        match self.execute::<Response>(query, Some(variables)).await {
            Ok(response) => Ok(response.instance),
            Err(DeployError::Provider(ProviderError::ApiRequestFailed { message, .. }))
                if message.to_lowercase().contains("not found") =>
            {
                debug!("No instance of {service_id} in {environment_id} yet");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn deploy_service(
        &self,
        service_id: &str,
        environment: &str,
        project_id: &str,
    ) -> Result<String> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "serviceInstanceDeployV2")]
            deployment_id: String,
        }

        let query = r"
            mutation TriggerDeploy($serviceId: String!, $environmentId: String!) {
                serviceInstanceDeployV2(serviceId: $serviceId, environmentId: $environmentId)
            }
        ";

        let environment_id = self.get_environment_id(project_id, environment).await?;

        let variables = serde_json::json!({
            "serviceId": service_id,
            "environmentId": environment_id,
        });
        let response: Response = self.execute(query, Some(variables)).await?;

        info!("Triggered deployment {} for {service_id}", response.deployment_id);
        Ok(response.deployment_id)
    }

    async fn run_query(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.execute(query, variables).await
    }
}
