//! Instance probing for Railway services.
//!
//! Railway creates a service instance and its first deployment on its own
//! schedule after `serviceCreate`. The inspector reads that state and can
//! poll it with a bounded backoff. It is a diagnostic utility; the
//! orchestrator never waits on it.

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result};

use super::api::ProviderClient;
use super::types::DeploymentStatus;

/// Aggregated health of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Running the latest deployment.
    Healthy,
    /// Not failed, but not serving yet.
    Degraded,
    /// Missing or failed.
    Unhealthy,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// What the provider knows about one service in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstanceDiagnosis {
    /// No service with that name exists.
    ServiceMissing,
    /// The service exists but has no instance in the environment yet.
    InstanceMissing {
        /// Remote service identifier.
        service_id: String,
    },
    /// The instance exists but is not bound to a repository or image.
    NoSource {
        /// Remote service identifier.
        service_id: String,
    },
    /// The instance is bound but has never deployed.
    AwaitingFirstDeployment {
        /// Remote service identifier.
        service_id: String,
    },
    /// The latest deployment of the instance.
    Deployment {
        /// Remote service identifier.
        service_id: String,
        /// Deployment identifier.
        deployment_id: String,
        /// Deployment status.
        status: DeploymentStatus,
    },
}

impl InstanceDiagnosis {
    /// Remote service identifier, if the service exists.
    #[must_use]
    pub fn service_id(&self) -> Option<&str> {
        match self {
            Self::ServiceMissing => None,
            Self::InstanceMissing { service_id }
            | Self::NoSource { service_id }
            | Self::AwaitingFirstDeployment { service_id }
            | Self::Deployment { service_id, .. } => Some(service_id),
        }
    }

    /// Maps the diagnosis onto a health state.
    #[must_use]
    pub fn health(&self) -> HealthState {
        match self {
            Self::ServiceMissing | Self::InstanceMissing { .. } | Self::NoSource { .. } => {
                HealthState::Unhealthy
            }
            Self::AwaitingFirstDeployment { .. } => HealthState::Degraded,
            Self::Deployment { status, .. } => match status {
                DeploymentStatus::Success => HealthState::Healthy,
                s if s.is_failed() => HealthState::Unhealthy,
                _ => HealthState::Degraded,
            },
        }
    }

    /// Returns true if a deployment can be triggered safely.
    #[must_use]
    pub const fn is_ready_for_trigger(&self) -> bool {
        matches!(
            self,
            Self::AwaitingFirstDeployment { .. } | Self::Deployment { .. }
        )
    }

    /// Returns true if polling should stop.
    fn is_settled(&self) -> bool {
        match self {
            Self::Deployment { status, .. } => !status.is_in_progress(),
            _ => false,
        }
    }
}

impl fmt::Display for InstanceDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceMissing => write!(f, "service does not exist"),
            Self::InstanceMissing { service_id } => {
                write!(f, "service {service_id} has no instance yet")
            }
            Self::NoSource { service_id } => {
                write!(f, "service {service_id} is not connected to a source")
            }
            Self::AwaitingFirstDeployment { service_id } => {
                write!(f, "service {service_id} is waiting for its first deployment")
            }
            Self::Deployment {
                service_id,
                deployment_id,
                status,
            } => write!(f, "service {service_id} deployment {deployment_id} is {status}"),
        }
    }
}

/// Backoff settings for [`InstanceInspector::wait_for_deployment`].
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Give up after this long.
    pub timeout: Duration,
    /// First delay between polls.
    pub initial_backoff: Duration,
    /// Upper bound for the delay.
    pub max_backoff: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl PollSettings {
    /// Settings with the given timeout and default backoff.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Inspects remote service instances.
pub struct InstanceInspector<'a, P: ProviderClient + ?Sized> {
    provider: &'a P,
    project_id: &'a str,
}

impl<'a, P: ProviderClient + ?Sized> InstanceInspector<'a, P> {
    /// Creates an inspector for a project.
    pub const fn new(provider: &'a P, project_id: &'a str) -> Self {
        Self {
            provider,
            project_id,
        }
    }

    /// Classifies the current state of a service.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider query fails.
    pub async fn diagnose(&self, remote_name: &str, environment: &str) -> Result<InstanceDiagnosis> {
        let Some(service) = self
            .provider
            .get_service_by_name(remote_name, self.project_id)
            .await?
        else {
            return Ok(InstanceDiagnosis::ServiceMissing);
        };

        let environment_id = self
            .provider
            .get_environment_id(self.project_id, environment)
            .await?;

        let Some(instance) = self
            .provider
            .get_service_instance(&service.id, &environment_id)
            .await?
        else {
            return Ok(InstanceDiagnosis::InstanceMissing {
                service_id: service.id,
            });
        };

        if instance.source.as_ref().is_none_or(|s| s.is_empty()) {
            return Ok(InstanceDiagnosis::NoSource {
                service_id: service.id,
            });
        }

        let diagnosis = match instance.latest_deployment {
            None => InstanceDiagnosis::AwaitingFirstDeployment {
                service_id: service.id,
            },
            Some(deployment) => InstanceDiagnosis::Deployment {
                service_id: service.id,
                deployment_id: deployment.id,
                status: deployment.status,
            },
        };

        debug!("{remote_name}: {diagnosis}");
        Ok(diagnosis)
    }

    /// Polls until the latest deployment leaves its in-progress states.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Timeout` if the deployment does not settle in
    /// time, or any provider error raised while polling.
    pub async fn wait_for_deployment(
        &self,
        remote_name: &str,
        environment: &str,
        settings: PollSettings,
    ) -> Result<InstanceDiagnosis> {
        let start = Instant::now();
        let mut backoff = settings.initial_backoff;

        loop {
            let diagnosis = self.diagnose(remote_name, environment).await?;

            if diagnosis.is_settled() {
                return Ok(diagnosis);
            }

            if start.elapsed() + backoff > settings.timeout {
                warn!("{remote_name} still not settled: {diagnosis}");
                return Err(ProviderError::Timeout {
                    service: remote_name.to_string(),
                    expected_state: String::from("a settled deployment"),
                }
                .into());
            }

            debug!("{remote_name}: {diagnosis}, polling again in {backoff:?}");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(settings.max_backoff);
        }
    }

    /// Triggers a deployment only if the instance exists with a source.
    ///
    /// Returns the deployment identifier, or `None` if the instance was not
    /// ready.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider call fails.
    pub async fn trigger_if_ready(&self, remote_name: &str, environment: &str) -> Result<Option<String>> {
        let diagnosis = self.diagnose(remote_name, environment).await?;

        if !diagnosis.is_ready_for_trigger() {
            warn!("Not triggering {remote_name}: {diagnosis}");
            return Ok(None);
        }

        let Some(service_id) = diagnosis.service_id() else {
            return Ok(None);
        };

        let deployment_id = self
            .provider
            .deploy_service(service_id, environment, self.project_id)
            .await?;
        info!("Triggered {remote_name}: deployment {deployment_id}");

        Ok(Some(deployment_id))
    }
}
