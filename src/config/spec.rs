//! Deployment specification types.
//!
//! These structs map to the YAML deployment spec. The spec is loaded once
//! per run and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// The root deployment specification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentSpec {
    /// Target environment name (e.g., "production", "staging").
    pub environment: String,
    /// Optional region preference.
    #[serde(default)]
    pub region: Option<String>,
    /// Version reported to every service as `BUDAI_SERVICE_VERSION`.
    #[serde(default = "default_version")]
    pub version: String,
    /// Per-service desired state, keyed by logical service name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

/// Desired state for a single service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Whether the service should be deployed.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Resource request.
    #[serde(default)]
    pub resources: ResourceRequest,
}

/// Resource sizing for one service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ResourceRequest {
    /// Memory in megabytes.
    #[serde(default = "default_memory_mb")]
    #[validate(range(min = 128, max = 32768))]
    pub memory_mb: u32,
    /// CPU in millicores (1000 = one vCPU).
    #[serde(default = "default_cpu_millicores")]
    #[validate(range(min = 100, max = 32000))]
    pub cpu_millicores: u32,
    /// Number of replicas.
    #[serde(default = "default_replicas")]
    #[validate(range(min = 1, max = 20))]
    pub replicas: u32,
}

// Default value functions

const fn default_enabled() -> bool {
    true
}

const fn default_memory_mb() -> u32 {
    512
}

const fn default_cpu_millicores() -> u32 {
    500
}

const fn default_replicas() -> u32 {
    1
}

fn default_version() -> String {
    String::from("1.0.0")
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
            cpu_millicores: default_cpu_millicores(),
            replicas: default_replicas(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            resources: ResourceRequest::default(),
        }
    }
}

impl DeploymentSpec {
    /// Creates an empty spec for the given environment.
    #[must_use]
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            region: None,
            version: default_version(),
            services: BTreeMap::new(),
        }
    }

    /// Adds or replaces the config of a service.
    #[must_use]
    pub fn with_service(mut self, name: impl Into<String>, config: ServiceConfig) -> Self {
        self.services.insert(name.into(), config);
        self
    }

    /// Returns the effective config of a service.
    ///
    /// A service without an entry is enabled with default resources.
    #[must_use]
    pub fn service_config(&self, name: &str) -> ServiceConfig {
        self.services.get(name).cloned().unwrap_or_default()
    }

    /// Returns true if the service is enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.services.get(name).is_none_or(|c| c.enabled)
    }
}

impl ServiceConfig {
    /// Returns a disabled service config.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl ResourceRequest {
    /// Memory in gigabytes.
    #[must_use]
    pub fn memory_gb(&self) -> f64 {
        f64::from(self.memory_mb) / 1024.0
    }

    /// CPU in whole vCPUs.
    #[must_use]
    pub fn vcpus(&self) -> f64 {
        f64::from(self.cpu_millicores) / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_service_is_enabled_with_defaults() {
        let spec = DeploymentSpec::new("production");

        assert!(spec.is_enabled("orchestrator"));
        assert_eq!(spec.service_config("orchestrator"), ServiceConfig::default());
    }

    #[test]
    fn test_disabled_service() {
        let spec = DeploymentSpec::new("production")
            .with_service("voice-frontend", ServiceConfig::disabled());

        assert!(!spec.is_enabled("voice-frontend"));
        assert!(spec.is_enabled("api-gateway"));
    }

    #[test]
    fn test_resource_defaults() {
        let resources = ResourceRequest::default();

        assert_eq!(resources.memory_mb, 512);
        assert_eq!(resources.cpu_millicores, 500);
        assert_eq!(resources.replicas, 1);
        assert!((resources.memory_gb() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resource_range_validation() {
        let resources = ResourceRequest {
            memory_mb: 64,
            cpu_millicores: 500,
            replicas: 0,
        };

        let errors = resources.validate();
        assert!(errors.is_err());
    }
}
