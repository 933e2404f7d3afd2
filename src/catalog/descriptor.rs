//! Static service descriptors and the fixed deployment order.

use std::collections::BTreeSet;

use crate::error::{ConfigError, Result};

/// Default prefix for remote service names.
pub const DEFAULT_PREFIX: &str = "budai";

/// Default private network domain for service-to-service URLs.
pub const DEFAULT_INTERNAL_DOMAIN: &str = "railway.internal";

/// An environment variable that carries another service's internal URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLink {
    /// Variable name.
    pub variable: &'static str,
    /// Target service.
    pub target: &'static str,
}

/// An environment variable filled from a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretBinding {
    /// Variable name.
    pub variable: &'static str,
    /// Credential key.
    pub credential: &'static str,
}

/// One deployable unit, known ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Logical service name.
    pub name: &'static str,
    /// Source repository (`owner/name`).
    pub repo: &'static str,
    /// Source branch.
    pub branch: &'static str,
    /// Port the service listens on.
    pub port: u16,
    /// Services that must be processed before this one.
    pub depends_on: &'static [&'static str],
    /// URLs that are identical in every environment.
    pub static_links: &'static [ServiceLink],
    /// URLs that may move between environments.
    pub dynamic_links: &'static [ServiceLink],
    /// Variables filled from credentials; empty values are not sent.
    pub secrets: &'static [SecretBinding],
    /// Credentials that must all be present for this service to deploy.
    pub required_secrets: &'static [&'static str],
}

const fn link(variable: &'static str, target: &'static str) -> ServiceLink {
    ServiceLink { variable, target }
}

const fn secret(variable: &'static str, credential: &'static str) -> SecretBinding {
    SecretBinding {
        variable,
        credential,
    }
}

const fn service(name: &'static str, repo: &'static str, branch: &'static str, port: u16) -> ServiceDescriptor {
    ServiceDescriptor {
        name,
        repo,
        branch,
        port,
        depends_on: &[],
        static_links: &[],
        dynamic_links: &[],
        secrets: &[],
        required_secrets: &[],
    }
}

/// Built-in services, in deployment order.
const BUILTIN_SERVICES: &[ServiceDescriptor] = &[
    ServiceDescriptor {
        static_links: &[link("BUDAI_AGENT_SUMMARIZER_URL", "agent-summarizer")],
        dynamic_links: &[link("BUDAI_SLACK_INTEGRATION_URL", "slack-integration")],
        secrets: &[secret("BUDAI_SLACK_SIGNING_SECRET", "slack_signing_secret")],
        ..service("orchestrator", "binaryninja/budai-orchestrator", "master", 8001)
    },
    service("agent-summarizer", "binaryninja/budai-agent-summarizer", "master", 8002),
    service("agent-followup", "binaryninja/budai-agent-followup", "main", 8003),
    service("voice-realtime", "binaryninja/budai-voice-realtime", "main", 8005),
    ServiceDescriptor {
        depends_on: &["orchestrator"],
        static_links: &[link("BUDAI_ORCHESTRATOR_URL", "orchestrator")],
        dynamic_links: &[
            link("BUDAI_SLACK_INTEGRATION_URL", "slack-integration"),
            link("BUDAI_VOICE_REALTIME_URL", "voice-realtime"),
        ],
        secrets: &[
            secret("BUDAI_SLACK_SIGNING_SECRET", "slack_signing_secret"),
            secret("BUDAI_SLACK_BOT_TOKEN", "slack_bot_token"),
        ],
        ..service("api-gateway", "binaryninja/budai-api-gateway", "master", 8000)
    },
    ServiceDescriptor {
        depends_on: &["api-gateway"],
        static_links: &[link("BUDAI_API_GATEWAY_URL", "api-gateway")],
        dynamic_links: &[link("BUDAI_VOICE_REALTIME_URL", "voice-realtime")],
        secrets: &[
            secret("SLACK_BOT_TOKEN", "slack_bot_token"),
            secret("SLACK_SIGNING_SECRET", "slack_signing_secret"),
            secret("BUDAI_SLACK_BOT_TOKEN", "slack_bot_token"),
            secret("BUDAI_SLACK_SIGNING_SECRET", "slack_signing_secret"),
        ],
        required_secrets: &["slack_bot_token", "slack_signing_secret"],
        ..service("slack-integration", "binaryninja/budai-slack-integration", "main", 8006)
    },
    ServiceDescriptor {
        depends_on: &["voice-realtime"],
        ..service("voice-frontend", "binaryninja/budai-voice-frontend", "main", 3000)
    },
];

/// The registry of deployable services plus their fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCatalog {
    prefix: String,
    internal_domain: String,
    services: Vec<ServiceDescriptor>,
    order: Vec<String>,
}

impl ServiceCatalog {
    /// Creates a catalog and checks that the order is a valid rollout.
    ///
    /// # Errors
    ///
    /// Returns an error if the order names an unknown or duplicate service,
    /// places a service before one of its dependencies, or a link targets an
    /// unknown service.
    pub fn new(
        prefix: impl Into<String>,
        internal_domain: impl Into<String>,
        services: Vec<ServiceDescriptor>,
        order: Vec<String>,
    ) -> Result<Self> {
        let catalog = Self {
            prefix: prefix.into(),
            internal_domain: internal_domain.into(),
            services,
            order,
        };
        catalog.check()?;
        Ok(catalog)
    }

    /// Returns the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns an error only if the built-in table is inconsistent.
    pub fn builtin() -> Result<Self> {
        Self::new(
            DEFAULT_PREFIX,
            DEFAULT_INTERNAL_DOMAIN,
            BUILTIN_SERVICES.to_vec(),
            BUILTIN_SERVICES.iter().map(|s| s.name.to_string()).collect(),
        )
    }

    fn check(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for descriptor in &self.services {
            if !seen.insert(descriptor.name) {
                return Err(ConfigError::DuplicateService {
                    name: descriptor.name.to_string(),
                }
                .into());
            }
        }

        let mut processed: BTreeSet<&str> = BTreeSet::new();
        for name in &self.order {
            let descriptor = self.get(name).ok_or_else(|| ConfigError::UnknownService {
                name: name.clone(),
            })?;

            if processed.contains(name.as_str()) {
                return Err(ConfigError::DuplicateService { name: name.clone() }.into());
            }

            if let Some(dependency) = descriptor
                .depends_on
                .iter()
                .find(|dep| !processed.contains(**dep))
            {
                return Err(ConfigError::OrderViolation {
                    service: name.clone(),
                    dependency: (*dependency).to_string(),
                }
                .into());
            }

            for target in descriptor
                .static_links
                .iter()
                .chain(descriptor.dynamic_links)
                .map(|l| l.target)
            {
                if self.get(target).is_none() {
                    return Err(ConfigError::UnknownService {
                        name: target.to_string(),
                    }
                    .into());
                }
            }

            processed.insert(descriptor.name);
        }

        Ok(())
    }

    /// Looks up a descriptor by logical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Returns the deployment order.
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Iterates descriptors in deployment order.
    pub fn in_order(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.order.iter().filter_map(|name| self.get(name))
    }

    /// Returns every known service name.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.services.iter().map(|s| s.name).collect()
    }

    /// Returns the remote naming prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Remote name of a service: `<prefix>-<service>`.
    #[must_use]
    pub fn remote_name(&self, service: &str) -> String {
        format!("{}-{service}", self.prefix)
    }

    /// Private URL other services use to reach `descriptor`.
    #[must_use]
    pub fn internal_url(&self, descriptor: &ServiceDescriptor) -> String {
        format!(
            "http://{}.{}:{}",
            self.remote_name(descriptor.name),
            self.internal_domain,
            descriptor.port
        )
    }

    /// Private URL of a service by name, if known.
    #[must_use]
    pub fn internal_url_of(&self, service: &str) -> Option<String> {
        self.get(service).map(|d| self.internal_url(d))
    }
}

impl ServiceDescriptor {
    /// Public repository URL.
    #[must_use]
    pub fn repo_url(&self) -> String {
        format!("https://github.com/{}", self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_builtin_catalog_is_consistent() {
        let catalog = ServiceCatalog::builtin().expect("builtin catalog should be valid");

        assert_eq!(catalog.order().len(), 7);
        assert_eq!(catalog.order()[0], "orchestrator");
        assert_eq!(catalog.order()[6], "voice-frontend");
    }

    #[test]
    fn test_builtin_order_respects_dependencies() {
        let catalog = ServiceCatalog::builtin().expect("builtin catalog should be valid");
        let position = |name: &str| catalog.order().iter().position(|n| n == name);

        for descriptor in catalog.in_order() {
            for dependency in descriptor.depends_on {
                assert!(
                    position(*dependency) < position(descriptor.name),
                    "{} is processed before {dependency}",
                    descriptor.name
                );
            }
        }
    }

    #[test]
    fn test_order_violation_rejected() {
        let result = ServiceCatalog::new(
            DEFAULT_PREFIX,
            DEFAULT_INTERNAL_DOMAIN,
            BUILTIN_SERVICES.to_vec(),
            order(&[
                "api-gateway",
                "orchestrator",
                "agent-summarizer",
                "agent-followup",
                "voice-realtime",
                "slack-integration",
                "voice-frontend",
            ]),
        );

        assert!(matches!(
            result,
            Err(crate::error::DeployError::Config(ConfigError::OrderViolation { ref service, ref dependency }))
                if service == "api-gateway" && dependency == "orchestrator"
        ));
    }

    #[test]
    fn test_unknown_service_in_order_rejected() {
        let result = ServiceCatalog::new(
            DEFAULT_PREFIX,
            DEFAULT_INTERNAL_DOMAIN,
            vec![service("worker", "acme/worker", "main", 9000)],
            order(&["worker", "scheduler"]),
        );

        assert!(matches!(
            result,
            Err(crate::error::DeployError::Config(ConfigError::UnknownService { .. }))
        ));
    }

    #[test]
    fn test_duplicate_in_order_rejected() {
        let result = ServiceCatalog::new(
            DEFAULT_PREFIX,
            DEFAULT_INTERNAL_DOMAIN,
            vec![service("worker", "acme/worker", "main", 9000)],
            order(&["worker", "worker"]),
        );

        assert!(matches!(
            result,
            Err(crate::error::DeployError::Config(ConfigError::DuplicateService { .. }))
        ));
    }

    #[test]
    fn test_naming_conventions() {
        let catalog = ServiceCatalog::builtin().expect("builtin catalog should be valid");

        assert_eq!(catalog.remote_name("api-gateway"), "budai-api-gateway");
        assert_eq!(
            catalog.internal_url_of("orchestrator").as_deref(),
            Some("http://budai-orchestrator.railway.internal:8001")
        );
        assert_eq!(
            catalog.get("api-gateway").map(ServiceDescriptor::repo_url).as_deref(),
            Some("https://github.com/binaryninja/budai-api-gateway")
        );
    }
}
