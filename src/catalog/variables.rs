//! Static and dynamic environment variables for one service.
//!
//! Static variables never change between environments (identity, port and
//! fixed internal URLs). Dynamic variables depend on the environment or on
//! credentials and are the only ones compared against remote state when a
//! service already exists.

use std::collections::BTreeMap;

use crate::config::{Credentials, REDIS_URL};
use crate::error::{PlanError, Result};

use super::descriptor::{ServiceCatalog, ServiceDescriptor};

/// Credential holding the optional `OpenAI` key.
pub const OPENAI_API_KEY: &str = "openai_api_key";

/// Resolved variables for one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceVariables {
    /// Variables identical in every environment.
    pub static_vars: BTreeMap<String, String>,
    /// Variables that may change between runs or environments.
    pub dynamic_vars: BTreeMap<String, String>,
}

impl ServiceVariables {
    /// Resolves the variables of `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::MissingSecrets` if a required secret is absent and
    /// `PlanError::MissingSharedInfrastructure` if the shared cache has not
    /// been provisioned.
    pub fn resolve(
        catalog: &ServiceCatalog,
        descriptor: &ServiceDescriptor,
        environment: &str,
        version: &str,
        credentials: &Credentials,
    ) -> Result<Self> {
        let missing = credentials.missing(descriptor.required_secrets);
        if !missing.is_empty() {
            return Err(PlanError::MissingSecrets {
                service: descriptor.name.to_string(),
                required: descriptor
                    .required_secrets
                    .iter()
                    .map(|s| (*s).to_string())
                    .collect(),
                missing: missing.into_iter().map(String::from).collect(),
            }
            .into());
        }

        let redis_url = credentials
            .get(REDIS_URL)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PlanError::MissingSharedInfrastructure {
                key: REDIS_URL.to_string(),
            })?;

        let mut static_vars = BTreeMap::from([
            (String::from("BUDAI_SERVICE_NAME"), descriptor.name.to_string()),
            (String::from("BUDAI_SERVICE_VERSION"), version.to_string()),
            (String::from("PORT"), descriptor.port.to_string()),
        ]);
        for link in descriptor.static_links {
            if let Some(url) = catalog.internal_url_of(link.target) {
                static_vars.insert(link.variable.to_string(), url);
            }
        }

        let mut dynamic_vars = BTreeMap::from([
            (String::from("BUDAI_ENVIRONMENT"), environment.to_string()),
            (String::from("BUDAI_REDIS_URL"), redis_url.to_string()),
            (
                String::from("BUDAI_OPENAI_API_KEY"),
                credentials.get_or_empty(OPENAI_API_KEY).to_string(),
            ),
        ]);
        for link in descriptor.dynamic_links {
            if let Some(url) = catalog.internal_url_of(link.target) {
                dynamic_vars.insert(link.variable.to_string(), url);
            }
        }
        for binding in descriptor.secrets {
            dynamic_vars.insert(
                binding.variable.to_string(),
                credentials.get_or_empty(binding.credential).to_string(),
            );
        }

        Ok(Self {
            static_vars,
            dynamic_vars,
        })
    }

    /// Dynamic variables with empty values removed.
    #[must_use]
    pub fn dynamic_non_empty(&self) -> BTreeMap<String, String> {
        self.dynamic_vars
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Full variable set sent when a service is created.
    #[must_use]
    pub fn initial(&self) -> BTreeMap<String, String> {
        let mut vars = self.static_vars.clone();
        vars.extend(self.dynamic_non_empty());
        vars
    }
}
