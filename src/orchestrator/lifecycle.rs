//! Installer-driven lifecycle: validate, plan, deploy with rollback, verify.
//!
//! Unlike the reconciling deploy, a lifecycle failure with rollback
//! disabled stops the whole run, since later services may depend on the
//! one that failed.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::config::ConfigHasher;
use crate::error::{OrchestrationError, Result};
use crate::installer::{DeploymentReport, HealthReport, PermissionCheck};
use crate::planner::Plan;
use crate::provider::{HealthState, ProviderClient};

use super::DeploymentOrchestrator;

/// Permission check of one service.
#[derive(Debug, Clone, Serialize)]
pub struct ServicePermissions {
    /// Logical service name.
    pub service: String,
    /// Check result.
    pub check: PermissionCheck,
}

/// Permission checks of every enabled service.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionSummary {
    /// One entry per enabled service, in deployment order.
    pub services: Vec<ServicePermissions>,
}

impl PermissionSummary {
    /// Returns true if every service is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.services.iter().all(|s| s.check.is_valid())
    }
}

/// Health of every enabled service.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    /// Healthy only if every service is healthy.
    pub overall: HealthState,
    /// One report per enabled service, in deployment order.
    pub services: Vec<HealthReport>,
}

impl<P: ProviderClient + ?Sized + 'static> DeploymentOrchestrator<P> {
    /// Validates credentials for every enabled service.
    ///
    /// A failing service does not stop validation of the others.
    ///
    /// # Errors
    ///
    /// Returns an error if installers are not loaded.
    pub async fn validate_permissions(&self) -> Result<PermissionSummary> {
        let installers = self.installers()?;
        let mut summary = PermissionSummary::default();

        for descriptor in self.enabled_services() {
            let check = match installers.get(descriptor.name) {
                Some(installer) => installer
                    .validate_permissions(&self.credentials, &self.environment)
                    .await
                    .unwrap_or_else(|e| PermissionCheck::from_errors(vec![e.to_string()])),
                None => PermissionCheck::from_errors(vec![format!(
                    "no installer for '{}'",
                    descriptor.name
                )]),
            };

            if check.is_valid() {
                info!("✓ {}: permissions valid", descriptor.name);
            } else {
                for problem in &check.validation_errors {
                    warn!("✗ {}: {problem}", descriptor.name);
                }
            }

            summary.services.push(ServicePermissions {
                service: descriptor.name.to_string(),
                check,
            });
        }

        Ok(summary)
    }

    /// Provisions shared infrastructure, then plans every enabled service.
    ///
    /// # Errors
    ///
    /// Returns an error if installers are not loaded, provisioning fails, or
    /// any service cannot be planned.
    pub async fn generate_plans(&mut self) -> Result<BTreeMap<String, Plan>> {
        self.installers()?;
        self.prepare_infrastructure().await?;

        let installers = self.installers()?;
        let mut plans = BTreeMap::new();

        for descriptor in self.enabled_services() {
            let installer = installers.get(descriptor.name).ok_or_else(|| {
                OrchestrationError::InstallerUnavailable {
                    service: descriptor.name.to_string(),
                }
            })?;

            let config = self.spec.service_config(descriptor.name);
            let plan = installer
                .plan(&config, &self.environment, &self.credentials)
                .await?;

            info!(
                "Planned {}: {} step(s), checksum {}",
                descriptor.name,
                plan.step_count(),
                ConfigHasher::new().short_hash(&plan.checksum)
            );
            plans.insert(descriptor.name.to_string(), plan);
        }

        Ok(plans)
    }

    /// Runs the full lifecycle deploy for every planned service.
    ///
    /// Returns true if every service succeeded. With `auto_rollback` off,
    /// the first failure stops the run.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::Halted` when a service fails with
    /// rollback disabled, or an error if installers are not loaded.
    pub async fn deploy_planned(
        &mut self,
        plans: &BTreeMap<String, Plan>,
        auto_rollback: bool,
    ) -> Result<bool> {
        let services = self.enabled_services();
        let installers = self
            .installers
            .as_ref()
            .ok_or(OrchestrationError::InstallersNotLoaded)?;

        let mut all_success = true;

        for descriptor in services {
            let Some(plan) = plans.get(descriptor.name) else {
                continue;
            };
            let installer = installers.get(descriptor.name).ok_or_else(|| {
                OrchestrationError::InstallerUnavailable {
                    service: descriptor.name.to_string(),
                }
            })?;

            info!("--- Deploying {} ---", descriptor.name);
            let config = self.spec.service_config(descriptor.name);

            let report = installer
                .deploy_full_lifecycle(
                    plan,
                    &config,
                    &self.credentials,
                    &self.environment,
                    auto_rollback,
                )
                .await
                .unwrap_or_else(|e| {
                    DeploymentReport::failed(descriptor.name, &plan.remote_name, &self.environment, e)
                });

            if report.is_success() {
                info!("✓ {}: deployed", descriptor.name);
                self.reports.push(report);
                continue;
            }

            all_success = false;
            let reason = report.error.clone().unwrap_or_default();
            error!("✗ {}: {reason}", descriptor.name);
            self.reports.push(report);

            if !auto_rollback {
                error!("Rollback disabled; halting remaining deployments");
                return Err(OrchestrationError::Halted {
                    service: descriptor.name.to_string(),
                    reason,
                }
                .into());
            }
        }

        Ok(all_success)
    }

    /// Checks the health of every enabled service.
    ///
    /// # Errors
    ///
    /// Returns an error if installers are not loaded.
    pub async fn verify_health(&self) -> Result<HealthSummary> {
        let installers = self.installers()?;
        let mut services = Vec::new();

        for descriptor in self.enabled_services() {
            let report = match installers.get(descriptor.name) {
                Some(installer) => installer
                    .verify(&self.environment)
                    .await
                    .unwrap_or_else(|e| HealthReport::failed(descriptor.name, e)),
                None => HealthReport::failed(descriptor.name, "no installer"),
            };

            match report.overall_status {
                HealthState::Healthy => info!("✓ {}: healthy", descriptor.name),
                state => warn!("✗ {}: {state}", descriptor.name),
            }
            services.push(report);
        }

        let overall = if services.iter().all(|r| r.overall_status == HealthState::Healthy) {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };

        Ok(HealthSummary { overall, services })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeploymentSpec, REDIS_URL, ServiceConfig};
    use crate::error::{DeployError, ProviderError};
    use crate::installer::{DeploymentResult, MockInstaller, ValidationStatus};
    use crate::orchestrator::InstallerMap;
    use crate::orchestrator::tests::{credentials, orchestrator};
    use crate::provider::{InstanceDiagnosis, MockProviderClient};
    use chrono::Utc;

    const SERVICES: [&str; 3] = ["orchestrator", "agent-summarizer", "agent-followup"];

    fn spec() -> DeploymentSpec {
        ["voice-realtime", "api-gateway", "slack-integration", "voice-frontend"]
            .into_iter()
            .fold(DeploymentSpec::new("production"), |spec, name| {
                spec.with_service(name, ServiceConfig::disabled())
            })
    }

    fn deployer(installers: InstallerMap) -> crate::orchestrator::DeploymentOrchestrator<MockProviderClient> {
        let creds = credentials().with(REDIS_URL, "redis://default:pw@budai-redis.railway.internal:6379");
        let mut orchestrator = orchestrator(spec(), creds, MockProviderClient::new());
        orchestrator
            .set_installers(installers)
            .expect("installers should register");
        orchestrator
    }

    fn plan(service: &str) -> Plan {
        Plan::new(service, format!("budai-{service}"), "production", "proj", "abc")
    }

    fn plans() -> BTreeMap<String, Plan> {
        SERVICES
            .iter()
            .map(|s| ((*s).to_string(), plan(s)))
            .collect()
    }

    fn report(service: &str, result: DeploymentResult) -> DeploymentReport {
        DeploymentReport {
            service: service.to_string(),
            remote_name: format!("budai-{service}"),
            environment: String::from("production"),
            result,
            service_id: Some(format!("svc-{service}")),
            plan_id: None,
            steps_applied: 1,
            rolled_back: 0,
            error: (result == DeploymentResult::Failure).then(|| String::from("step failed")),
            finished_at: Utc::now(),
        }
    }

    fn deploying(service: &'static str, result: DeploymentResult, times: usize) -> Box<dyn crate::installer::Installer> {
        let mut installer = MockInstaller::new();
        installer
            .expect_deploy_full_lifecycle()
            .times(times)
            .returning(move |_, _, _, _, _| Ok(report(service, result)));
        Box::new(installer)
    }

    #[tokio::test]
    async fn test_halt_without_rollback() {
        let mut installers = InstallerMap::new();
        installers.insert(
            String::from("orchestrator"),
            deploying("orchestrator", DeploymentResult::Success, 1),
        );
        installers.insert(
            String::from("agent-summarizer"),
            deploying("agent-summarizer", DeploymentResult::Failure, 1),
        );
        installers.insert(
            String::from("agent-followup"),
            deploying("agent-followup", DeploymentResult::Success, 0),
        );

        let mut orchestrator = deployer(installers);
        let result = orchestrator.deploy_planned(&plans(), false).await;

        assert!(matches!(
            result,
            Err(DeployError::Orchestration(OrchestrationError::Halted { ref service, .. }))
                if service == "agent-summarizer"
        ));
        assert_eq!(orchestrator.reports().len(), 2);
    }

    #[tokio::test]
    async fn test_continue_with_rollback() {
        let mut installers = InstallerMap::new();
        installers.insert(
            String::from("orchestrator"),
            deploying("orchestrator", DeploymentResult::Success, 1),
        );
        installers.insert(
            String::from("agent-summarizer"),
            deploying("agent-summarizer", DeploymentResult::Failure, 1),
        );
        installers.insert(
            String::from("agent-followup"),
            deploying("agent-followup", DeploymentResult::Success, 1),
        );

        let mut orchestrator = deployer(installers);
        let success = orchestrator
            .deploy_planned(&plans(), true)
            .await
            .expect("deploy should run");

        assert!(!success);
        let run = orchestrator.generate_report();
        assert_eq!((run.deployed, run.succeeded, run.failed), (3, 2, 1));
    }

    #[tokio::test]
    async fn test_installer_error_counts_as_failure() {
        let mut failing = MockInstaller::new();
        failing
            .expect_deploy_full_lifecycle()
            .returning(|_, _, _, _, _| Err(ProviderError::network("reset").into()));

        let mut installers = InstallerMap::new();
        installers.insert(
            String::from("orchestrator"),
            Box::new(failing) as Box<dyn crate::installer::Installer>,
        );
        installers.insert(
            String::from("agent-summarizer"),
            deploying("agent-summarizer", DeploymentResult::Success, 1),
        );
        installers.insert(
            String::from("agent-followup"),
            deploying("agent-followup", DeploymentResult::Success, 1),
        );

        let mut orchestrator = deployer(installers);
        let success = orchestrator
            .deploy_planned(&plans(), true)
            .await
            .expect("deploy should run");

        assert!(!success);
        assert!(!orchestrator.reports()[0].is_success());
    }

    #[tokio::test]
    async fn test_validation_continues_past_invalid_service() {
        let mut installers = InstallerMap::new();
        for (i, name) in SERVICES.iter().enumerate() {
            let mut installer = MockInstaller::new();
            installer.expect_validate_permissions().times(1).returning(move |_, _| {
                Ok(PermissionCheck::from_errors(if i == 0 {
                    vec![String::from("bad token")]
                } else {
                    Vec::new()
                }))
            });
            installers.insert((*name).to_string(), Box::new(installer) as Box<dyn crate::installer::Installer>);
        }

        let summary = deployer(installers)
            .validate_permissions()
            .await
            .expect("validation should run");

        assert!(!summary.is_valid());
        assert_eq!(summary.services.len(), 3);
        assert_eq!(summary.services[0].check.status, ValidationStatus::Invalid);
        assert_eq!(summary.services[2].check.status, ValidationStatus::Valid);
    }

    #[tokio::test]
    async fn test_degraded_service_flips_overall_health() {
        let mut installers = InstallerMap::new();
        for name in SERVICES {
            let mut installer = MockInstaller::new();
            installer.expect_verify().times(1).returning(move |_| {
                let status = if name == "agent-followup" {
                    HealthState::Degraded
                } else {
                    HealthState::Healthy
                };
                Ok(HealthReport {
                    service: name.to_string(),
                    overall_status: status,
                    diagnosis: Some(InstanceDiagnosis::AwaitingFirstDeployment {
                        service_id: format!("svc-{name}"),
                    }),
                    error: None,
                    checked_at: Utc::now(),
                })
            });
            installers.insert(name.to_string(), Box::new(installer) as Box<dyn crate::installer::Installer>);
        }

        let summary = deployer(installers)
            .verify_health()
            .await
            .expect("verify should run");

        assert_eq!(summary.overall, HealthState::Unhealthy);
        assert_eq!(summary.services.len(), 3);
    }

    #[tokio::test]
    async fn test_lifecycle_requires_installers() {
        let mut orchestrator = orchestrator(spec(), credentials(), MockProviderClient::new());

        assert!(matches!(
            orchestrator.generate_plans().await,
            Err(DeployError::Orchestration(OrchestrationError::InstallersNotLoaded))
        ));
    }
}
