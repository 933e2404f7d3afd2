//! Plan executor.
//!
//! Applies plan steps in order. On failure, and only when rollback is
//! enabled, the rollback actions of completed steps run in reverse order.

use tracing::{debug, error, info, warn};

use crate::error::{DeployError, PlanError, Result};
use crate::provider::{CreateServiceRequest, ProviderClient};

use super::plan::{Plan, PlanStep, RollbackAction};

/// Executor for deployment plans.
pub struct PlanExecutor<'a, P: ProviderClient + ?Sized> {
    provider: &'a P,
    rollback: bool,
}

/// Result of executing a plan.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Whether every step succeeded.
    pub success: bool,
    /// Remote service identifier, if known.
    pub service_id: Option<String>,
    /// Number of steps applied before the failure (or all of them).
    pub applied: usize,
    /// Number of rollback actions that succeeded.
    pub rolled_back: usize,
    /// The error that stopped execution.
    pub error: Option<DeployError>,
}

impl<'a, P: ProviderClient + ?Sized> PlanExecutor<'a, P> {
    /// Creates an executor without rollback.
    #[must_use]
    pub const fn new(provider: &'a P) -> Self {
        Self {
            provider,
            rollback: false,
        }
    }

    /// Sets whether completed steps are undone on failure.
    #[must_use]
    pub const fn with_rollback(mut self, rollback: bool) -> Self {
        self.rollback = rollback;
        self
    }

    /// Executes a plan.
    pub async fn execute(&self, plan: &Plan) -> ExecutionResult {
        if plan.is_empty() {
            debug!("{}: nothing to execute", plan.remote_name);
            return ExecutionResult {
                success: true,
                service_id: plan.service_id.clone(),
                applied: 0,
                rolled_back: 0,
                error: None,
            };
        }

        let mut service_id = plan.service_id.clone();
        let mut applied = 0;

        for step in &plan.steps {
            debug!("{}: {step}", plan.remote_name);

            if let Err(e) = self.apply(plan, step, &mut service_id).await {
                error!("{}: step '{step}' failed: {e}", plan.remote_name);

                let rolled_back = if self.rollback {
                    self.roll_back(plan, applied, service_id.as_deref()).await
                } else {
                    0
                };

                return ExecutionResult {
                    success: false,
                    service_id,
                    applied,
                    rolled_back,
                    error: Some(e),
                };
            }

            applied += 1;
        }

        ExecutionResult {
            success: true,
            service_id,
            applied,
            rolled_back: 0,
            error: None,
        }
    }

    async fn apply(&self, plan: &Plan, step: &PlanStep, service_id: &mut Option<String>) -> Result<()> {
        match step {
            PlanStep::CreateService {
                repo,
                branch,
                variables,
            } => {
                let request = CreateServiceRequest::from_repo(
                    &plan.remote_name,
                    &plan.project_id,
                    repo,
                    branch,
                    &plan.environment,
                )
                .with_variables(variables.clone());

                let id = self.provider.create_service(&request).await?;
                *service_id = Some(id);
            }
            PlanStep::ConnectSource { repo, branch } => {
                let id = require_service_id(plan, step, service_id.as_deref())?;
                self.provider
                    .connect_service_repo(id, repo, branch, &plan.environment)
                    .await?;
            }
            PlanStep::UpdateVariables { variables } => {
                let id = require_service_id(plan, step, service_id.as_deref())?;
                self.provider
                    .set_environment_variables(id, &plan.environment, variables, &plan.project_id)
                    .await?;
            }
        }

        Ok(())
    }

    /// Undoes the first `applied` steps in reverse order.
    async fn roll_back(&self, plan: &Plan, applied: usize, service_id: Option<&str>) -> usize {
        let Some(service_id) = service_id else {
            return 0;
        };

        warn!("{}: rolling back {applied} step(s)", plan.remote_name);
        let mut rolled_back = 0;

        for action in plan.rollback.iter().take(applied).rev() {
            let result = match action {
                RollbackAction::Nothing => Ok(()),
                RollbackAction::DeleteService => self.provider.delete_service(service_id).await,
                RollbackAction::RestoreVariables { previous, remove } => {
                    self.restore_variables(plan, service_id, previous, remove).await
                }
            };

            match result {
                Ok(()) => rolled_back += 1,
                Err(e) => warn!("{}: rollback failed: {e}", plan.remote_name),
            }
        }

        info!("{}: rolled back {rolled_back} step(s)", plan.remote_name);
        rolled_back
    }

    async fn restore_variables(
        &self,
        plan: &Plan,
        service_id: &str,
        previous: &std::collections::BTreeMap<String, String>,
        remove: &[String],
    ) -> Result<()> {
        if !previous.is_empty() {
            self.provider
                .set_environment_variables(service_id, &plan.environment, previous, &plan.project_id)
                .await?;
        }
        if !remove.is_empty() {
            self.provider
                .delete_variables(service_id, &plan.environment, remove, &plan.project_id)
                .await?;
        }
        Ok(())
    }
}

impl ExecutionResult {
    /// Converts a failed execution into its error.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped execution.
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

fn require_service_id<'s>(plan: &Plan, step: &PlanStep, service_id: Option<&'s str>) -> Result<&'s str> {
    service_id.ok_or_else(|| {
        PlanError::StepFailed {
            service: plan.service.clone(),
            step: step.description(),
            reason: String::from("service identifier is unknown"),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::MockProviderClient;
    use std::collections::BTreeMap;

    fn new_service_plan() -> Plan {
        let mut plan = Plan::new("orchestrator", "budai-orchestrator", "production", "proj", "abc");
        plan.push(
            PlanStep::CreateService {
                repo: String::from("binaryninja/budai-orchestrator"),
                branch: String::from("master"),
                variables: BTreeMap::from([(String::from("PORT"), String::from("8001"))]),
            },
            RollbackAction::DeleteService,
        );
        plan.push(
            PlanStep::ConnectSource {
                repo: String::from("binaryninja/budai-orchestrator"),
                branch: String::from("master"),
            },
            RollbackAction::Nothing,
        );
        plan
    }

    fn connect_fails(mock: &mut MockProviderClient) {
        mock.expect_create_service()
            .times(1)
            .returning(|_| Ok(String::from("svc-new")));
        mock.expect_connect_service_repo()
            .times(1)
            .returning(|_, _, _, _| Err(ProviderError::api_error(500, "boom").into()));
    }

    #[tokio::test]
    async fn test_new_service_steps() {
        let mut mock = MockProviderClient::new();
        mock.expect_create_service()
            .withf(|request| {
                request.name == "budai-orchestrator"
                    && request.variables.as_ref().is_some_and(|v| v["PORT"] == "8001")
            })
            .times(1)
            .returning(|_| Ok(String::from("svc-new")));
        mock.expect_connect_service_repo()
            .withf(|id, repo, branch, env| {
                id == "svc-new" && repo == "binaryninja/budai-orchestrator" && branch == "master" && env == "production"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        mock.expect_set_environment_variables().times(0);

        let result = PlanExecutor::new(&mock).execute(&new_service_plan()).await;

        assert!(result.success);
        assert_eq!(result.applied, 2);
        assert_eq!(result.service_id.as_deref(), Some("svc-new"));
    }

    #[tokio::test]
    async fn test_failure_without_rollback() {
        let mut mock = MockProviderClient::new();
        connect_fails(&mut mock);
        mock.expect_delete_service().times(0);

        let result = PlanExecutor::new(&mock).execute(&new_service_plan()).await;

        assert!(!result.success);
        assert_eq!(result.applied, 1);
        assert_eq!(result.rolled_back, 0);
        assert!(result.into_result().is_err());
    }

    #[tokio::test]
    async fn test_failure_with_rollback_deletes_created_service() {
        let mut mock = MockProviderClient::new();
        connect_fails(&mut mock);
        mock.expect_delete_service()
            .withf(|id| id == "svc-new")
            .times(1)
            .returning(|_| Ok(()));

        let result = PlanExecutor::new(&mock)
            .with_rollback(true)
            .execute(&new_service_plan())
            .await;

        assert!(!result.success);
        assert_eq!(result.rolled_back, 1);
    }

    #[tokio::test]
    async fn test_restore_variables_on_rollback() {
        let mut plan = Plan::new("orchestrator", "budai-orchestrator", "production", "proj", "abc");
        plan.service_id = Some(String::from("svc-1"));
        plan.push(
            PlanStep::UpdateVariables {
                variables: BTreeMap::from([(String::from("A"), String::from("2"))]),
            },
            RollbackAction::RestoreVariables {
                previous: BTreeMap::from([(String::from("A"), String::from("1"))]),
                remove: Vec::new(),
            },
        );
        // A second update that fails, so the first must be undone
        plan.push(
            PlanStep::UpdateVariables {
                variables: BTreeMap::from([(String::from("B"), String::from("3"))]),
            },
            RollbackAction::RestoreVariables {
                previous: BTreeMap::new(),
                remove: vec![String::from("B")],
            },
        );

        let mut mock = MockProviderClient::new();
        mock.expect_set_environment_variables()
            .withf(|_, _, vars, _| vars.contains_key("A") && vars["A"] == "2")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        mock.expect_set_environment_variables()
            .withf(|_, _, vars, _| vars.contains_key("B"))
            .times(1)
            .returning(|_, _, _, _| Err(ProviderError::network("reset").into()));
        mock.expect_set_environment_variables()
            .withf(|_, _, vars, _| vars.get("A").is_some_and(|v| v == "1"))
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        mock.expect_delete_variables().times(0);

        let result = PlanExecutor::new(&mock).with_rollback(true).execute(&plan).await;

        assert!(!result.success);
        assert_eq!(result.applied, 1);
        assert_eq!(result.rolled_back, 1);
    }
}
