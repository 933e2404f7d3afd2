//! Deployment plan types.
//!
//! A plan is an ordered list of steps for one service with a parallel list
//! of rollback actions, bound by checksum to the configuration that
//! produced it. Serialized plans never carry variable values.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A single remote mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanStep {
    /// Create the service with its full initial variable set.
    CreateService {
        /// Source repository.
        repo: String,
        /// Source branch.
        branch: String,
        /// Static plus non-empty dynamic variables.
        #[serde(serialize_with = "redact_values")]
        variables: BTreeMap<String, String>,
    },
    /// Bind the service to its branch again after creation.
    ConnectSource {
        /// Source repository.
        repo: String,
        /// Source branch.
        branch: String,
    },
    /// Write changed variables on an existing service.
    UpdateVariables {
        /// Changed keys with their desired values.
        #[serde(serialize_with = "redact_values")]
        variables: BTreeMap<String, String>,
    },
}

/// Undo action for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RollbackAction {
    /// Delete the service that was created.
    DeleteService,
    /// Nothing to undo.
    Nothing,
    /// Put back overwritten values and delete added keys.
    RestoreVariables {
        /// Remote values before the update.
        #[serde(serialize_with = "redact_values")]
        previous: BTreeMap<String, String>,
        /// Keys that did not exist before the update.
        remove: Vec<String>,
    },
}

/// Ordered steps for one service.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Unique plan identifier.
    pub plan_id: Uuid,
    /// Logical service name.
    pub service: String,
    /// Remote service name.
    pub remote_name: String,
    /// Target environment.
    pub environment: String,
    /// Target project.
    pub project_id: String,
    /// Remote identifier when the service already exists.
    pub service_id: Option<String>,
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
    /// Rollback action for each step, same index.
    pub rollback: Vec<RollbackAction>,
    /// Checksum of the configuration that produced the plan.
    pub checksum: String,
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        remote_name: impl Into<String>,
        environment: impl Into<String>,
        project_id: impl Into<String>,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            service: service.into(),
            remote_name: remote_name.into(),
            environment: environment.into(),
            project_id: project_id.into(),
            service_id: None,
            steps: Vec::new(),
            rollback: Vec::new(),
            checksum: checksum.into(),
            created_at: Utc::now(),
        }
    }

    /// Appends a step with its rollback action.
    pub fn push(&mut self, step: PlanStep, rollback: RollbackAction) {
        self.steps.push(step);
        self.rollback.push(rollback);
    }

    /// Returns true if the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the plan creates the service.
    #[must_use]
    pub fn creates_service(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, PlanStep::CreateService { .. }))
    }
}

impl PlanStep {
    /// Returns a human-readable description of the step.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateService {
                repo,
                branch,
                variables,
            } => format!(
                "Create service from {repo}@{branch} with {} variable(s)",
                variables.len()
            ),
            Self::ConnectSource { repo, branch } => format!("Connect {repo}@{branch}"),
            Self::UpdateVariables { variables } => format!(
                "Update {} variable(s): {}",
                variables.len(),
                variables.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "{}: no changes required", self.remote_name);
        }

        writeln!(f, "{} ({} steps):", self.remote_name, self.steps.len())?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {i}. {step}")?;
        }

        Ok(())
    }
}

fn redact_values<S, V>(values: &BTreeMap<String, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(values.keys().map(|k| (k, "<redacted>")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Plan {
        let mut plan = Plan::new("orchestrator", "budai-orchestrator", "production", "proj", "abc");
        plan.push(
            PlanStep::CreateService {
                repo: String::from("binaryninja/budai-orchestrator"),
                branch: String::from("master"),
                variables: BTreeMap::from([(String::from("BUDAI_REDIS_URL"), String::from("redis://default:pw@h:6379"))]),
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

    #[test]
    fn test_steps_and_rollback_are_parallel() {
        let plan = plan();

        assert_eq!(plan.step_count(), 2);
        assert_eq!(plan.rollback.len(), 2);
        assert!(plan.creates_service());
    }

    #[test]
    fn test_serialized_plan_redacts_values() {
        let json = serde_json::to_string(&plan()).expect("plan should serialize");

        assert!(json.contains("BUDAI_REDIS_URL"));
        assert!(json.contains("<redacted>"));
        assert!(!json.contains("redis://"));
        assert!(json.contains("\"action\":\"create_service\""));
    }

    #[test]
    fn test_display() {
        let empty = Plan::new("orchestrator", "budai-orchestrator", "production", "proj", "abc");
        assert_eq!(empty.to_string(), "budai-orchestrator: no changes required");

        let rendered = plan().to_string();
        assert!(rendered.contains("0. Create service from binaryninja/budai-orchestrator@master"));
        assert!(rendered.contains("1. Connect"));
    }
}
