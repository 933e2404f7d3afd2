//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ResourceRequest, ValidationResult};
use crate::installer::DeploymentResult;
use crate::orchestrator::{ExplainEntry, Explanation, HealthSummary, PermissionSummary, RunReport};
use crate::planner::Plan;
use crate::provider::{HealthState, InstanceDiagnosis};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Service requirement row for table display.
#[derive(Tabled)]
struct RequirementRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Resources")]
    resources: String,
    #[tabled(rename = "Est. $/month")]
    cost: String,
}

/// Plan step row for table display.
#[derive(Tabled)]
struct PlanStepRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    step: String,
}

/// Deployment outcome row for table display.
#[derive(Tabled)]
struct DeploymentRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Steps")]
    steps: usize,
    #[tabled(rename = "Rolled back")]
    rolled_back: usize,
    #[tabled(rename = "Service ID")]
    service_id: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// Health row for table display.
#[derive(Tabled)]
struct HealthRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats service requirements and cost.
    #[must_use]
    pub fn format_explanation(&self, explanation: &Explanation) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(explanation).unwrap_or_default(),
            OutputFormat::Text => Self::format_explanation_text(explanation),
        }
    }

    fn format_explanation_text(explanation: &Explanation) -> String {
        let mut output = String::new();

        let _ = write!(output, "\nEnvironment: {}", explanation.environment);
        if let Some(region) = &explanation.region {
            let _ = write!(output, " ({region})");
        }
        output.push_str("\n\n");

        let rows: Vec<RequirementRow> = explanation
            .entries
            .iter()
            .map(|entry| match entry {
                ExplainEntry::Disabled { service } => RequirementRow {
                    service: service.clone(),
                    source: "disabled".dimmed().to_string(),
                    port: String::from("-"),
                    resources: String::from("-"),
                    cost: String::from("-"),
                },
                ExplainEntry::Declared {
                    service,
                    repository,
                    branch,
                    port,
                    resources,
                } => RequirementRow {
                    service: service.clone(),
                    source: format!("{}@{branch}", Self::truncate(repository, 50)),
                    port: port.to_string(),
                    resources: Self::format_resources(resources),
                    cost: String::from("-"),
                },
                ExplainEntry::Described(requirements) => RequirementRow {
                    service: requirements.capability.clone(),
                    source: format!(
                        "{}@{}",
                        Self::truncate(&requirements.repository, 50),
                        requirements.branch
                    ),
                    port: requirements.port.to_string(),
                    resources: Self::format_resources(&requirements.resources),
                    cost: format!("{:.2}", requirements.estimated_monthly_cost),
                },
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        let _ = write!(
            output,
            "\n\nEstimated total: {}/month\n",
            format!("${:.2}", explanation.total_monthly_cost).bold()
        );

        output
    }

    /// Formats the summary shown before a deployment is confirmed.
    #[must_use]
    pub fn format_deploy_summary(&self, explanation: &Explanation) -> String {
        let count = explanation.services_to_deploy();
        match self.format {
            OutputFormat::Json => json!({
                "services_to_deploy": count,
                "environment": explanation.environment,
            })
            .to_string(),
            OutputFormat::Text => format!(
                "Services to deploy: {}\nEnvironment: {}",
                count.to_string().bold(),
                explanation.environment.bold()
            ),
        }
    }

    /// Formats spec and permission validation.
    #[must_use]
    pub fn format_validation(&self, spec: &ValidationResult, permissions: &PermissionSummary) -> String {
        match self.format {
            OutputFormat::Json => {
                let errors: Vec<_> = spec
                    .errors
                    .iter()
                    .map(|e| json!({ "field": e.field, "message": e.message }))
                    .collect();
                let value = json!({
                    "spec": { "errors": errors, "warnings": spec.warnings },
                    "permissions": permissions,
                    "valid": spec.is_valid() && permissions.is_valid(),
                });
                serde_json::to_string_pretty(&value).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_validation_text(spec, permissions),
        }
    }

    fn format_validation_text(spec: &ValidationResult, permissions: &PermissionSummary) -> String {
        let mut output = String::new();

        if spec.is_valid() {
            let _ = writeln!(output, "{} Spec is valid", "✓".green());
        } else {
            let _ = writeln!(output, "{} Spec has errors:", "✗".red());
            for error in &spec.errors {
                let _ = writeln!(output, "   - {}: {}", error.field, error.message);
            }
        }

        for warning in &spec.warnings {
            let _ = writeln!(output, "   {} {warning}", "⚠".yellow());
        }

        output.push('\n');
        for entry in &permissions.services {
            if entry.check.is_valid() {
                let _ = writeln!(output, "{} {}", "✓".green(), entry.service);
            } else {
                let _ = writeln!(output, "{} {}", "✗".red(), entry.service);
                for error in &entry.check.validation_errors {
                    let _ = writeln!(output, "   - {error}");
                }
            }
        }

        output
    }

    /// Formats generated plans.
    #[must_use]
    pub fn format_plans(&self, plans: &BTreeMap<String, Plan>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plans).unwrap_or_default(),
            OutputFormat::Text => Self::format_plans_text(plans),
        }
    }

    fn format_plans_text(plans: &BTreeMap<String, Plan>) -> String {
        let changed = plans.values().filter(|p| !p.is_empty()).count();
        if changed == 0 {
            return format!("{} No changes required - services are up to date.\n", "✓".green());
        }

        let mut output = String::from("\nDeployment Plan\n\n");

        let rows: Vec<PlanStepRow> = plans
            .values()
            .flat_map(|plan| {
                plan.steps.iter().enumerate().map(|(i, step)| PlanStepRow {
                    service: plan.remote_name.clone(),
                    index: i + 1,
                    step: Self::truncate(&step.description(), 70),
                })
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());

        let created = plans.values().filter(|p| p.creates_service()).count();
        let _ = write!(
            output,
            "\n\nPlan: {} to create, {} to update, {} unchanged\n",
            created.to_string().green(),
            (changed - created).to_string().yellow(),
            plans.len() - changed
        );

        output
    }

    /// Formats a run report.
    #[must_use]
    pub fn format_run_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_run_report_text(report),
        }
    }

    fn format_run_report_text(report: &RunReport) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\nRun {} ({})\n\n",
            report.run_id,
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        if !report.reports.is_empty() {
            let rows: Vec<DeploymentRow> = report
                .reports
                .iter()
                .map(|r| DeploymentRow {
                    service: r.remote_name.clone(),
                    result: match r.result {
                        DeploymentResult::Success => "success".green().to_string(),
                        DeploymentResult::Failure => "failure".red().to_string(),
                    },
                    steps: r.steps_applied,
                    rolled_back: r.rolled_back,
                    service_id: r.service_id.as_deref().map_or_else(String::new, |id| Self::truncate(id, 12)),
                    error: r.error.as_deref().map_or_else(String::new, |e| Self::truncate(e, 50)),
                })
                .collect();

            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if let Some(infra) = &report.infrastructure {
            let _ = writeln!(output, "\nShared cache: {}", infra.shared_cache.masked_url());
        }

        let status = if report.is_success() {
            format!("{} {report}", "✓".green())
        } else {
            format!("{} {report}", "✗".red())
        };
        let _ = writeln!(output, "\n{status}");

        output
    }

    /// Formats health of every service.
    #[must_use]
    pub fn format_health(&self, summary: &HealthSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<HealthRow> = summary
                    .services
                    .iter()
                    .map(|report| HealthRow {
                        service: report.service.clone(),
                        health: Self::format_health_state(report.overall_status),
                        detail: report
                            .error
                            .clone()
                            .or_else(|| report.diagnosis.as_ref().map(ToString::to_string))
                            .unwrap_or_default(),
                    })
                    .collect();

                format!(
                    "\n{}\n\nOverall: {}\n",
                    Table::new(rows),
                    Self::format_health_state(summary.overall)
                )
            }
        }
    }

    /// Formats the diagnosis of one service.
    #[must_use]
    pub fn format_diagnosis(
        &self,
        remote_name: &str,
        diagnosis: &InstanceDiagnosis,
        triggered: Option<&str>,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let value = json!({
                    "service": remote_name,
                    "health": diagnosis.health(),
                    "diagnosis": diagnosis,
                    "triggered_deployment": triggered,
                });
                serde_json::to_string_pretty(&value).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!(
                    "{remote_name}: {} ({diagnosis})\n",
                    Self::format_health_state(diagnosis.health())
                );
                if let Some(deployment_id) = triggered {
                    let _ = writeln!(output, "Triggered deployment {deployment_id}");
                }
                output
            }
        }
    }

    fn format_health_state(state: HealthState) -> String {
        match state {
            HealthState::Healthy => state.to_string().green().to_string(),
            HealthState::Degraded => state.to_string().yellow().to_string(),
            HealthState::Unhealthy => state.to_string().red().to_string(),
        }
    }

    fn format_resources(resources: &ResourceRequest) -> String {
        format!(
            "{}x {}MB / {}m",
            resources.replicas, resources.memory_mb, resources.cpu_millicores
        )
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
