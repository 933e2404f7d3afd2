//! End-to-end deployment runs against the in-memory provider.

mod common;

use std::sync::Arc;

use common::{CACHE_PASSWORD, FakeProvider, Mutation, credentials};
use railyard::catalog::ServiceCatalog;
use railyard::config::{DeploymentSpec, ServiceConfig};
use railyard::error::{DeployError, OrchestrationError};
use railyard::orchestrator::{DeploymentOrchestrator, OrchestratorOptions};
use railyard::provider::HealthState;
use railyard::state::{LocalReportStore, ReportStore};

fn orchestrator(
    spec: DeploymentSpec,
    provider: &Arc<FakeProvider>,
) -> DeploymentOrchestrator<FakeProvider> {
    DeploymentOrchestrator::new(
        spec,
        credentials(),
        Arc::clone(provider),
        OrchestratorOptions::default(),
    )
    .expect("orchestrator should build")
}

fn remote_names_in_order() -> Vec<String> {
    let catalog = ServiceCatalog::builtin().expect("builtin catalog");
    catalog
        .order()
        .iter()
        .map(|name| catalog.remote_name(name))
        .collect()
}

#[tokio::test]
async fn test_fresh_deploy_creates_services_in_order() {
    let provider = Arc::new(FakeProvider::new());
    let mut orchestrator = orchestrator(DeploymentSpec::new("production"), &provider);

    assert!(orchestrator.deploy_all().await.expect("deploy should run"));
    assert_eq!(provider.created_services(), remote_names_in_order());

    // The cache comes first and only once
    let mutations = provider.mutations();
    assert_eq!(mutations[0], Mutation::CreateCache);
    assert_eq!(
        mutations.iter().filter(|m| **m == Mutation::CreateCache).count(),
        1
    );

    // Never force a deploy on a freshly created service
    assert!(!mutations.iter().any(|m| matches!(m, Mutation::Deploy { .. })));

    let report = orchestrator.generate_report();
    assert_eq!(report.total, 7);
    assert_eq!(report.succeeded, 7);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_new_services_receive_shared_cache_and_links() {
    let provider = Arc::new(FakeProvider::new());
    let mut orchestrator = orchestrator(DeploymentSpec::new("production"), &provider);
    orchestrator.deploy_all().await.expect("deploy should run");

    let gateway = provider.variables_of("budai-api-gateway");
    assert_eq!(gateway["BUDAI_ENVIRONMENT"], "production");
    assert_eq!(gateway["PORT"], "8000");
    assert!(gateway["BUDAI_REDIS_URL"].contains(CACHE_PASSWORD));
    assert!(gateway["BUDAI_ORCHESTRATOR_URL"].contains("budai-orchestrator"));
    // Empty optional secrets are never sent
    assert!(!gateway.contains_key("BUDAI_OPENAI_API_KEY"));
}

#[tokio::test]
async fn test_second_run_without_changes_makes_no_mutations() {
    let provider = Arc::new(FakeProvider::new());
    orchestrator(DeploymentSpec::new("production"), &provider)
        .deploy_all()
        .await
        .expect("first deploy should run");
    provider.clear_mutations();

    let mut second = orchestrator(DeploymentSpec::new("production"), &provider);
    assert!(second.deploy_all().await.expect("second deploy should run"));

    assert!(provider.mutations().is_empty());
    assert!(second.reports().iter().all(|r| r.steps_applied == 0));
}

#[tokio::test]
async fn test_only_drifted_variables_are_written() {
    let provider = Arc::new(FakeProvider::new());
    orchestrator(DeploymentSpec::new("production"), &provider)
        .deploy_all()
        .await
        .expect("first deploy should run");
    provider.set_remote_variable("budai-orchestrator", "BUDAI_REDIS_URL", "redis://stale:6379");
    provider.set_remote_variable("budai-orchestrator", "CUSTOM_FLAG", "keep-me");
    provider.clear_mutations();

    orchestrator(DeploymentSpec::new("production"), &provider)
        .deploy_all()
        .await
        .expect("second deploy should run");

    let orchestrator_id = provider.service_id("budai-orchestrator").expect("service exists");
    assert_eq!(
        provider.mutations(),
        vec![Mutation::SetVariables {
            service_id: orchestrator_id,
            keys: vec![String::from("BUDAI_REDIS_URL")],
        }]
    );

    // Remote-only keys are left alone
    assert_eq!(provider.variables_of("budai-orchestrator")["CUSTOM_FLAG"], "keep-me");
}

#[tokio::test]
async fn test_environment_override_updates_environment_variable() {
    let provider = Arc::new(FakeProvider::new());
    orchestrator(DeploymentSpec::new("production"), &provider)
        .deploy_all()
        .await
        .expect("first deploy should run");
    provider.clear_mutations();

    let options = OrchestratorOptions {
        environment_override: Some(String::from("staging")),
        catalog: None,
    };
    let mut staging = DeploymentOrchestrator::new(
        DeploymentSpec::new("production"),
        credentials(),
        Arc::clone(&provider),
        options,
    )
    .expect("orchestrator should build");

    assert_eq!(staging.environment(), "staging");
    staging.deploy_all().await.expect("deploy should run");

    let updates: Vec<_> = provider
        .mutations()
        .into_iter()
        .filter_map(|m| match m {
            Mutation::SetVariables { keys, .. } => Some(keys),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 7);
    assert!(updates.iter().all(|keys| keys == &[String::from("BUDAI_ENVIRONMENT")]));
}

#[tokio::test]
async fn test_disabled_services_are_untouched_and_uncounted() {
    let provider = Arc::new(FakeProvider::new());
    let spec = DeploymentSpec::new("production")
        .with_service("voice-frontend", ServiceConfig::disabled())
        .with_service("agent-followup", ServiceConfig::disabled());
    let mut orchestrator = orchestrator(spec, &provider);

    orchestrator.deploy_all().await.expect("deploy should run");

    let created = provider.created_services();
    assert!(!created.contains(&String::from("budai-voice-frontend")));
    assert!(!created.contains(&String::from("budai-agent-followup")));

    let report = orchestrator.generate_report();
    assert_eq!(report.total, 5);
    assert_eq!(report.deployed, 5);

    let explanation = orchestrator.explain_requirements().await.expect("explain should run");
    assert_eq!(explanation.entries.len(), 7);
}

#[tokio::test]
async fn test_all_disabled_provisions_nothing() {
    let provider = Arc::new(FakeProvider::new());
    let spec = ServiceCatalog::builtin()
        .expect("builtin catalog")
        .names()
        .into_iter()
        .fold(DeploymentSpec::new("production"), |spec, name| {
            spec.with_service(name, ServiceConfig::disabled())
        });
    let mut orchestrator = orchestrator(spec, &provider);

    assert!(orchestrator.deploy_all().await.expect("deploy should run"));
    assert!(provider.mutations().is_empty());
    assert!(orchestrator.infrastructure().is_none());
    assert_eq!(orchestrator.generate_report().total, 0);
}

#[tokio::test]
async fn test_failing_service_does_not_stop_the_run() {
    let provider = Arc::new(FakeProvider::new().failing_create("budai-api-gateway"));
    let mut orchestrator = orchestrator(DeploymentSpec::new("production"), &provider);

    assert!(!orchestrator.deploy_all().await.expect("deploy should run"));

    let created = provider.created_services();
    assert_eq!(created.len(), 6);
    assert!(created.contains(&String::from("budai-slack-integration")));
    assert!(created.contains(&String::from("budai-voice-frontend")));

    let report = orchestrator.generate_report();
    assert_eq!(report.deployed, 7);
    assert_eq!(report.failed, 1);
    let failed = report
        .reports
        .iter()
        .find(|r| !r.is_success())
        .expect("one failure");
    assert_eq!(failed.service, "api-gateway");

    assert!(!orchestrator.verify_all().await.expect("verify never fails"));
}

#[tokio::test]
async fn test_missing_secrets_fail_only_that_service() {
    let provider = Arc::new(FakeProvider::new());
    let mut credentials = credentials();
    credentials.set("slack_bot_token", "");
    let mut orchestrator = DeploymentOrchestrator::new(
        DeploymentSpec::new("production"),
        credentials,
        Arc::clone(&provider),
        OrchestratorOptions::default(),
    )
    .expect("orchestrator should build");

    assert!(!orchestrator.deploy_all().await.expect("deploy should run"));
    assert!(!provider
        .created_services()
        .contains(&String::from("budai-slack-integration")));

    let report = orchestrator.generate_report();
    assert_eq!(report.failed, 1);
    assert!(report.reports.iter().any(|r| r
        .error
        .as_deref()
        .is_some_and(|e| e.contains("slack_bot_token"))));
}

#[tokio::test]
async fn test_lifecycle_deploy_and_health() {
    let provider = Arc::new(FakeProvider::new());
    let mut orchestrator = orchestrator(DeploymentSpec::new("production"), &provider);
    orchestrator.load_installers().expect("installers should load");

    let plans = orchestrator.generate_plans().await.expect("plans should build");
    assert_eq!(plans.len(), 7);
    assert!(plans.values().all(|p| p.creates_service()));

    assert!(orchestrator
        .deploy_planned(&plans, true)
        .await
        .expect("deploy should run"));

    let health = orchestrator.verify_health().await.expect("verify should run");
    assert_eq!(health.overall, HealthState::Healthy);
}

#[tokio::test]
async fn test_lifecycle_rollback_deletes_half_created_service() {
    let provider = Arc::new(FakeProvider::new().failing_connect("budai-api-gateway"));
    let mut orchestrator = orchestrator(DeploymentSpec::new("production"), &provider);
    orchestrator.load_installers().expect("installers should load");

    let plans = orchestrator.generate_plans().await.expect("plans should build");
    let succeeded = orchestrator
        .deploy_planned(&plans, true)
        .await
        .expect("deploy should run");

    assert!(!succeeded);
    assert!(provider.service_id("budai-api-gateway").is_none());
    assert!(provider
        .mutations()
        .iter()
        .any(|m| matches!(m, Mutation::DeleteService { .. })));
    // Later services still deploy
    assert!(provider.service_id("budai-voice-frontend").is_some());

    let gateway = orchestrator
        .reports()
        .iter()
        .find(|r| r.service == "api-gateway")
        .expect("gateway report");
    assert_eq!(gateway.rolled_back, 1);
}

#[tokio::test]
async fn test_lifecycle_without_rollback_halts() {
    let provider = Arc::new(FakeProvider::new().failing_create("budai-api-gateway"));
    let mut orchestrator = orchestrator(DeploymentSpec::new("production"), &provider);
    orchestrator.load_installers().expect("installers should load");

    let plans = orchestrator.generate_plans().await.expect("plans should build");
    let result = orchestrator.deploy_planned(&plans, false).await;

    assert!(matches!(
        result,
        Err(DeployError::Orchestration(OrchestrationError::Halted { .. }))
    ));
    assert!(provider.service_id("budai-slack-integration").is_none());
    assert_eq!(orchestrator.reports().len(), 5);
}

#[tokio::test]
async fn test_report_is_persisted_without_cache_password() {
    let provider = Arc::new(FakeProvider::new());
    let mut orchestrator = orchestrator(DeploymentSpec::new("production"), &provider);
    orchestrator.deploy_all().await.expect("deploy should run");

    let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
    let store = LocalReportStore::for_spec_dir(temp.path());
    let path = store
        .save(&orchestrator.generate_report())
        .await
        .expect("report should save");

    let raw = std::fs::read_to_string(path).expect("report should be readable");
    assert!(!raw.contains(CACHE_PASSWORD));

    let latest = store
        .load_latest()
        .await
        .expect("report should load")
        .expect("report exists");
    assert_eq!(latest.succeeded, 7);
    assert!(latest.infrastructure.is_some());
}
