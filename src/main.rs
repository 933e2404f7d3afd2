//! Railyard CLI entrypoint.
//!
//! This is the main entrypoint for the railyard command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use railyard::catalog::ServiceCatalog;
use railyard::cli::{Cli, Commands, DeployMode, OutputFormatter, RunArgs, spec_dir};
use railyard::config::{
    Credentials, DeploymentSpec, SpecParser, SpecValidator, target_env_override,
};
use railyard::error::{ConfigError, DeployError, Result};
use railyard::orchestrator::{DeploymentOrchestrator, OrchestratorOptions};
use railyard::provider::{HealthState, InstanceInspector, PollSettings, RailwayClient};
use railyard::state::{LocalReportStore, ReportStore, write_json};

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code reported when the run is interrupted.
const EXIT_INTERRUPTED: u8 = 130;

type Orchestrator = DeploymentOrchestrator<RailwayClient>;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(async {
        // Dropping the run future on interrupt releases the orchestrator.
        // The signal branch goes first so its handler is installed before
        // the run reaches a prompt.
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nInterrupted.");
                ExitCode::from(EXIT_INTERRUPTED)
            }
            result = run(cli) => match result {
                Ok(true) => ExitCode::SUCCESS,
                Ok(false) => ExitCode::FAILURE,
                Err(e) => {
                    error!("{e}");
                    eprintln!("Error: {e}");
                    ExitCode::FAILURE
                }
            },
        }
    });

    // A prompt may still be blocked on stdin
    runtime.shutdown_background();
    code
}

/// Initializes the logging system.
///
/// `RUST_LOG` wins over the verbosity flag when set.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
///
/// Returns whether the command fully succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.format);

    match cli.command {
        Commands::Explain { run } => cmd_explain(&run, &formatter).await,
        Commands::Validate { run } => cmd_validate(&run, &formatter).await,
        Commands::Plan { run } => cmd_plan(&run, &formatter).await,
        Commands::Deploy {
            run,
            lifecycle,
            no_rollback,
        } => cmd_deploy(&run, lifecycle, !no_rollback, &formatter).await,
        Commands::Verify { run, lifecycle } => cmd_verify(&run, lifecycle, &formatter).await,
        Commands::Report { spec } => cmd_report(&spec, &formatter).await,
        Commands::Diagnose {
            run,
            service,
            wait_secs,
            trigger,
        } => cmd_diagnose(&run, &service, wait_secs, trigger, &formatter).await,
    }
}

/// Show requirements and cost.
async fn cmd_explain(args: &RunArgs, formatter: &OutputFormatter) -> Result<bool> {
    let mut orchestrator = build_orchestrator(args)?;
    orchestrator.load_installers()?;

    let explanation = orchestrator.explain_requirements().await?;
    println!("{}", formatter.format_explanation(&explanation));

    if let Some(path) = &args.output {
        write_json(path, &explanation).await?;
    }

    Ok(true)
}

/// Validate the spec and credentials.
async fn cmd_validate(args: &RunArgs, formatter: &OutputFormatter) -> Result<bool> {
    let (spec, credentials) = load_inputs(args)?;
    let catalog = ServiceCatalog::builtin()?;
    let spec_result = SpecValidator::new(catalog.names()).check(&spec);

    let mut orchestrator = Orchestrator::connect(spec, credentials, options(args))?;
    orchestrator.load_installers()?;
    let permissions = orchestrator.validate_permissions().await?;

    println!("{}", formatter.format_validation(&spec_result, &permissions));

    Ok(spec_result.is_valid() && permissions.is_valid())
}

/// Provision shared infrastructure and show plans.
async fn cmd_plan(args: &RunArgs, formatter: &OutputFormatter) -> Result<bool> {
    let mut orchestrator = build_orchestrator(args)?;
    orchestrator.load_installers()?;

    if !confirm(args.mode).await? {
        eprintln!("Plan cancelled.");
        return Ok(true);
    }

    let plans = orchestrator.generate_plans().await?;
    println!("{}", formatter.format_plans(&plans));

    if let Some(path) = &args.output {
        write_json(path, &plans).await?;
        info!("Plans exported to {}", path.display());
    }

    Ok(true)
}

/// Deploy every enabled service.
async fn cmd_deploy(
    args: &RunArgs,
    lifecycle: bool,
    auto_rollback: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let mut orchestrator = build_orchestrator(args)?;

    let explanation = orchestrator.explain_requirements().await?;
    eprintln!("{}", formatter.format_explanation(&explanation));
    eprintln!("{}\n", formatter.format_deploy_summary(&explanation));

    if !confirm(args.mode).await? {
        eprintln!("Deployment cancelled.");
        return Ok(true);
    }

    let outcome = if lifecycle {
        deploy_lifecycle(&mut orchestrator, auto_rollback).await
    } else {
        deploy_reconciling(&mut orchestrator).await
    };

    // The report is kept even when the run was halted
    let report = orchestrator.generate_report();
    let store = LocalReportStore::for_spec_dir(args.spec_dir());
    let saved = store.save(&report).await?;
    debug!("Report stored in {} ({})", saved.display(), store.backend_type());

    if let Some(path) = &args.output {
        write_json(path, &report).await?;
    }

    println!("{}", formatter.format_run_report(&report));

    let succeeded = outcome?;
    if succeeded {
        info!("All services deployed to '{}'", orchestrator.environment());
    } else {
        error!("Deployment to '{}' finished with failures", orchestrator.environment());
    }

    Ok(succeeded)
}

async fn deploy_lifecycle(orchestrator: &mut Orchestrator, auto_rollback: bool) -> Result<bool> {
    orchestrator.load_installers()?;
    let plans = orchestrator.generate_plans().await?;
    orchestrator.deploy_planned(&plans, auto_rollback).await
}

async fn deploy_reconciling(orchestrator: &mut Orchestrator) -> Result<bool> {
    let deployed = orchestrator.deploy_all().await?;
    let verified = orchestrator.verify_all().await?;
    Ok(deployed && verified)
}

/// Check deployed services.
async fn cmd_verify(args: &RunArgs, lifecycle: bool, formatter: &OutputFormatter) -> Result<bool> {
    let mut orchestrator = build_orchestrator(args)?;

    if !lifecycle {
        return orchestrator.verify_all().await;
    }

    orchestrator.load_installers()?;
    let summary = orchestrator.verify_health().await?;
    println!("{}", formatter.format_health(&summary));

    if let Some(path) = &args.output {
        write_json(path, &summary).await?;
    }

    Ok(summary.overall == HealthState::Healthy)
}

/// Show the latest run report.
async fn cmd_report(spec: &Path, formatter: &OutputFormatter) -> Result<bool> {
    let store = LocalReportStore::for_spec_dir(spec_dir(spec));

    match store.load_latest().await? {
        Some(report) => {
            println!("{}", formatter.format_run_report(&report));
            Ok(true)
        }
        None => {
            eprintln!("No run report found in {}.", store.base_dir().display());
            Ok(true)
        }
    }
}

/// Inspect one service.
async fn cmd_diagnose(
    args: &RunArgs,
    service: &str,
    wait_secs: Option<u64>,
    trigger: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let orchestrator = build_orchestrator(args)?;

    if orchestrator.catalog().get(service).is_none() {
        return Err(ConfigError::UnknownService {
            name: service.to_string(),
        }
        .into());
    }

    let remote_name = orchestrator.catalog().remote_name(service);
    let environment = orchestrator.environment();
    let inspector = InstanceInspector::new(orchestrator.provider(), orchestrator.project_id());

    let triggered = if trigger {
        inspector.trigger_if_ready(&remote_name, environment).await?
    } else {
        None
    };

    let diagnosis = match wait_secs {
        Some(secs) => {
            let settings = PollSettings::with_timeout(Duration::from_secs(secs));
            inspector.wait_for_deployment(&remote_name, environment, settings).await?
        }
        None => inspector.diagnose(&remote_name, environment).await?,
    };

    println!(
        "{}",
        formatter.format_diagnosis(&remote_name, &diagnosis, triggered.as_deref())
    );

    Ok(diagnosis.health() == HealthState::Healthy)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads the spec (with `.env`) and the credential store.
fn load_inputs(args: &RunArgs) -> Result<(DeploymentSpec, Credentials)> {
    let parser = SpecParser::new().with_base_path(args.spec_dir());
    parser.load_dotenv()?;

    let spec = parser.load_file(&args.spec)?;
    let credentials = Credentials::load_file(&args.creds)?;

    Ok((spec, credentials))
}

/// Loads and validates inputs, then connects to Railway.
fn build_orchestrator(args: &RunArgs) -> Result<Orchestrator> {
    let (spec, credentials) = load_inputs(args)?;

    let catalog = ServiceCatalog::builtin()?;
    let validation = SpecValidator::new(catalog.names()).validate(&spec)?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    Orchestrator::connect(spec, credentials, options(args))
}

/// Orchestrator options; call after `.env` is loaded.
fn options(args: &RunArgs) -> OrchestratorOptions {
    OrchestratorOptions {
        environment_override: target_env_override(args.target_env.as_deref()),
        catalog: None,
    }
}

/// Asks for confirmation in assisted mode.
///
/// The answer is read on a blocking thread so an interrupt stays observable.
async fn confirm(mode: DeployMode) -> Result<bool> {
    if !mode.requires_confirmation() {
        return Ok(true);
    }

    eprint!("Proceed with deployment? [y/N]: ");
    std::io::stderr().flush()?;

    let answer = tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).map(|_| input)
    })
    .await
    .map_err(|e| DeployError::internal(format!("confirmation prompt failed: {e}")))??;

    Ok(is_confirmed(&answer))
}

fn is_confirmed(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
