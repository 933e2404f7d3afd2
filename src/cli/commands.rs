//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// Railyard - ordered multi-service deployments on Railway.
#[derive(Parser, Debug)]
#[command(name = "railyard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments shared by every command that talks to Railway.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the deployment spec (YAML).
    #[arg(long, env = "RAILYARD_SPEC")]
    pub spec: PathBuf,

    /// Path to the credential store (JSON).
    #[arg(long, env = "RAILYARD_CREDS")]
    pub creds: PathBuf,

    /// Interaction mode.
    #[arg(long, value_enum, default_value = "assisted")]
    pub mode: DeployMode,

    /// Write the command's result as JSON to this path.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Target environment, overriding the spec and `BUDAI_TARGET_ENV`.
    #[arg(long)]
    pub target_env: Option<String>,
}

impl RunArgs {
    /// Directory containing the spec.
    #[must_use]
    pub fn spec_dir(&self) -> &Path {
        spec_dir(&self.spec)
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show requirements and estimated cost of each service.
    Explain {
        /// Common arguments.
        #[command(flatten)]
        run: RunArgs,
    },

    /// Validate the spec and each service's credentials.
    Validate {
        /// Common arguments.
        #[command(flatten)]
        run: RunArgs,
    },

    /// Provision shared infrastructure and generate deployment plans.
    Plan {
        /// Common arguments.
        #[command(flatten)]
        run: RunArgs,
    },

    /// Deploy every enabled service in order.
    Deploy {
        /// Common arguments.
        #[command(flatten)]
        run: RunArgs,

        /// Plan, then deploy through installers.
        #[arg(long)]
        lifecycle: bool,

        /// Disable automatic rollback (lifecycle only).
        #[arg(long)]
        no_rollback: bool,
    },

    /// Check that deployed services exist and are healthy.
    Verify {
        /// Common arguments.
        #[command(flatten)]
        run: RunArgs,

        /// Aggregate installer health instead of checking existence.
        #[arg(long)]
        lifecycle: bool,
    },

    /// Show the latest run report.
    Report {
        /// Path to the deployment spec (YAML).
        #[arg(long, env = "RAILYARD_SPEC")]
        spec: PathBuf,
    },

    /// Inspect one service's instance and deployment.
    Diagnose {
        /// Common arguments.
        #[command(flatten)]
        run: RunArgs,

        /// Logical service name.
        service: String,

        /// Poll until the deployment settles, for at most this many seconds.
        #[arg(long)]
        wait_secs: Option<u64>,

        /// Trigger a deployment if the instance is ready.
        #[arg(long)]
        trigger: bool,
    },
}

/// How much the tool asks before touching remote state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DeployMode {
    /// Ask before mutating remote state.
    #[default]
    Assisted,
    /// Never ask.
    ZeroTouch,
    /// Never ask; the operator drives each step.
    Manual,
}

impl DeployMode {
    /// Returns true if a confirmation prompt is required.
    #[must_use]
    pub const fn requires_confirmation(self) -> bool {
        matches!(self, Self::Assisted)
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Directory containing a spec file.
#[must_use]
pub fn spec_dir(spec: &Path) -> &Path {
    spec.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_deploy_flags() {
        let cli = Cli::try_parse_from([
            "railyard",
            "deploy",
            "--spec",
            "deploy/production.yaml",
            "--creds",
            "creds.json",
            "--mode",
            "zero-touch",
            "--lifecycle",
            "--no-rollback",
        ])
        .expect("arguments should parse");

        let Commands::Deploy {
            run,
            lifecycle,
            no_rollback,
        } = cli.command
        else {
            panic!("expected deploy command");
        };

        assert!(lifecycle);
        assert!(no_rollback);
        assert_eq!(run.mode, DeployMode::ZeroTouch);
        assert!(!run.mode.requires_confirmation());
        assert_eq!(run.spec_dir(), Path::new("deploy"));
    }

    #[test]
    fn test_mode_defaults_to_assisted() {
        let cli = Cli::try_parse_from([
            "railyard", "explain", "--spec", "spec.yaml", "--creds", "creds.json",
        ])
        .expect("arguments should parse");

        let Commands::Explain { run } = cli.command else {
            panic!("expected explain command");
        };
        assert!(run.mode.requires_confirmation());
        assert_eq!(run.spec_dir(), Path::new("."));
    }

    #[test]
    fn test_diagnose_requires_service() {
        let result = Cli::try_parse_from([
            "railyard", "diagnose", "--spec", "spec.yaml", "--creds", "creds.json",
        ]);
        assert!(result.is_err());
    }
}
