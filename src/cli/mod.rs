//! CLI module for railyard.
//!
//! This module provides the command-line interface for deploying the
//! service catalog to Railway.

mod commands;
mod output;

pub use commands::{Cli, Commands, DeployMode, OutputFormat, RunArgs, spec_dir};
pub use output::OutputFormatter;
