// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Railyard
//!
//! An ordered, reconciling deployment orchestrator for a fixed catalog of
//! services on Railway.
//!
//! ## Overview
//!
//! Railyard deploys a multi-service stack into one Railway environment:
//!
//! - Services are processed one at a time in dependency order
//! - Existing services are diffed against the desired variable set, so a
//!   re-run with unchanged configuration makes no remote mutations
//! - A shared Redis cache is provisioned once and reused by every service
//! - A failing service is recorded and the run moves on to the next one
//!
//! ## Architecture
//!
//! 1. **Desired State**: the YAML deployment spec plus the credential store
//! 2. **Observed State**: services and variables queried from Railway
//! 3. **Orchestrator**: plans and applies the difference, service by service
//!
//! ## Modules
//!
//! - [`config`]: Spec parsing, credentials, validation and checksums
//! - [`catalog`]: The services that can be deployed and their variables
//! - [`provider`]: Railway API client and instance diagnostics
//! - [`planner`]: Variable diffing, plan building and execution
//! - [`installer`]: Per-service lifecycle contract
//! - [`orchestrator`]: Ordered rollout, verification and reporting
//! - [`state`]: Run report persistence
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! environment: production
//! region: us-west1
//! version: "1.0.0"
//! services:
//!   orchestrator:
//!     resources:
//!       memory_mb: 1024
//!       cpu_millicores: 1000
//!   voice-frontend:
//!     enabled: false
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod installer;
pub mod orchestrator;
pub mod planner;
pub mod provider;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use catalog::{ServiceCatalog, ServiceDescriptor};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, Credentials, DeploymentSpec, SpecParser, SpecValidator};
pub use error::{DeployError, Result};
pub use installer::{Installer, RailwayServiceInstaller};
pub use orchestrator::{DeploymentOrchestrator, OrchestratorOptions, RunReport};
pub use planner::{Plan, PlanBuilder, PlanExecutor, VariableDiff};
pub use provider::{ProviderClient, RailwayClient};
pub use state::{LocalReportStore, ReportStore};
