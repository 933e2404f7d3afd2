//! Deployment planning and execution.
//!
//! This module handles:
//! - Diffing desired variables against remote state
//! - Building checksummed plans with rollback actions
//! - Executing plans against the provider

mod builder;
mod diff;
mod executor;
mod plan;

pub use builder::{PlanBuilder, PlanContext, plan_checksum};
pub use diff::VariableDiff;
pub use executor::{ExecutionResult, PlanExecutor};
pub use plan::{Plan, PlanStep, RollbackAction};
