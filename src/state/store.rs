//! Report store trait definition.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;
use crate::orchestrator::RunReport;

/// Trait for run report storage backends.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persists a report and marks it as the latest.
    ///
    /// Returns the location the report was written to.
    async fn save(&self, report: &RunReport) -> Result<PathBuf>;

    /// Loads the latest report, if any.
    async fn load_latest(&self) -> Result<Option<RunReport>>;

    /// Lists stored report locations, oldest first.
    async fn list(&self) -> Result<Vec<PathBuf>>;

    /// Returns the backend type name.
    fn backend_type(&self) -> &'static str;
}
