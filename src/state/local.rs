//! Local file-based report storage.
//!
//! Reports live next to the deployment spec so that every project keeps its
//! own history.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, StateError};
use crate::orchestrator::RunReport;

use super::store::ReportStore;

/// Directory created next to the spec.
const STATE_DIR: &str = ".railyard";

/// Subdirectory holding reports.
const REPORTS_DIR: &str = "reports";

/// Copy of the most recent report.
const LATEST_FILE: &str = "latest.json";

/// Local file-based report store.
#[derive(Debug, Clone)]
pub struct LocalReportStore {
    /// Directory holding report files.
    base_dir: PathBuf,
}

impl LocalReportStore {
    /// Creates a store under `<spec_dir>/.railyard/reports`.
    #[must_use]
    pub fn for_spec_dir(spec_dir: &Path) -> Self {
        Self::with_base_dir(spec_dir.join(STATE_DIR).join(REPORTS_DIR))
    }

    /// Creates a store in a custom directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Directory holding report files.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn latest_path(&self) -> PathBuf {
        self.base_dir.join(LATEST_FILE)
    }

    fn report_path(&self, report: &RunReport) -> PathBuf {
        let run = report.run_id.simple().to_string();
        self.base_dir.join(format!(
            "{}-{}.json",
            report.generated_at.format("%Y%m%dT%H%M%SZ"),
            &run[..8]
        ))
    }
}

#[async_trait]
impl ReportStore for LocalReportStore {
    async fn save(&self, report: &RunReport) -> Result<PathBuf> {
        let path = self.report_path(report);
        info!("Saving run report to: {}", path.display());

        write_json(&path, report).await?;
        write_json(&self.latest_path(), report).await?;

        Ok(path)
    }

    async fn load_latest(&self) -> Result<Option<RunReport>> {
        let path = self.latest_path();
        if !path.exists() {
            debug!("No report at: {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await.map_err(|e| StateError::Corrupted {
            message: format!("Failed to read report: {e}"),
        })?;

        let report = serde_json::from_str(&content).map_err(|e| StateError::Corrupted {
            message: format!("Failed to parse report: {e}"),
        })?;

        Ok(Some(report))
    }

    async fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_dir).await?;
        let mut paths = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_report = path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != LATEST_FILE);
            if is_report {
                paths.push(path);
            }
        }

        // File names start with a UTC timestamp
        paths.sort();
        Ok(paths)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

/// Writes a value as pretty JSON, atomically.
///
/// # Errors
///
/// Returns an error if serialization or any filesystem step fails.
pub async fn write_json<T: Serialize + Sync>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| StateError::WriteFailed {
            message: format!("Failed to create {}: {e}", parent.display()),
        })?;
    }

    let content = serde_json::to_string_pretty(value)
        .map_err(|e| StateError::serialization(format!("Failed to serialize: {e}")))?;

    // Write to a temporary file first, then rename for atomicity
    let temp_path = path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path).await.map_err(|e| StateError::WriteFailed {
        message: format!("Failed to create {}: {e}", temp_path.display()),
    })?;

    file.write_all(content.as_bytes())
        .await
        .map_err(|e| StateError::WriteFailed {
            message: format!("Failed to write {}: {e}", temp_path.display()),
        })?;

    file.sync_all().await.map_err(|e| StateError::WriteFailed {
        message: format!("Failed to sync {}: {e}", temp_path.display()),
    })?;

    fs::rename(&temp_path, path).await.map_err(|e| StateError::WriteFailed {
        message: format!("Failed to rename to {}: {e}", path.display()),
    })?;

    debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn report(environment: &str) -> RunReport {
        RunReport {
            run_id: Uuid::new_v4(),
            environment: environment.to_string(),
            generated_at: Utc::now(),
            spec_checksum: String::from("abc"),
            total: 7,
            deployed: 7,
            succeeded: 6,
            failed: 1,
            infrastructure: None,
            reports: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_latest() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = LocalReportStore::for_spec_dir(temp.path());

        let path = store.save(&report("production")).await.expect("Failed to save report");
        assert!(path.starts_with(temp.path().join(".railyard").join("reports")));

        let loaded = store
            .load_latest()
            .await
            .expect("Failed to load report")
            .expect("Report should exist");

        assert_eq!(loaded.environment, "production");
        assert_eq!(loaded.failed, 1);
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = LocalReportStore::with_base_dir(temp.path());

        assert!(store.load_latest().await.expect("Load should not fail").is_none());
        assert!(store.list().await.expect("List should not fail").is_empty());
    }

    #[tokio::test]
    async fn test_latest_tracks_newest_and_history_is_kept() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = LocalReportStore::with_base_dir(temp.path());

        let mut older = report("staging");
        older.generated_at = Utc::now() - Duration::hours(1);
        store.save(&older).await.expect("Failed to save report");
        store.save(&report("production")).await.expect("Failed to save report");

        let listed = store.list().await.expect("List should not fail");
        assert_eq!(listed.len(), 2);

        let latest = store
            .load_latest()
            .await
            .expect("Failed to load report")
            .expect("Report should exist");
        assert_eq!(latest.environment, "production");
    }

    #[tokio::test]
    async fn test_corrupted_latest() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = LocalReportStore::with_base_dir(temp.path());
        std::fs::write(temp.path().join(LATEST_FILE), "{not json").expect("Failed to write file");

        assert!(store.load_latest().await.is_err());
    }
}
