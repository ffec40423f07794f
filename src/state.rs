//! Persisted record of the last `apply`

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use converge::RunReport;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// File the last report is written to, inside the state directory
pub const LAST_RUN_FILE: &str = "last-run.json";

/// One finished (or aborted) apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRun {
    pub finished_at: DateTime<Utc>,

    /// GitHub account the run authorized
    pub account: String,

    #[serde(default)]
    pub dry_run: bool,

    pub report: RunReport,
}

impl LastRun {
    pub fn new(account: impl Into<String>, dry_run: bool, report: RunReport) -> Self {
        Self {
            finished_at: Utc::now(),
            account: account.into(),
            dry_run,
            report,
        }
    }

    /// Default location of the record
    pub fn path() -> Result<PathBuf> {
        Ok(paths::state_dir()?.join(LAST_RUN_FILE))
    }

    /// Load the last run, `None` if no run was recorded yet
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            log::debug!("No run recorded at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read run report: {}", path.display()))?;
        let run = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse run report: {}", path.display()))?;

        log::debug!("Loaded run report from {}", path.display());
        Ok(Some(run))
    }

    /// Save the record, creating the state directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write run report: {}", path.display()))?;

        log::debug!("Saved run report to {}", path.display());
        Ok(())
    }
}
