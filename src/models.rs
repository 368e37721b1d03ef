use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final state of one job.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
}

/// Outcome of backing up one source directory.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JobReport {
    pub name: String,
    pub source: PathBuf,
    pub object_key: Option<String>,
    pub status: JobStatus,
    pub location: Option<String>,
    /// Stage that failed: key, session, archive or transfer
    pub failed_stage: Option<String>,
    pub reason: Option<String>,
    pub entries: u64,
    pub bytes_uploaded: u64,
    pub parts: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

/// Everything one invocation did.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: usize,
    pub failed: usize,
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>, mut jobs: Vec<JobReport>) -> Self {
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        let succeeded = jobs.iter().filter(|job| job.succeeded()).count();
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            succeeded,
            failed: jobs.len() - succeeded,
            jobs,
        }
    }

    /// One-line summary for the informational sink.
    pub fn summary_line(&self) -> String {
        let failed: Vec<&str> = self
            .jobs
            .iter()
            .filter(|job| !job.succeeded())
            .map(|job| job.name.as_str())
            .collect();

        let mut line = format!(
            "Backup run {} finished: {} jobs, {} succeeded, {} failed, {} bytes uploaded",
            self.run_id,
            self.jobs.len(),
            self.succeeded,
            self.failed,
            self.jobs.iter().map(|job| job.bytes_uploaded).sum::<u64>()
        );
        if !failed.is_empty() {
            line.push_str(&format!(" (failed: {})", failed.join(", ")));
        }
        line
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write run report to {}", path.display()))
    }
}
