use clap::Parser;
use std::path::PathBuf;

use crate::config::BackupConfig;

/// Command-line arguments for rs-backup.
///
/// Settings come from the optional YAML file and the environment first;
/// anything given here overrides both.
#[derive(Parser, Debug)]
#[clap(name = "rs-backup", about = "Stream server directories as tar.gz backups into object storage")]
pub struct Args {
    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Directory whose subdirectories are backed up (overrides daemon_path)
    #[clap(long)]
    pub source_root: Option<PathBuf>,

    /// Directory for info.txt, warn.txt and panic.txt
    #[clap(long)]
    pub log_dir: Option<PathBuf>,

    /// Write the JSON run report to this file
    #[clap(long)]
    pub summary: Option<PathBuf>,

    /// Maximum number of jobs running at once
    #[clap(short = 'j', long)]
    pub jobs: Option<usize>,

    /// List the planned jobs and object keys without uploading
    #[clap(long)]
    pub dry_run: bool,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut BackupConfig) {
        if let Some(root) = &self.source_root {
            config.source_root = Some(root.clone());
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = dir.clone();
        }
        if let Some(summary) = &self.summary {
            config.summary_file = Some(summary.clone());
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrent_jobs = jobs;
        }
    }
}
