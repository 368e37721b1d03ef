//! # rs-backup
//!
//! Streams directory trees as gzip-compressed tar archives straight into
//! S3-compatible object storage.
//!
//! ## Overview
//!
//! Every immediate subdirectory of a source root is one backup job. A job
//! walks its directory with an [`archive::ArchiveProducer`] on a blocking
//! thread and uploads the compressed stream with a
//! [`cloud::StreamUploader`] at the same time. The two halves talk through a
//! bounded [`conduit`], so memory use per job is fixed no matter how large
//! the tree is, and neither the archive nor any part of it is staged on disk.
//!
//! Outcomes are written to three persistent log sinks (`info.txt`,
//! `warn.txt`, `panic.txt`) and summarised in a JSON run report.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_backup::cloud::S3Connector;
//! use rust_backup::config::BackupConfig;
//! use rust_backup::jobs::{discover_source_dirs, execute_run, JobOptions};
//! use rust_backup::logging::LogSinks;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = BackupConfig::load(None)?;
//! config.validate()?;
//!
//! let sinks = Arc::new(LogSinks::open(&config.log_dir)?.with_secrets(config.secrets()));
//! let root = config.source_root.clone().unwrap_or_default();
//! let sources = discover_source_dirs(&root)?;
//!
//! let report = execute_run(
//!     sources,
//!     Arc::new(S3Connector::new(config.storage.clone())),
//!     JobOptions::from_config(&config),
//!     sinks,
//! )
//! .await;
//! println!("{}", report.summary_line());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`archive`]: Tree walking and tar.gz production
//! - [`conduit`]: Bounded byte channel between producer and uploader
//! - [`cloud`]: Multipart upload to S3-compatible stores
//! - [`jobs`]: Source discovery and concurrent job execution
//! - [`config`]: YAML and environment configuration
//! - [`logging`]: Persistent info/warn/fatal sinks
//! - [`models`]: Job and run reports
//! - [`security`]: Credential scrubbing for log output
//! - [`error`]: Typed job errors
//! - [`cli`]: Command-line interface definitions

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Job and run report types
pub mod models;

/// Archive production from source trees
pub mod archive;

/// Bounded producer/uploader channel
pub mod conduit;

/// Cloud storage integration (S3)
pub mod cloud;

/// Configuration loading and validation
pub mod config;

/// Typed errors for archive, upload and job failures
pub mod error;

/// Job discovery and orchestration
pub mod jobs;

/// Persistent log sinks
pub mod logging;

/// Application constants and configuration values
pub mod constants;

/// Security utilities for credential protection
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
