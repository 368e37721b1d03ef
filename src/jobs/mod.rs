//! Job orchestration.
//!
//! One job per immediate subdirectory of the source root. Each job pairs an
//! [`ArchiveProducer`](crate::archive::ArchiveProducer) with a
//! [`StreamUploader`](crate::cloud::StreamUploader) over its own conduit and
//! its own destination session. Jobs share nothing but the log sinks.

/// Source directory discovery and object key naming
pub mod discovery;

/// Per-job pipeline and concurrent execution
pub mod runner;

pub use discovery::{discover_source_dirs, object_key_for};
pub use runner::{execute_run, run_job, run_jobs, JobOptions};
