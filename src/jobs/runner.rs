use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, error};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::archive::{root_name, ArchiveProducer, ArchiveSummary};
use crate::cloud::{Connector, ObjectAcl, ObjectDestination, StreamUploader, UploadOutcome};
use crate::conduit::conduit;
use crate::config::BackupConfig;
use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_COMPRESSION_LEVEL, DEFAULT_CONDUIT_CAPACITY, ERROR_FAILED_TO_CREATE_SESSION,
    ERROR_FAILED_TO_UPLOAD, S3_MIN_PART_SIZE,
};
use crate::error::JobError;
use crate::jobs::discovery::object_key_for;
use crate::logging::LogSinks;
use crate::models::{JobReport, JobStatus, RunReport};
use crate::{sink_fatal, sink_info, sink_warn};

/// Tuning shared by every job of a run.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub conduit_capacity: usize,
    pub chunk_size: usize,
    pub part_size: usize,
    pub acl: ObjectAcl,
    pub compression_level: u32,
    pub max_concurrent_jobs: usize,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            conduit_capacity: DEFAULT_CONDUIT_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            part_size: S3_MIN_PART_SIZE,
            acl: ObjectAcl::Private,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_concurrent_jobs: num_cpus::get(),
        }
    }
}

impl JobOptions {
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            conduit_capacity: config.conduit_capacity,
            chunk_size: config.chunk_size_bytes(),
            part_size: config.part_size_bytes(),
            acl: config.acl(),
            compression_level: config.compression_level,
            max_concurrent_jobs: config.max_concurrent_jobs,
        }
    }
}

struct JobSuccess {
    key: String,
    outcome: UploadOutcome,
    archive: ArchiveSummary,
}

struct JobFailure {
    key: Option<String>,
    entries: u64,
    error: JobError,
}

/// Back up one source directory.
///
/// Opens its own session, runs the producer on a blocking thread and the
/// uploader on the current task, and joins both. Never returns an error:
/// the outcome is logged and described by the returned report.
pub async fn run_job<C>(source: &Path, connector: &C, options: &JobOptions, sinks: &Arc<LogSinks>) -> JobReport
where
    C: Connector,
{
    let started_at = Utc::now();
    let start = Instant::now();
    let name = root_name(source).unwrap_or_else(|| source.display().to_string());

    let result = backup(source, &name, connector, options, sinks).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(JobSuccess { key, outcome, archive }) => {
            sink_info!(
                sinks,
                "Backup has been uploaded successfully! server_name: {}, server_path: {}, location: {}",
                name,
                source.display(),
                outcome.location
            );
            JobReport {
                name,
                source: source.to_path_buf(),
                object_key: Some(key),
                status: JobStatus::Succeeded,
                location: Some(outcome.location),
                failed_stage: None,
                reason: None,
                entries: archive.entries,
                bytes_uploaded: outcome.bytes_uploaded,
                parts: outcome.parts,
                started_at,
                duration_ms,
            }
        }
        Err(JobFailure { key, entries, error }) => JobReport {
            name,
            source: source.to_path_buf(),
            object_key: key,
            status: JobStatus::Failed,
            location: None,
            failed_stage: Some(error.stage().to_string()),
            reason: Some(sinks.scrub(&error.to_string())),
            entries,
            bytes_uploaded: 0,
            parts: 0,
            started_at,
            duration_ms,
        },
    }
}

async fn backup<C>(
    source: &Path,
    name: &str,
    connector: &C,
    options: &JobOptions,
    sinks: &Arc<LogSinks>,
) -> Result<JobSuccess, JobFailure>
where
    C: Connector,
{
    let key = object_key_for(source).map_err(|error| {
        sink_warn!(sinks, "Can't derive an object key. server_path: {}", source.display());
        JobFailure { key: None, entries: 0, error }
    })?;

    let destination = connector.connect().map_err(|error| {
        sink_fatal!(
            sinks,
            "{} server_name: {}, error: {}",
            ERROR_FAILED_TO_CREATE_SESSION,
            name,
            error
        );
        JobFailure {
            key: Some(key.clone()),
            entries: 0,
            error: JobError::Session(error),
        }
    })?;
    debug!("Session for {} opened against {}", name, destination.describe());

    let (writer, reader) = conduit(options.conduit_capacity, options.chunk_size);
    let producer =
        ArchiveProducer::new(source, Arc::clone(sinks)).with_compression_level(options.compression_level);
    let producing = tokio::task::spawn_blocking(move || producer.run(writer));

    let uploader = StreamUploader::new(destination, &key, options.acl, options.part_size);
    let uploaded = uploader.upload(reader).await;

    let archive = match producing.await {
        Ok(summary) => summary,
        Err(join_error) => {
            // The writer was dropped while unwinding, so the upload already failed
            sink_warn!(sinks, "Archive producer crashed. server_name: {}, error: {}", name, join_error);
            ArchiveSummary::default()
        }
    };

    match uploaded {
        Ok(outcome) => Ok(JobSuccess { key, outcome, archive }),
        Err(upload_error) => {
            sink_warn!(
                sinks,
                "{}. server_name: {}, server_path: {}, error: {}",
                ERROR_FAILED_TO_UPLOAD,
                name,
                source.display(),
                upload_error
            );
            Err(JobFailure {
                key: Some(key),
                entries: archive.entries,
                error: JobError::from(upload_error),
            })
        }
    }
}

/// Run one job per source directory, at most `max_concurrent_jobs` at a time.
///
/// Jobs are independent: a failing or panicking job is reported and the
/// others carry on. Reports come back in the order of `sources`.
pub async fn run_jobs<C>(
    sources: Vec<PathBuf>,
    connector: Arc<C>,
    options: JobOptions,
    sinks: Arc<LogSinks>,
) -> Vec<JobReport>
where
    C: Connector + 'static,
{
    let semaphore = Arc::new(Semaphore::new(options.max_concurrent_jobs.max(1)));
    let options = Arc::new(options);

    let handles = sources.iter().cloned().map(|source| {
        let semaphore = Arc::clone(&semaphore);
        let connector = Arc::clone(&connector);
        let options = Arc::clone(&options);
        let sinks = Arc::clone(&sinks);

        tokio::spawn(async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire_owned().await.ok();
            run_job(&source, connector.as_ref(), &options, &sinks).await
        })
    });

    let results = join_all(handles).await;

    sources
        .into_iter()
        .zip(results)
        .map(|(source, result)| match result {
            Ok(report) => report,
            Err(join_error) => {
                error!("Backup job for {} panicked: {}", source.display(), join_error);
                panicked_report(source, &join_error.to_string())
            }
        })
        .collect()
}

fn panicked_report(source: PathBuf, reason: &str) -> JobReport {
    JobReport {
        name: root_name(&source).unwrap_or_else(|| source.display().to_string()),
        object_key: object_key_for(&source).ok(),
        source,
        status: JobStatus::Failed,
        location: None,
        failed_stage: Some("panic".to_string()),
        reason: Some(reason.to_string()),
        entries: 0,
        bytes_uploaded: 0,
        parts: 0,
        started_at: Utc::now(),
        duration_ms: 0,
    }
}

/// Run every job and assemble the run report.
pub async fn execute_run<C>(
    sources: Vec<PathBuf>,
    connector: Arc<C>,
    options: JobOptions,
    sinks: Arc<LogSinks>,
) -> RunReport
where
    C: Connector + 'static,
{
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    sink_info!(sinks, "Backup run {} started with {} jobs", run_id, sources.len());

    let reports = run_jobs(sources, connector, options, Arc::clone(&sinks)).await;
    let report = RunReport::new(run_id, started_at, reports);

    sink_info!(sinks, "{}", report.summary_line());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{MemoryConnector, MemoryDestination};
    use crate::test_utils::{create_test_tree, null_sinks};
    use std::fs;
    use tempfile::TempDir;

    fn small_options() -> JobOptions {
        JobOptions {
            conduit_capacity: 2,
            chunk_size: 512,
            part_size: 1024,
            acl: ObjectAcl::Private,
            compression_level: 1,
            max_concurrent_jobs: 2,
        }
    }

    #[tokio::test]
    async fn test_run_job_uploads_archive() {
        let tree = create_test_tree().unwrap();
        let source = tree.path().join("web");
        let store = MemoryDestination::new("bucket");
        let connector = MemoryConnector::new(store.clone());

        let report = run_job(&source, &connector, &small_options(), &null_sinks()).await;

        assert!(report.succeeded(), "{:?}", report.reason);
        assert_eq!(report.object_key.as_deref(), Some("web.tar.gz"));
        assert_eq!(report.location.as_deref(), Some("memory://bucket/web.tar.gz"));
        assert!(report.entries >= 3);
        assert_eq!(store.object("web.tar.gz").unwrap().len() as u64, report.bytes_uploaded);
    }

    #[tokio::test]
    async fn test_session_failure_is_reported() {
        let tree = create_test_tree().unwrap();
        let report = run_job(
            &tree.path().join("web"),
            &MemoryConnector::refusing(),
            &small_options(),
            &null_sinks(),
        )
        .await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.failed_stage.as_deref(), Some("session"));
    }

    #[tokio::test]
    async fn test_missing_source_fails_in_archive_stage() {
        let dir = TempDir::new().unwrap();
        let store = MemoryDestination::new("bucket");
        let report = run_job(
            &dir.path().join("gone"),
            &MemoryConnector::new(store.clone()),
            &small_options(),
            &null_sinks(),
        )
        .await;

        assert_eq!(report.failed_stage.as_deref(), Some("archive"));
        assert!(store.object("gone.tar.gz").is_none());
        assert_eq!(store.aborted(), vec!["gone.tar.gz".to_string()]);
    }

    #[tokio::test]
    async fn test_run_jobs_keeps_jobs_independent() {
        let dir = TempDir::new().unwrap();
        for name in ["alpha", "beta", "gamma"] {
            fs::create_dir(dir.path().join(name)).unwrap();
            fs::write(dir.path().join(name).join("data.bin"), vec![7u8; 4096]).unwrap();
        }
        let store = MemoryDestination::new("bucket").fail_part(1);
        let connector = Arc::new(MemoryConnector::new(store.clone()));
        let sources = vec![dir.path().join("alpha"), dir.path().join("missing"), dir.path().join("gamma")];

        let reports = run_jobs(sources, connector, small_options(), null_sinks()).await;

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[1].name, "missing");
        // Every upload hits the injected part failure, each one on its own
        assert!(reports.iter().all(|r| r.status == JobStatus::Failed));
        assert_eq!(store.aborted().len(), 3);
    }

    #[tokio::test]
    async fn test_execute_run_builds_report() {
        let tree = create_test_tree().unwrap();
        let store = MemoryDestination::new("bucket");
        let sources = vec![tree.path().join("web"), tree.path().join("db")];

        let report = execute_run(
            sources,
            Arc::new(MemoryConnector::new(store.clone())),
            small_options(),
            null_sinks(),
        )
        .await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(store.keys(), vec!["db.tar.gz".to_string(), "web.tar.gz".to_string()]);
    }
}
