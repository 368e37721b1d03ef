//! Error taxonomy for backup jobs.
//!
//! Configuration problems are reported with `anyhow` by the binary and the
//! config loader. Everything that can go wrong inside a single job is typed
//! here so the orchestrator can tell which stage failed and log accordingly.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while walking a source tree or writing the archive stream.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read metadata of {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {path} into the archive: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to finalize the archive of {path}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("uploader stopped reading the archive of {path}")]
    ConsumerGone { path: PathBuf },
}

impl ArchiveError {
    /// Path of the entry that caused the failure.
    pub fn path(&self) -> &PathBuf {
        match self {
            ArchiveError::Walk { path, .. }
            | ArchiveError::Metadata { path, .. }
            | ArchiveError::Open { path, .. }
            | ArchiveError::Copy { path, .. }
            | ArchiveError::Finalize { path, .. }
            | ArchiveError::ConsumerGone { path } => path,
        }
    }

    /// Classify an I/O error raised while writing into the conduit.
    pub(crate) fn from_write(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::BrokenPipe {
            ArchiveError::ConsumerGone { path }
        } else {
            ArchiveError::Copy { path, source }
        }
    }
}

/// Stage of a multipart transfer that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Begin,
    Part(i64),
    Complete,
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStage::Begin => write!(f, "create multipart upload"),
            TransferStage::Part(n) => write!(f, "upload part {}", n),
            TransferStage::Complete => write!(f, "complete multipart upload"),
        }
    }
}

/// Failure on the uploading side of a job.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to establish a session with {endpoint}: {reason}")]
    Session { endpoint: String, reason: String },

    #[error("failed to {stage} for {key}: {reason}")]
    Transfer {
        key: String,
        stage: TransferStage,
        reason: String,
    },

    #[error("archive producer failed: {0}")]
    ProducerFailed(#[source] ArchiveError),

    #[error("archive producer stopped without finishing the stream")]
    ProducerVanished,
}

/// Failure of a whole job, tagged by the stage that caused it.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("cannot derive an object key from {0}")]
    Key(PathBuf),

    #[error(transparent)]
    Session(UploadError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Upload(UploadError),
}

impl From<UploadError> for JobError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Session { .. } => JobError::Session(err),
            UploadError::ProducerFailed(inner) => JobError::Archive(inner),
            other => JobError::Upload(other),
        }
    }
}

impl JobError {
    /// Short stage name used in reports.
    pub fn stage(&self) -> &'static str {
        match self {
            JobError::Key(_) => "key",
            JobError::Session(_) => "session",
            JobError::Archive(_) => "archive",
            JobError::Upload(_) => "transfer",
        }
    }
}
