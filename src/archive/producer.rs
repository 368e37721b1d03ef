use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use tar::{Builder, Header, HeaderMode};
use walkdir::WalkDir;

use crate::archive::entry::{archive_name, root_name, EntryKind};
use crate::conduit::ConduitWriter;
use crate::constants::ERROR_FAILED_TO_COMPRESS;
use crate::error::ArchiveError;
use crate::logging::LogSinks;
use crate::{sink_info, sink_warn};

type TarStream = Builder<GzEncoder<ConduitWriter>>;

/// What a producer run emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entries written, excluding the root directory
    pub entries: u64,
    /// Regular-file payload bytes before compression
    pub payload_bytes: u64,
    /// Compressed bytes handed to the conduit
    pub compressed_bytes: u64,
    /// Whether the stream was finalized and closed cleanly
    pub completed: bool,
    pub duration: Duration,
}

/// Walks one source tree and writes it as tar.gz into a conduit.
///
/// The producer is blocking: it reads files with `std::fs` and parks on the
/// conduit when the uploader falls behind. Run it on `spawn_blocking` or a
/// dedicated thread.
pub struct ArchiveProducer {
    root: PathBuf,
    name: String,
    compression: Compression,
    sinks: Arc<LogSinks>,
}

impl ArchiveProducer {
    pub fn new(root: impl Into<PathBuf>, sinks: Arc<LogSinks>) -> Self {
        let root = root.into();
        let name = root_name(&root).unwrap_or_else(|| root.display().to_string());
        Self {
            root,
            name,
            compression: Compression::default(),
            sinks,
        }
    }

    /// Override the gzip level (0-9).
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    /// Archive the whole tree into `writer`.
    ///
    /// The conduit is always closed before this returns: with `Finished` after
    /// the gzip trailer on success, or with the error that stopped the walk.
    pub fn run(self, writer: ConduitWriter) -> ArchiveSummary {
        sink_info!(
            self.sinks,
            "Compressing has been started! server_name: {}, server_path: {}",
            self.name,
            self.root.display()
        );

        let start = Instant::now();
        let abort = writer.abort_handle();
        let mut stream = Builder::new(GzEncoder::new(writer, self.compression));
        let mut summary = ArchiveSummary::default();

        match self.append_tree(&mut stream, &mut summary) {
            Ok(()) => match finish_stream(stream) {
                Ok(compressed_bytes) => {
                    summary.compressed_bytes = compressed_bytes;
                    summary.completed = true;
                    summary.duration = start.elapsed();
                    sink_info!(
                        self.sinks,
                        "Server has been compressed! server_name: {}, server_path: {}, entries: {}, bytes: {}, compressed: {}, duration: {:?}",
                        self.name,
                        self.root.display(),
                        summary.entries,
                        summary.payload_bytes,
                        summary.compressed_bytes,
                        summary.duration
                    );
                }
                Err(source) => {
                    let err = match source.kind() {
                        io::ErrorKind::BrokenPipe => ArchiveError::ConsumerGone {
                            path: self.root.clone(),
                        },
                        _ => ArchiveError::Finalize {
                            path: self.root.clone(),
                            source,
                        },
                    };
                    summary.duration = start.elapsed();
                    self.report_failure(&summary, &err);
                    abort.abort(err);
                }
            },
            Err(err) => {
                summary.duration = start.elapsed();
                self.report_failure(&summary, &err);
                // Fail the conduit first so the encoders' drop-time footers are refused
                abort.abort(err);
                drop(stream);
            }
        }

        summary
    }

    fn report_failure(&self, summary: &ArchiveSummary, err: &ArchiveError) {
        sink_warn!(
            self.sinks,
            "{}. server_name: {}, server_path: {}, entries written: {}, failed at: {}, error: {}",
            ERROR_FAILED_TO_COMPRESS,
            self.name,
            self.root.display(),
            summary.entries,
            err.path().display(),
            err
        );
    }

    fn append_tree(&self, stream: &mut TarStream, summary: &mut ArchiveSummary) -> Result<(), ArchiveError> {
        for entry in WalkDir::new(&self.root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|source| ArchiveError::Walk {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone()),
                source,
            })?;

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if self.append_entry(stream, path, relative, summary)? {
                summary.entries += 1;
            }
        }

        Ok(())
    }

    /// Returns `false` when the node has no tar representation and was skipped.
    fn append_entry(
        &self,
        stream: &mut TarStream,
        path: &Path,
        relative: &Path,
        summary: &mut ArchiveSummary,
    ) -> Result<bool, ArchiveError> {
        let metadata = fs::symlink_metadata(path).map_err(|source| ArchiveError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        let kind = EntryKind::from_metadata(&metadata);
        if kind == EntryKind::Unsupported {
            debug!("Skipping {}: no tar entry type for this kind of node", path.display());
            return Ok(false);
        }
        let name = archive_name(&self.root, relative, kind);

        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(&metadata, HeaderMode::Complete);

        match kind {
            EntryKind::Regular => {
                let file = File::open(path).map_err(|source| ArchiveError::Open {
                    path: path.to_path_buf(),
                    source,
                })?;
                let size = metadata.len();
                header.set_size(size);

                let mut payload = CountingReader::new(file.take(size));
                stream
                    .append_data(&mut header, &name, &mut payload)
                    .map_err(|source| ArchiveError::from_write(path.to_path_buf(), source))?;

                if payload.count != size {
                    return Err(ArchiveError::Copy {
                        path: path.to_path_buf(),
                        source: io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("file shrank while archiving: expected {} bytes, read {}", size, payload.count),
                        ),
                    });
                }
                summary.payload_bytes += size;
            }
            EntryKind::Symlink => {
                let target = fs::read_link(path).map_err(|source| ArchiveError::Metadata {
                    path: path.to_path_buf(),
                    source,
                })?;
                header.set_size(0);
                stream
                    .append_link(&mut header, &name, &target)
                    .map_err(|source| ArchiveError::from_write(path.to_path_buf(), source))?;
            }
            EntryKind::Directory | EntryKind::Special => {
                header.set_size(0);
                stream
                    .append_data(&mut header, &name, io::empty())
                    .map_err(|source| ArchiveError::from_write(path.to_path_buf(), source))?;
            }
            EntryKind::Unsupported => return Ok(false),
        }

        debug!("Archived {} as {}", path.display(), name.display());
        Ok(true)
    }
}

/// Write the tar footer and gzip trailer, then close the conduit.
fn finish_stream(stream: TarStream) -> io::Result<u64> {
    let encoder = stream.into_inner()?;
    let writer = encoder.finish()?;
    let compressed = writer.bytes_written();
    writer.finish()?;
    Ok(compressed)
}

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}
