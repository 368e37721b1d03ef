//! Bounded single-producer/single-consumer byte conduit.
//!
//! The archive producer writes through a blocking [`std::io::Write`] end while
//! the uploader awaits chunks on the async end. The channel holds at most
//! `capacity` chunks of `chunk_size` bytes, so the producer stalls as soon as
//! the uploader stops consuming and the uploader waits whenever the producer
//! has nothing ready.
//!
//! The stream always ends with an explicit terminal message. A clean end is
//! `Finished`, a producer failure is `Failed(err)`, and a producer that drops
//! its end without either is reported as [`UploadError::ProducerVanished`] so
//! a truncated archive can never pass for a complete one.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::error::{ArchiveError, UploadError};

/// One message travelling from producer to uploader.
#[derive(Debug)]
pub enum ConduitMessage {
    Data(Bytes),
    Finished,
    Failed(ArchiveError),
}

/// Create a conduit pair holding at most `capacity` chunks of `chunk_size` bytes.
pub fn conduit(capacity: usize, chunk_size: usize) -> (ConduitWriter, ConduitReader) {
    let chunk_size = chunk_size.max(1);
    let (sender, receiver) = mpsc::channel(capacity.max(1));

    let writer = ConduitWriter {
        sender,
        buffer: BytesMut::with_capacity(chunk_size),
        chunk_size,
        bytes_written: 0,
        aborted: Arc::new(AtomicBool::new(false)),
    };
    let reader = ConduitReader {
        receiver,
        finished: false,
        bytes_read: 0,
    };

    (writer, reader)
}

/// Blocking write end of a conduit.
///
/// Must only be used from a thread that is not driving an async runtime
/// (a `spawn_blocking` task or a plain thread).
pub struct ConduitWriter {
    sender: mpsc::Sender<ConduitMessage>,
    buffer: BytesMut,
    chunk_size: usize,
    bytes_written: u64,
    aborted: Arc<AtomicBool>,
}

impl ConduitWriter {
    /// Handle that can fail the stream after the writer has been moved into
    /// an encoder stack.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            sender: self.sender.clone(),
            aborted: Arc::clone(&self.aborted),
        }
    }

    /// Total bytes handed to the conduit so far, including buffered ones.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush buffered bytes and mark the stream as complete.
    pub fn finish(mut self) -> io::Result<()> {
        self.send_buffered()?;
        self.send(ConduitMessage::Finished)
    }

    /// Close the stream with an error the reader will surface.
    ///
    /// Buffered bytes are discarded; the reader must not treat any of the
    /// stream as usable once it sees the failure.
    pub fn fail(self, err: ArchiveError) {
        self.abort_handle().abort(err);
    }

    fn send(&self, message: ConduitMessage) -> io::Result<()> {
        if self.aborted.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "conduit was aborted"));
        }
        self.sender
            .blocking_send(message)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "conduit reader was dropped"))
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let data = self.buffer.split().freeze();
        self.send(ConduitMessage::Data(data))
    }
}

impl Write for ConduitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let room = self.chunk_size - self.buffer.len();
        let n = room.min(buf.len());
        self.buffer.extend_from_slice(&buf[..n]);
        self.bytes_written += n as u64;

        if self.buffer.len() >= self.chunk_size {
            self.send_buffered()?;
        }

        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

/// Fails a conduit from outside the writer.
///
/// Once aborted, the writer refuses further data so trailing bytes from
/// encoders being dropped never reach the reader after the failure.
pub struct AbortHandle {
    sender: mpsc::Sender<ConduitMessage>,
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn abort(self, err: ArchiveError) {
        self.aborted.store(true, Ordering::SeqCst);
        // Nothing to do if the reader is already gone.
        let _ = self.sender.blocking_send(ConduitMessage::Failed(err));
    }
}

/// Async read end of a conduit.
pub struct ConduitReader {
    receiver: mpsc::Receiver<ConduitMessage>,
    finished: bool,
    bytes_read: u64,
}

impl ConduitReader {
    /// Wait for the next chunk.
    ///
    /// Returns `Ok(None)` only after the producer sent `Finished`.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        if self.finished {
            return Ok(None);
        }

        match self.receiver.recv().await {
            Some(ConduitMessage::Data(data)) => {
                self.bytes_read += data.len() as u64;
                Ok(Some(data))
            }
            Some(ConduitMessage::Finished) => {
                self.finished = true;
                Ok(None)
            }
            Some(ConduitMessage::Failed(err)) => Err(UploadError::ProducerFailed(err)),
            None => Err(UploadError::ProducerVanished),
        }
    }

    /// Total bytes received so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
