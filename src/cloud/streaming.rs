use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use log::{debug, info, warn};

use crate::cloud::destination::{ObjectAcl, ObjectDestination, PartReceipt};
use crate::conduit::ConduitReader;
use crate::constants::S3_MAX_PARTS;
use crate::error::{TransferStage, UploadError};

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Where the object can be found, as reported by the destination
    pub location: String,
    pub bytes_uploaded: u64,
    pub parts: usize,
    pub duration: Duration,
}

/// Uploads one conduit as a single object using multipart semantics.
///
/// The total length is never known up front. Incoming chunks are accumulated
/// until a full part is available, which is then sent before more of the
/// conduit is read. At most one part is held in memory at a time, so a slow
/// destination pushes back on the conduit and through it on the producer.
pub struct StreamUploader<D> {
    destination: D,
    key: String,
    acl: ObjectAcl,
    part_size: usize,
}

impl<D: ObjectDestination> StreamUploader<D> {
    /// Create an uploader for one object.
    ///
    /// # Arguments
    ///
    /// * `destination` - The session to upload through
    /// * `key` - The object key
    /// * `acl` - Access-control setting applied when the upload is created
    /// * `part_size` - Size of every part except the last. Stores such as S3
    ///   reject parts under 5 MiB, the configuration layer enforces that.
    pub fn new(destination: D, key: &str, acl: ObjectAcl, part_size: usize) -> Self {
        Self {
            destination,
            key: key.to_string(),
            acl,
            part_size: part_size.max(1),
        }
    }

    /// Consume the conduit until the producer finishes, then complete the object.
    ///
    /// The reader is dropped when this returns, so a producer still writing
    /// after an upload failure sees a broken pipe and stops.
    ///
    /// # Returns
    ///
    /// The object's location on success. On any failure the multipart upload
    /// is aborted and the error returned, a producer failure surfacing as
    /// [`UploadError::ProducerFailed`].
    pub async fn upload(self, mut reader: ConduitReader) -> Result<UploadOutcome, UploadError> {
        let start = Instant::now();
        let upload_id = self.destination.begin(&self.key, self.acl).await?;
        info!(
            "Uploading {} to {} (upload ID: {}, acl: {})",
            self.key,
            self.destination.describe(),
            upload_id,
            self.acl
        );

        match self.transfer(&upload_id, &mut reader).await {
            Ok((location, bytes_uploaded, parts)) => {
                let outcome = UploadOutcome {
                    location,
                    bytes_uploaded,
                    parts,
                    duration: start.elapsed(),
                };
                info!(
                    "Uploaded {} ({} bytes in {} parts) to {} in {:?}",
                    self.key, outcome.bytes_uploaded, outcome.parts, outcome.location, outcome.duration
                );
                Ok(outcome)
            }
            Err(e) => {
                // Stop the producer before the abort round trip
                drop(reader);
                warn!("Attempting to abort the failed upload of {}: {}", self.key, e);
                if let Err(abort_err) = self.destination.abort(&self.key, &upload_id).await {
                    warn!("Failed to abort multipart upload {} for {}: {}", upload_id, self.key, abort_err);
                }
                Err(e)
            }
        }
    }

    async fn transfer(
        &self,
        upload_id: &str,
        reader: &mut ConduitReader,
    ) -> Result<(String, u64, usize), UploadError> {
        let mut buffer = BytesMut::with_capacity(self.part_size);
        let mut receipts: Vec<PartReceipt> = Vec::new();
        let mut bytes_uploaded = 0u64;

        while let Some(mut chunk) = reader.next_chunk().await? {
            while !chunk.is_empty() {
                let room = self.part_size - buffer.len();
                let take = room.min(chunk.len());
                buffer.extend_from_slice(&chunk.split_to(take));

                if buffer.len() == self.part_size {
                    let part = buffer.split().freeze();
                    bytes_uploaded += self.send_part(upload_id, &mut receipts, part).await?;
                }
            }
        }

        // The remainder, or a single empty part for an empty stream
        if !buffer.is_empty() || receipts.is_empty() {
            let part = buffer.split().freeze();
            bytes_uploaded += self.send_part(upload_id, &mut receipts, part).await?;
        }

        let parts = receipts.len();
        let location = self
            .destination
            .complete(&self.key, upload_id, receipts)
            .await?
            .unwrap_or_else(|| self.destination.location_for(&self.key));

        Ok((location, bytes_uploaded, parts))
    }

    async fn send_part(
        &self,
        upload_id: &str,
        receipts: &mut Vec<PartReceipt>,
        data: Bytes,
    ) -> Result<u64, UploadError> {
        let part_number = receipts.len() as i64 + 1;
        if part_number > S3_MAX_PARTS {
            return Err(UploadError::Transfer {
                key: self.key.clone(),
                stage: TransferStage::Part(part_number),
                reason: format!(
                    "object exceeds {} parts of {} bytes, raise the part size",
                    S3_MAX_PARTS, self.part_size
                ),
            });
        }

        let size = data.len() as u64;
        let receipt = self
            .destination
            .upload_part(&self.key, upload_id, part_number, data)
            .await?;
        debug!("Part {} of {} accepted ({} bytes)", part_number, self.key, size);
        receipts.push(receipt);
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::destination::MockObjectDestination;
    use crate::cloud::memory::MemoryDestination;
    use crate::conduit::conduit;
    use crate::error::ArchiveError;
    use mockall::predicate::eq;
    use std::io::Write;
    use std::path::PathBuf;
    use std::thread;

    fn feed(data: Vec<u8>, chunk_size: usize) -> (ConduitReader, thread::JoinHandle<std::io::Result<()>>) {
        let (mut writer, reader) = conduit(4, chunk_size);
        let handle = thread::spawn(move || {
            writer.write_all(&data)?;
            writer.finish()
        });
        (reader, handle)
    }

    #[tokio::test]
    async fn test_parts_are_exact_size_with_short_tail() {
        let store = MemoryDestination::new("bucket");
        let data: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let (reader, handle) = feed(data.clone(), 64);

        let uploader = StreamUploader::new(store.clone(), "web.tar.gz", ObjectAcl::Private, 1000);
        let outcome = uploader.upload(reader).await.unwrap();
        handle.join().unwrap().unwrap();

        assert_eq!(outcome.parts, 3);
        assert_eq!(outcome.bytes_uploaded, 2500);
        assert_eq!(outcome.location, "memory://bucket/web.tar.gz");
        let sizes: Vec<_> = store.part_sizes().into_iter().map(|(_, _, size)| size).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert_eq!(&store.object("web.tar.gz").unwrap()[..], &data[..]);
    }

    #[tokio::test]
    async fn test_empty_stream_uploads_one_empty_part() {
        let store = MemoryDestination::new("bucket");
        let (reader, handle) = feed(Vec::new(), 64);

        let outcome = StreamUploader::new(store.clone(), "empty.tar.gz", ObjectAcl::Private, 1000)
            .upload(reader)
            .await
            .unwrap();
        handle.join().unwrap().unwrap();

        assert_eq!(outcome.parts, 1);
        assert_eq!(outcome.bytes_uploaded, 0);
        assert_eq!(store.object("empty.tar.gz").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_producer_failure_aborts_upload() {
        let store = MemoryDestination::new("bucket");
        let (mut writer, reader) = conduit(4, 16);
        let handle = thread::spawn(move || {
            writer.write_all(&[7u8; 100]).unwrap();
            writer.fail(ArchiveError::Open {
                path: PathBuf::from("/srv/api/secret.pem"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        });

        let err = StreamUploader::new(store.clone(), "api.tar.gz", ObjectAcl::Private, 32)
            .upload(reader)
            .await
            .unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, UploadError::ProducerFailed(ArchiveError::Open { .. })));
        assert!(store.object("api.tar.gz").is_none());
        assert_eq!(store.aborted(), vec!["api.tar.gz".to_string()]);
        assert_eq!(store.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_vanished_producer_is_a_failure() {
        let store = MemoryDestination::new("bucket");
        let (mut writer, reader) = conduit(4, 16);
        thread::spawn(move || {
            writer.write_all(b"truncated").unwrap();
            drop(writer);
        })
        .join()
        .unwrap();

        let err = StreamUploader::new(store.clone(), "db.tar.gz", ObjectAcl::Private, 32)
            .upload(reader)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::ProducerVanished));
        assert!(store.object("db.tar.gz").is_none());
        assert_eq!(store.aborted().len(), 1);
    }

    #[tokio::test]
    async fn test_part_failure_stops_producer() {
        let store = MemoryDestination::new("bucket").fail_part(2);
        let (mut writer, reader) = conduit(2, 16);
        let handle = thread::spawn(move || {
            for _ in 0..1000 {
                writer.write_all(&[1u8; 16])?;
            }
            writer.finish()
        });

        let err = StreamUploader::new(store.clone(), "mail.tar.gz", ObjectAcl::Private, 64)
            .upload(reader)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Transfer {
                stage: TransferStage::Part(2),
                ..
            }
        ));
        // The producer's next send fails once the reader is gone
        let producer = handle.join().unwrap();
        assert_eq!(producer.unwrap_err().kind(), std::io::ErrorKind::BrokenPipe);
        assert!(store.object("mail.tar.gz").is_none());
        assert_eq!(store.aborted(), vec!["mail.tar.gz".to_string()]);
    }

    #[tokio::test]
    async fn test_complete_failure_aborts_upload() {
        let store = MemoryDestination::new("bucket").fail_complete();
        let (reader, handle) = feed(vec![5u8; 150], 16);

        let err = StreamUploader::new(store.clone(), "logs.tar.gz", ObjectAcl::Private, 64)
            .upload(reader)
            .await
            .unwrap_err();
        handle.join().unwrap().unwrap();

        assert!(matches!(
            err,
            UploadError::Transfer {
                stage: TransferStage::Complete,
                ..
            }
        ));
        // Every part went through before the store rejected the object
        assert_eq!(store.part_sizes().len(), 3);
        assert!(store.object("logs.tar.gz").is_none());
        assert_eq!(store.aborted(), vec!["logs.tar.gz".to_string()]);
        assert_eq!(store.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_begin_failure_is_returned_without_abort() {
        let store = MemoryDestination::new("bucket").fail_begin();
        let (reader, handle) = feed(vec![1, 2, 3], 8);

        let err = StreamUploader::new(store.clone(), "x.tar.gz", ObjectAcl::Private, 32)
            .upload(reader)
            .await
            .unwrap_err();
        let _ = handle.join().unwrap();

        assert!(matches!(
            err,
            UploadError::Transfer {
                stage: TransferStage::Begin,
                ..
            }
        ));
        assert!(store.aborted().is_empty());
    }

    #[tokio::test]
    async fn test_acl_and_fallback_location_with_mock() {
        let mut mock = MockObjectDestination::new();
        mock.expect_describe().return_const("mock://bucket".to_string());
        mock.expect_begin()
            .with(eq("site.tar.gz"), eq(ObjectAcl::PublicRead))
            .times(1)
            .returning(|_, _| Ok("id-1".to_string()));
        mock.expect_upload_part()
            .times(1)
            .returning(|_, _, part_number, _| {
                Ok(PartReceipt {
                    part_number,
                    e_tag: "\"etag\"".to_string(),
                })
            });
        mock.expect_complete()
            .times(1)
            .returning(|_, _, parts| {
                assert_eq!(parts.len(), 1);
                Ok(None)
            });
        mock.expect_location_for()
            .with(eq("site.tar.gz"))
            .returning(|key| format!("https://objects.example.com/backups/{}", key));
        mock.expect_abort().never();

        let (reader, handle) = feed(b"tiny archive".to_vec(), 8);
        let outcome = StreamUploader::new(mock, "site.tar.gz", ObjectAcl::PublicRead, 1024)
            .upload(reader)
            .await
            .unwrap();
        handle.join().unwrap().unwrap();

        assert_eq!(outcome.location, "https://objects.example.com/backups/site.tar.gz");
        assert_eq!(outcome.bytes_uploaded, 12);
    }
}
