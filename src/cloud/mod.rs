//! Object storage integration for streaming backups.
//!
//! This module uploads an archive stream of unknown length to an
//! S3-compatible bucket as a single object, using multipart upload so the
//! archive never has to be buffered in full.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐  conduit  ┌─────────────────┐     ┌──────────────────┐
//! │ ArchiveProducer │──────────▶│ StreamUploader  │────▶│ObjectDestination │
//! └─────────────────┘           └─────────────────┘     └────────┬─────────┘
//!                                                                │
//!                                              ┌─────────────────┴──────┐
//!                                              │                        │
//!                                       ┌──────▼───────┐        ┌───────▼────────┐
//!                                       │S3Destination │        │MemoryDestination│
//!                                       └──────────────┘        └────────────────┘
//! ```
//!
//! A [`Connector`] opens one destination ("session") per job, so a bad
//! credential or endpoint fails only the job that tried to use it.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rust_backup::cloud::{Connector, ObjectAcl, S3Connector, StreamUploader};
//! use rust_backup::config::StorageConfig;
//! use rust_backup::conduit::conduit;
//!
//! # async fn example(storage: StorageConfig) -> anyhow::Result<()> {
//! let connector = S3Connector::new(storage);
//! let destination = connector.connect()?;
//! let (_writer, reader) = conduit(16, 64 * 1024);
//!
//! let uploader = StreamUploader::new(destination, "web.tar.gz", ObjectAcl::Private, 5 * 1024 * 1024);
//! let outcome = uploader.upload(reader).await?;
//! println!("stored at {}", outcome.location);
//! # Ok(())
//! # }
//! ```

/// S3 client construction from static credentials
pub mod client;

/// Destination and connector traits shared by all backends
pub mod destination;

/// In-memory destination for tests and local verification
pub mod memory;

/// Amazon S3 / S3-compatible destination
pub mod s3;

/// Multipart streaming uploader
pub mod streaming;

pub use destination::{Connector, ObjectAcl, ObjectDestination, PartReceipt};
pub use memory::{MemoryConnector, MemoryDestination};
pub use s3::{S3Connector, S3Destination};
pub use streaming::{StreamUploader, UploadOutcome};
