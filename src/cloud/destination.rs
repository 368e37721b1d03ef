use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::constants::{ACL_PRIVATE, ACL_PUBLIC_READ};
use crate::error::UploadError;

/// Canned access-control setting applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectAcl {
    PublicRead,
    Private,
}

impl ObjectAcl {
    pub fn from_public_access(public: bool) -> Self {
        if public {
            ObjectAcl::PublicRead
        } else {
            ObjectAcl::Private
        }
    }

    /// Value sent in the `x-amz-acl` header.
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectAcl::PublicRead => ACL_PUBLIC_READ,
            ObjectAcl::Private => ACL_PRIVATE,
        }
    }
}

impl std::fmt::Display for ObjectAcl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement of one uploaded part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartReceipt {
    pub part_number: i64,
    pub e_tag: String,
}

/// A multipart-capable object store.
///
/// One value represents an established session with the store. Parts are
/// numbered from 1 and must be completed in ascending order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectDestination: Send + Sync {
    /// Human-readable identity for logs, e.g. `s3://bucket`.
    fn describe(&self) -> String;

    /// Location reported when the store does not return one on completion.
    fn location_for(&self, key: &str) -> String;

    /// Start a multipart upload and return its upload id.
    async fn begin(&self, key: &str, acl: ObjectAcl) -> Result<String, UploadError>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i64,
        data: Bytes,
    ) -> Result<PartReceipt, UploadError>;

    /// Assemble the parts into the final object. Returns the store's location if it reports one.
    async fn complete(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<PartReceipt>,
    ) -> Result<Option<String>, UploadError>;

    /// Discard an unfinished upload and its parts.
    async fn abort(&self, key: &str, upload_id: &str) -> Result<(), UploadError>;
}

/// Opens a destination session for one job.
pub trait Connector: Send + Sync {
    type Destination: ObjectDestination + 'static;

    fn connect(&self) -> Result<Self::Destination, UploadError>;
}
