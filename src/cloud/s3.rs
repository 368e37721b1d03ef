use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use rusoto_core::ByteStream;
use rusoto_s3::{
    AbortMultipartUploadRequest, CompleteMultipartUploadRequest, CompletedMultipartUpload,
    CompletedPart, CreateMultipartUploadRequest, S3Client, UploadPartRequest, S3,
};

use crate::cloud::client::create_s3_client;
use crate::cloud::destination::{Connector, ObjectAcl, ObjectDestination, PartReceipt};
use crate::config::StorageConfig;
use crate::error::{TransferStage, UploadError};

const CONTENT_TYPE_GZIP: &str = "application/gzip";

/// Multipart uploads into one bucket of an S3-compatible store.
pub struct S3Destination {
    client: S3Client,
    bucket: String,
    endpoint: String,
}

impl S3Destination {
    pub fn new(client: S3Client, bucket: &str, endpoint: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn transfer_error(&self, key: &str, stage: TransferStage, err: impl std::fmt::Display) -> UploadError {
        UploadError::Transfer {
            key: key.to_string(),
            stage,
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl ObjectDestination for S3Destination {
    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    fn location_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    async fn begin(&self, key: &str, acl: ObjectAcl) -> Result<String, UploadError> {
        let output = self
            .client
            .create_multipart_upload(CreateMultipartUploadRequest {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                acl: Some(acl.as_str().to_string()),
                content_type: Some(CONTENT_TYPE_GZIP.to_string()),
                ..Default::default()
            })
            .await
            .map_err(|e| self.transfer_error(key, TransferStage::Begin, e))?;

        let upload_id = output
            .upload_id
            .ok_or_else(|| self.transfer_error(key, TransferStage::Begin, "no upload ID returned from S3"))?;

        debug!("Started multipart upload with ID: {} for {}", upload_id, key);
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i64,
        data: Bytes,
    ) -> Result<PartReceipt, UploadError> {
        let content_length = data.len() as i64;
        let output = self
            .client
            .upload_part(UploadPartRequest {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                part_number,
                content_length: Some(content_length),
                body: Some(ByteStream::from(data.to_vec())),
                ..Default::default()
            })
            .await
            .map_err(|e| self.transfer_error(key, TransferStage::Part(part_number), e))?;

        let e_tag = output
            .e_tag
            .ok_or_else(|| self.transfer_error(key, TransferStage::Part(part_number), "no ETag in upload part response"))?;

        debug!("Uploaded part {} ({} bytes) of {}", part_number, content_length, key);
        Ok(PartReceipt { part_number, e_tag })
    }

    async fn complete(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<PartReceipt>,
    ) -> Result<Option<String>, UploadError> {
        let parts = parts
            .into_iter()
            .map(|part| CompletedPart {
                e_tag: Some(part.e_tag),
                part_number: Some(part.part_number),
            })
            .collect();

        let output = self
            .client
            .complete_multipart_upload(CompleteMultipartUploadRequest {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                multipart_upload: Some(CompletedMultipartUpload { parts: Some(parts) }),
                ..Default::default()
            })
            .await
            .map_err(|e| self.transfer_error(key, TransferStage::Complete, e))?;

        debug!("Completed multipart upload for {}", key);
        Ok(output.location)
    }

    async fn abort(&self, key: &str, upload_id: &str) -> Result<(), UploadError> {
        self.client
            .abort_multipart_upload(AbortMultipartUploadRequest {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| self.transfer_error(key, TransferStage::Complete, format!("abort failed: {}", e)))?;

        debug!("Aborted multipart upload for {}", key);
        Ok(())
    }
}

/// Opens a fresh S3 session per job from the storage settings.
#[derive(Debug, Clone)]
pub struct S3Connector {
    storage: StorageConfig,
}

impl S3Connector {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }
}

impl Connector for S3Connector {
    type Destination = S3Destination;

    fn connect(&self) -> Result<S3Destination, UploadError> {
        let client = create_s3_client(&self.storage)?;
        Ok(S3Destination::new(client, &self.storage.bucket, &self.storage.endpoint))
    }
}
