use log::debug;
use rusoto_core::{HttpClient, Region};
use rusoto_credential::StaticProvider;
use rusoto_s3::S3Client;

use crate::config::StorageConfig;
use crate::error::UploadError;

/// Region pointing at the configured endpoint.
pub fn custom_region(storage: &StorageConfig) -> Region {
    Region::Custom {
        name: storage.region.clone(),
        endpoint: storage.endpoint.trim_end_matches('/').to_string(),
    }
}

/// Create an S3 client from a static access/secret key pair and a custom endpoint.
///
/// Nothing is sent over the network here; a rejected key surfaces on the
/// first request. Missing settings and TLS setup failures are reported as
/// session errors.
pub fn create_s3_client(storage: &StorageConfig) -> Result<S3Client, UploadError> {
    let session_error = |reason: &str| UploadError::Session {
        endpoint: storage.endpoint.clone(),
        reason: reason.to_string(),
    };

    if storage.endpoint.trim().is_empty() {
        return Err(session_error("no endpoint configured"));
    }
    if storage.access_key.is_empty() || storage.secret_key.is_empty() {
        return Err(session_error("access key and secret key are both required"));
    }

    let credentials = StaticProvider::new_minimal(storage.access_key.clone(), storage.secret_key.clone());
    let http_client = HttpClient::new().map_err(|e| session_error(&format!("failed to create HTTP client: {}", e)))?;

    debug!("Creating S3 session for {} in region {}", storage.endpoint, storage.region);

    Ok(S3Client::new_with(http_client, credentials, custom_region(storage)))
}
