//! In-process multipart destination for tests and embedding.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::cloud::destination::{Connector, ObjectAcl, ObjectDestination, PartReceipt};
use crate::error::{TransferStage, UploadError};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    acl: ObjectAcl,
}

#[derive(Debug)]
struct PendingUpload {
    key: String,
    acl: ObjectAcl,
    parts: BTreeMap<i64, Bytes>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_upload: u64,
    objects: HashMap<String, StoredObject>,
    pending: HashMap<String, PendingUpload>,
    aborted: Vec<String>,
    part_sizes: Vec<(String, i64, usize)>,
    fail_begin: bool,
    fail_part: Option<i64>,
    fail_complete: bool,
}

/// Object store kept entirely in memory.
///
/// Cloning yields another handle to the same store, so a test can hand one
/// clone to an uploader and inspect the result through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDestination {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::default(),
        }
    }

    /// Make every `begin` call fail.
    pub fn fail_begin(self) -> Self {
        self.state().fail_begin = true;
        self
    }

    /// Make the upload of part `part_number` fail.
    pub fn fail_part(self, part_number: i64) -> Self {
        self.state().fail_part = Some(part_number);
        self
    }

    pub fn fail_complete(self) -> Self {
        self.state().fail_complete = true;
        self
    }

    /// Contents of a completed object.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.state().objects.get(key).map(|o| o.data.clone())
    }

    pub fn acl(&self, key: &str) -> Option<ObjectAcl> {
        self.state().objects.get(key).map(|o| o.acl)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.state().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys whose multipart upload was aborted, in abort order.
    pub fn aborted(&self) -> Vec<String> {
        self.state().aborted.clone()
    }

    /// Uploads that were started but neither completed nor aborted.
    pub fn pending_uploads(&self) -> usize {
        self.state().pending.len()
    }

    /// `(key, part_number, size)` for every part received, in arrival order.
    pub fn part_sizes(&self) -> Vec<(String, i64, usize)> {
        self.state().part_sizes.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the store from the assertions.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn injected(key: &str, stage: TransferStage) -> UploadError {
        UploadError::Transfer {
            key: key.to_string(),
            stage,
            reason: "injected failure".to_string(),
        }
    }

    fn unknown_upload(key: &str, stage: TransferStage, upload_id: &str) -> UploadError {
        UploadError::Transfer {
            key: key.to_string(),
            stage,
            reason: format!("no such upload: {}", upload_id),
        }
    }
}

#[async_trait]
impl ObjectDestination for MemoryDestination {
    fn describe(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn location_for(&self, key: &str) -> String {
        format!("memory://{}/{}", self.name, key)
    }

    async fn begin(&self, key: &str, acl: ObjectAcl) -> Result<String, UploadError> {
        let mut state = self.state();
        if state.fail_begin {
            return Err(Self::injected(key, TransferStage::Begin));
        }

        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.pending.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                acl,
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i64,
        data: Bytes,
    ) -> Result<PartReceipt, UploadError> {
        let mut state = self.state();
        let stage = TransferStage::Part(part_number);
        if state.fail_part == Some(part_number) {
            return Err(Self::injected(key, stage));
        }

        let size = data.len();
        let upload = state
            .pending
            .get_mut(upload_id)
            .ok_or_else(|| Self::unknown_upload(key, stage, upload_id))?;
        upload.parts.insert(part_number, data);
        state.part_sizes.push((key.to_string(), part_number, size));

        Ok(PartReceipt {
            part_number,
            e_tag: format!("\"{}-{}\"", upload_id, part_number),
        })
    }

    async fn complete(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<PartReceipt>,
    ) -> Result<Option<String>, UploadError> {
        let mut state = self.state();
        if state.fail_complete {
            return Err(Self::injected(key, TransferStage::Complete));
        }

        let upload = state
            .pending
            .remove(upload_id)
            .ok_or_else(|| Self::unknown_upload(key, TransferStage::Complete, upload_id))?;

        let mut data = Vec::new();
        for receipt in &parts {
            let part = upload.parts.get(&receipt.part_number).ok_or_else(|| UploadError::Transfer {
                key: key.to_string(),
                stage: TransferStage::Complete,
                reason: format!("part {} was never uploaded", receipt.part_number),
            })?;
            data.extend_from_slice(part);
        }

        state.objects.insert(
            upload.key,
            StoredObject {
                data: Bytes::from(data),
                acl: upload.acl,
            },
        );
        Ok(Some(self.location_for(key)))
    }

    async fn abort(&self, key: &str, upload_id: &str) -> Result<(), UploadError> {
        let mut state = self.state();
        state.pending.remove(upload_id);
        state.aborted.push(key.to_string());
        Ok(())
    }
}

/// Hands out handles to one shared [`MemoryDestination`].
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    destination: MemoryDestination,
    refuse: bool,
}

impl MemoryConnector {
    pub fn new(destination: MemoryDestination) -> Self {
        Self {
            destination,
            refuse: false,
        }
    }

    /// A connector whose sessions can never be established.
    pub fn refusing() -> Self {
        Self {
            destination: MemoryDestination::new("unreachable"),
            refuse: true,
        }
    }
}

impl Connector for MemoryConnector {
    type Destination = MemoryDestination;

    fn connect(&self) -> Result<MemoryDestination, UploadError> {
        if self.refuse {
            return Err(UploadError::Session {
                endpoint: self.destination.describe(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.destination.clone())
    }
}
