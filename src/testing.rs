//! Test doubles: a record store that remembers every write and a blob
//! store that fails chosen deletes or every download URL.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use pm_console_backend::repository::BatchOp;
use pm_console_backend::{
    BlobStore, CollectionPath, Document, DomainError, DomainResult, Fields, MemoryBlobStore,
    MemoryRecordStore, Query, RecordStore, Subscription, WriteBatch,
};

use crate::components::lock;

/// One write that reached the store
#[derive(Debug, Clone, PartialEq)]
pub enum WriteCall {
    Create {
        collection: CollectionPath,
        fields: Fields,
    },
    Update {
        collection: CollectionPath,
        id: String,
        patch: Fields,
    },
    Delete {
        collection: CollectionPath,
        id: String,
    },
    Commit {
        ops: Vec<BatchOp>,
    },
}

impl WriteCall {
    pub fn patch(&self) -> Option<&Fields> {
        match self {
            WriteCall::Update { patch, .. } => Some(patch),
            _ => None,
        }
    }

    pub fn ops(&self) -> Option<&[BatchOp]> {
        match self {
            WriteCall::Commit { ops } => Some(ops),
            _ => None,
        }
    }
}

/// In-memory store that records writes made through the trait
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryRecordStore,
    calls: Mutex<Vec<WriteCall>>,
    fail_writes: AtomicBool,
    fail_next_commit: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store; writes made through it are not recorded
    pub fn inner(&self) -> &MemoryRecordStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<WriteCall> {
        lock(&self.calls).clone()
    }

    /// Reject every write (still recorded) until turned off
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: WriteCall) -> DomainResult<()> {
        lock(&self.calls).push(call);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::Storage("write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn create(&self, collection: &CollectionPath, fields: Fields) -> DomainResult<Document> {
        self.record(WriteCall::Create {
            collection: collection.clone(),
            fields: fields.clone(),
        })?;
        self.inner.create(collection, fields).await
    }

    async fn get(&self, collection: &CollectionPath, id: &str) -> DomainResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn list(&self, collection: &CollectionPath) -> DomainResult<Vec<Document>> {
        self.inner.list(collection).await
    }

    async fn update(&self, collection: &CollectionPath, id: &str, patch: Fields) -> DomainResult<()> {
        self.record(WriteCall::Update {
            collection: collection.clone(),
            id: id.to_string(),
            patch: patch.clone(),
        })?;
        self.inner.update(collection, id, patch).await
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> DomainResult<()> {
        self.record(WriteCall::Delete {
            collection: collection.clone(),
            id: id.to_string(),
        })?;
        self.inner.delete(collection, id).await
    }

    async fn commit(&self, batch: WriteBatch) -> DomainResult<()> {
        self.record(WriteCall::Commit {
            ops: batch.ops().to_vec(),
        })?;
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(DomainError::Storage("batch rejected".to_string()));
        }
        self.inner.commit(batch).await
    }

    async fn subscribe(&self, query: Query) -> DomainResult<Subscription> {
        self.inner.subscribe(query).await
    }
}

/// In-memory blob store whose deletes fail for chosen paths
#[derive(Default)]
pub struct FlakyBlobStore {
    inner: MemoryBlobStore,
    failing: Mutex<HashSet<String>>,
    attempted: Mutex<Vec<String>>,
    fail_urls: AtomicBool,
}

impl FlakyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently holding bytes, sorted
    pub async fn stored_paths(&self) -> Vec<String> {
        let mut paths = self.inner.paths().await;
        paths.sort();
        paths
    }

    pub fn fail_download_urls(&self) {
        self.fail_urls.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, path: &str) {
        lock(&self.failing).insert(path.to_string());
    }

    /// Every path a delete was attempted for, sorted
    pub fn attempted_deletes(&self) -> Vec<String> {
        let mut attempted = lock(&self.attempted).clone();
        attempted.sort();
        attempted
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> DomainResult<()> {
        self.inner.upload(path, bytes).await
    }

    async fn download_url(&self, path: &str) -> DomainResult<String> {
        if self.fail_urls.load(Ordering::SeqCst) {
            return Err(DomainError::Storage(format!("no URL for {}", path)));
        }
        self.inner.download_url(path).await
    }

    async fn delete(&self, path: &str) -> DomainResult<()> {
        lock(&self.attempted).push(path.to_string());
        if lock(&self.failing).contains(path) {
            return Err(DomainError::Storage(format!("cannot delete {}", path)));
        }
        self.inner.delete(path).await
    }
}
