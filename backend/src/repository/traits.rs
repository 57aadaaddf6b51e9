//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for the record store and blob storage.
//! Implementations can use SQLite, in-memory maps, the filesystem, etc.

use async_trait::async_trait;

use super::batch::WriteBatch;
use super::hub::Subscription;
use crate::domain::{CollectionPath, Document, DomainResult, Fields, Query};

/// Collection-scoped document store with push subscriptions
///
/// All operations are async to support various backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a document; the store assigns its id and timestamps
    async fn create(&self, collection: &CollectionPath, fields: Fields) -> DomainResult<Document>;

    /// Find a document by id
    async fn get(&self, collection: &CollectionPath, id: &str) -> DomainResult<Option<Document>>;

    /// All documents of a collection, in creation order
    async fn list(&self, collection: &CollectionPath) -> DomainResult<Vec<Document>>;

    /// Merge `patch` into an existing document (`NotFound` if missing)
    async fn update(&self, collection: &CollectionPath, id: &str, patch: Fields) -> DomainResult<()>;

    /// Delete a document; deleting a missing document succeeds
    async fn delete(&self, collection: &CollectionPath, id: &str) -> DomainResult<()>;

    /// Apply every operation of `batch` atomically
    async fn commit(&self, batch: WriteBatch) -> DomainResult<()>;

    /// Watch a collection: the first event is the current snapshot, every
    /// later write touching the collection pushes a new full snapshot
    async fn subscribe(&self, query: Query) -> DomainResult<Subscription>;
}

/// Path-addressed object storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path`, replacing any existing object
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> DomainResult<()>;

    /// A URL the object can be fetched from
    async fn download_url(&self, path: &str) -> DomainResult<String>;

    /// Remove the object (`NotFound` if missing)
    async fn delete(&self, path: &str) -> DomainResult<()>;
}
