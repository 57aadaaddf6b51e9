//! Repository Layer
//!
//! Data access abstractions and implementations.

mod batch;
mod blob_store;
mod db;
mod document_repo;
mod hub;
mod memory_repo;
mod traits;

#[cfg(test)]
mod tests;

pub use batch::{BatchOp, WriteBatch};
pub use blob_store::{validate_blob_path, FsBlobStore, MemoryBlobStore};
pub use db::{init_db, DbState};
pub use document_repo::SqliteRecordStore;
pub use hub::{SnapshotEvent, Subscription, SubscriptionHub, DEFAULT_BUFFER};
pub use memory_repo::MemoryRecordStore;
pub use traits::{BlobStore, RecordStore};
