//! PM Console Backend
//!
//! Layered architecture:
//! - domain: records, collection paths, queries and errors
//! - repository: record store and blob storage traits and implementations
//! - config: the console's settings file

pub mod config;
pub mod domain;
pub mod repository;

pub use config::ConsoleConfig;
pub use domain::{
    fields, CollectionPath, Direction, Document, DomainError, DomainResult, Fields, Query,
};
pub use repository::{
    init_db, BlobStore, DbState, FsBlobStore, MemoryBlobStore, MemoryRecordStore, RecordStore,
    SnapshotEvent, SqliteRecordStore, Subscription, WriteBatch,
};
