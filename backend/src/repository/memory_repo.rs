//! In-Memory Record Store
//!
//! HashMap-backed implementation, used by tests and demos.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::batch::{BatchOp, WriteBatch};
use super::hub::{Subscription, SubscriptionHub, DEFAULT_BUFFER};
use super::traits::RecordStore;
use crate::domain::{CollectionPath, Document, DomainError, DomainResult, Fields, Query};

type Collections = HashMap<CollectionPath, Vec<Document>>;

pub struct MemoryRecordStore {
    collections: Mutex<Collections>,
    hub: SubscriptionHub,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            hub: SubscriptionHub::new(buffer),
        }
    }

    /// Push an error to every subscriber of `collection`
    pub async fn broadcast_error(&self, collection: &CollectionPath, error: DomainError) {
        let _guard = self.collections.lock().await;
        self.hub.publish_error(collection, error);
    }

    pub fn subscriber_count(&self, collection: &CollectionPath) -> usize {
        self.hub.subscriber_count(collection)
    }

    fn publish(&self, collections: &Collections, collection: &CollectionPath) {
        let docs = collections.get(collection).cloned().unwrap_or_default();
        self.hub.publish(collection, docs);
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(collections: &mut Collections, op: BatchOp) -> DomainResult<()> {
    match op {
        BatchOp::Update { collection, id, patch } => {
            let doc = collections
                .get_mut(&collection)
                .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
                .ok_or_else(|| DomainError::NotFound(format!("{}/{}", collection, id)))?;
            doc.merge(patch);
        }
        BatchOp::Delete { collection, id } => {
            if let Some(docs) = collections.get_mut(&collection) {
                docs.retain(|d| d.id != id);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, collection: &CollectionPath, fields: Fields) -> DomainResult<Document> {
        let mut collections = self.collections.lock().await;
        let doc = Document::new(Uuid::new_v4().to_string(), fields);
        collections
            .entry(collection.clone())
            .or_default()
            .push(doc.clone());
        self.publish(&collections, collection);
        Ok(doc)
    }

    async fn get(&self, collection: &CollectionPath, id: &str) -> DomainResult<Option<Document>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn list(&self, collection: &CollectionPath) -> DomainResult<Vec<Document>> {
        let collections = self.collections.lock().await;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn update(&self, collection: &CollectionPath, id: &str, patch: Fields) -> DomainResult<()> {
        let mut collections = self.collections.lock().await;
        apply(
            &mut collections,
            BatchOp::Update {
                collection: collection.clone(),
                id: id.to_string(),
                patch,
            },
        )?;
        self.publish(&collections, collection);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> DomainResult<()> {
        let mut collections = self.collections.lock().await;
        let existed = collections
            .get(collection)
            .map(|docs| docs.iter().any(|d| d.id == id))
            .unwrap_or(false);
        if !existed {
            return Ok(());
        }
        apply(
            &mut collections,
            BatchOp::Delete {
                collection: collection.clone(),
                id: id.to_string(),
            },
        )?;
        self.publish(&collections, collection);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> DomainResult<()> {
        batch.ensure_not_empty()?;
        let touched = batch.collections();

        let mut collections = self.collections.lock().await;
        // Apply to a scratch copy so a failing op leaves nothing behind
        let mut staged = collections.clone();
        for op in batch.into_ops() {
            apply(&mut staged, op)?;
        }
        *collections = staged;

        for collection in &touched {
            self.publish(&collections, collection);
        }
        Ok(())
    }

    async fn subscribe(&self, query: Query) -> DomainResult<Subscription> {
        let collections = self.collections.lock().await;
        let initial = collections
            .get(&query.collection)
            .cloned()
            .unwrap_or_default();
        Ok(self.hub.subscribe(query, initial))
    }
}
