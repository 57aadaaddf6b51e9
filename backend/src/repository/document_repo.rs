//! Document Repository
//!
//! SQLite-backed record store. Every collection lives in one `documents`
//! table keyed by (collection, id); fields are stored as a JSON object.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::batch::{BatchOp, WriteBatch};
use super::hub::{Subscription, SubscriptionHub, DEFAULT_BUFFER};
use super::traits::RecordStore;
use crate::domain::{CollectionPath, Document, DomainError, DomainResult, Fields, Query};

pub struct SqliteRecordStore {
    conn: Arc<Mutex<Option<Connection>>>,
    hub: SubscriptionHub,
}

impl SqliteRecordStore {
    pub fn new(conn: Arc<Mutex<Option<Connection>>>) -> Self {
        Self::with_buffer(conn, DEFAULT_BUFFER)
    }

    pub fn with_buffer(conn: Arc<Mutex<Option<Connection>>>, buffer: usize) -> Self {
        Self {
            conn,
            hub: SubscriptionHub::new(buffer),
        }
    }

    fn publish(&self, conn: &Connection, collection: &CollectionPath) {
        match load_collection(conn, collection) {
            Ok(docs) => self.hub.publish(collection, docs),
            Err(e) => self.hub.publish_error(collection, e),
        }
    }
}

fn not_initialized() -> DomainError {
    DomainError::Internal("Database not initialized".to_string())
}

fn millis_to_time(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, i64, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_document((id, json, created, updated): (String, String, i64, i64)) -> DomainResult<Document> {
    let fields: Fields = serde_json::from_str(&json)?;
    Ok(Document {
        id,
        fields,
        created_at: millis_to_time(created),
        updated_at: millis_to_time(updated),
    })
}

fn load_collection(conn: &Connection, collection: &CollectionPath) -> DomainResult<Vec<Document>> {
    let mut stmt = conn.prepare(
        "SELECT id, fields, created_at, updated_at FROM documents
         WHERE collection = ? ORDER BY created_at, rowid",
    )?;
    let rows = stmt.query_map(params![collection.as_str()], row_to_document)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(into_document(row?)?);
    }
    Ok(docs)
}

fn load_one(conn: &Connection, collection: &CollectionPath, id: &str) -> DomainResult<Option<Document>> {
    let row = conn
        .query_row(
            "SELECT id, fields, created_at, updated_at FROM documents
             WHERE collection = ? AND id = ?",
            params![collection.as_str(), id],
            row_to_document,
        )
        .optional()?;
    row.map(into_document).transpose()
}

fn apply(conn: &Connection, op: &BatchOp) -> DomainResult<()> {
    match op {
        BatchOp::Update { collection, id, patch } => {
            let mut doc = load_one(conn, collection, id)?
                .ok_or_else(|| DomainError::NotFound(format!("{}/{}", collection, id)))?;
            doc.merge(patch.clone());
            conn.execute(
                "UPDATE documents SET fields = ?, updated_at = ? WHERE collection = ? AND id = ?",
                params![
                    serde_json::to_string(&doc.fields)?,
                    doc.updated_at.timestamp_millis(),
                    collection.as_str(),
                    id
                ],
            )?;
        }
        BatchOp::Delete { collection, id } => {
            conn.execute(
                "DELETE FROM documents WHERE collection = ? AND id = ?",
                params![collection.as_str(), id],
            )?;
        }
    }
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, collection: &CollectionPath, fields: Fields) -> DomainResult<Document> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let now = Utc::now().timestamp_millis();
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO documents (collection, id, fields, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            params![collection.as_str(), id, serde_json::to_string(&fields)?, now, now],
        )?;

        self.publish(conn, collection);
        Ok(Document {
            id,
            fields,
            created_at: millis_to_time(now),
            updated_at: millis_to_time(now),
        })
    }

    async fn get(&self, collection: &CollectionPath, id: &str) -> DomainResult<Option<Document>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        load_one(conn, collection, id)
    }

    async fn list(&self, collection: &CollectionPath) -> DomainResult<Vec<Document>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        load_collection(conn, collection)
    }

    async fn update(&self, collection: &CollectionPath, id: &str, patch: Fields) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        apply(
            conn,
            &BatchOp::Update {
                collection: collection.clone(),
                id: id.to_string(),
                patch,
            },
        )?;
        self.publish(conn, collection);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ? AND id = ?",
            params![collection.as_str(), id],
        )?;
        if removed > 0 {
            self.publish(conn, collection);
        }
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> DomainResult<()> {
        batch.ensure_not_empty()?;

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;

        {
            // Dropping the transaction without commit rolls it back
            let tx = conn.transaction()?;
            for op in batch.ops() {
                apply(&tx, op)?;
            }
            tx.commit()?;
        }

        for collection in batch.collections() {
            self.publish(conn, &collection);
        }
        Ok(())
    }

    async fn subscribe(&self, query: Query) -> DomainResult<Subscription> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        let initial = load_collection(conn, &query.collection)?;
        Ok(self.hub.subscribe(query, initial))
    }
}
