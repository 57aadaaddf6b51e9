//! Repository Integration Tests
//!
//! Exercises both record stores (SQLite in-memory and the HashMap store)
//! through the `RecordStore` trait, plus the blob stores.

#[cfg(test)]
mod tests {
    use crate::domain::{fields, CollectionPath, Direction, DomainError, Query};
    use crate::repository::{
        init_db, BlobStore, FsBlobStore, MemoryBlobStore, MemoryRecordStore, RecordStore,
        SnapshotEvent, SqliteRecordStore, Subscription, WriteBatch,
    };
    use serde_json::json;
    use std::path::PathBuf;

    async fn sqlite_store() -> SqliteRecordStore {
        let db_state = init_db(&PathBuf::from(":memory:"))
            .await
            .expect("Failed to init test DB");
        SqliteRecordStore::new(db_state.connection())
    }

    async fn stores() -> Vec<Box<dyn RecordStore>> {
        vec![Box::new(sqlite_store().await), Box::new(MemoryRecordStore::new())]
    }

    async fn next_ids(sub: &mut Subscription) -> Vec<String> {
        match sub.next().await {
            Some(SnapshotEvent::Snapshot(docs)) => docs.into_iter().map(|d| d.id).collect(),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    async fn next_names(sub: &mut Subscription) -> Vec<String> {
        match sub.next().await {
            Some(SnapshotEvent::Snapshot(docs)) => docs
                .iter()
                .map(|d| d.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string())
                .collect(),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let projects = CollectionPath::new("projects");
        for store in stores().await {
            let created = store
                .create(&projects, fields(json!({"name": "Website", "progress": 10})))
                .await
                .expect("Failed to create");
            assert!(!created.id.is_empty());

            let found = store.get(&projects, &created.id).await.expect("Find failed");
            let found = found.expect("record should exist");
            assert_eq!(found.get("name"), Some(&json!("Website")));
            assert_eq!(found.get("progress"), Some(&json!(10)));
        }
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let projects = CollectionPath::new("projects");
        for store in stores().await {
            let created = store
                .create(&projects, fields(json!({"name": "Old", "status": "In Progress"})))
                .await
                .unwrap();
            store
                .update(&projects, &created.id, fields(json!({"name": "New Name"})))
                .await
                .expect("Update failed");

            let doc = store.get(&projects, &created.id).await.unwrap().unwrap();
            assert_eq!(doc.get("name"), Some(&json!("New Name")));
            assert_eq!(doc.get("status"), Some(&json!("In Progress")));
        }
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let clients = CollectionPath::new("clients");
        for store in stores().await {
            let result = store.update(&clients, "nope", fields(json!({"name": "x"}))).await;
            assert!(matches!(result, Err(DomainError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let members = CollectionPath::new("teamMembers");
        for store in stores().await {
            let created = store.create(&members, fields(json!({"name": "Ana"}))).await.unwrap();
            store.delete(&members, &created.id).await.expect("Delete failed");
            store.delete(&members, &created.id).await.expect("Second delete failed");
            assert!(store.get(&members, &created.id).await.unwrap().is_none());
            assert!(store.list(&members).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let payouts = CollectionPath::new("payouts");
        for store in stores().await {
            let a = store.create(&payouts, fields(json!({"name": "A", "order": 0}))).await.unwrap();
            let b = store.create(&payouts, fields(json!({"name": "B", "order": 1}))).await.unwrap();

            let mut batch = WriteBatch::new();
            batch
                .update(&payouts, &a.id, fields(json!({"order": 1})))
                .update(&payouts, "missing", fields(json!({"order": 2})))
                .update(&payouts, &b.id, fields(json!({"order": 0})));
            assert!(matches!(store.commit(batch).await, Err(DomainError::NotFound(_))));

            let a_now = store.get(&payouts, &a.id).await.unwrap().unwrap();
            assert_eq!(a_now.get("order"), Some(&json!(0)));

            let mut batch = WriteBatch::new();
            batch
                .update(&payouts, &a.id, fields(json!({"order": 1})))
                .update(&payouts, &b.id, fields(json!({"order": 0})));
            store.commit(batch).await.expect("Batch failed");

            let b_now = store.get(&payouts, &b.id).await.unwrap().unwrap();
            assert_eq!(b_now.get("order"), Some(&json!(0)));
        }
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        for store in stores().await {
            let result = store.commit(WriteBatch::new()).await;
            assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn test_subscription_pushes_sorted_snapshots() {
        let payouts = CollectionPath::new("payouts");
        for store in stores().await {
            let a = store.create(&payouts, fields(json!({"name": "A", "order": 1}))).await.unwrap();
            store.create(&payouts, fields(json!({"name": "B", "order": 0}))).await.unwrap();

            let mut sub = store
                .subscribe(Query::collection("payouts").order_by_field("order", Direction::Asc))
                .await
                .expect("Subscribe failed");
            assert_eq!(next_names(&mut sub).await, vec!["B", "A"]);

            store.update(&payouts, &a.id, fields(json!({"order": -1}))).await.unwrap();
            assert_eq!(next_names(&mut sub).await, vec!["A", "B"]);

            store.delete(&payouts, &a.id).await.unwrap();
            assert_eq!(next_names(&mut sub).await, vec!["B"]);
        }
    }

    #[tokio::test]
    async fn test_batch_pushes_once_per_collection() {
        let payouts = CollectionPath::new("payouts");
        for store in stores().await {
            let a = store.create(&payouts, fields(json!({"order": 0}))).await.unwrap();
            let b = store.create(&payouts, fields(json!({"order": 1}))).await.unwrap();

            let mut sub = store.subscribe(Query::collection("payouts")).await.unwrap();
            assert_eq!(next_ids(&mut sub).await.len(), 2);

            let mut batch = WriteBatch::new();
            batch
                .update(&payouts, &a.id, fields(json!({"order": 1})))
                .update(&payouts, &b.id, fields(json!({"order": 0})));
            store.commit(batch).await.unwrap();
            store.create(&payouts, fields(json!({"order": 2}))).await.unwrap();

            // One push for the batch, then one for the create
            assert_eq!(next_ids(&mut sub).await.len(), 2);
            assert_eq!(next_ids(&mut sub).await.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_subcollections_are_isolated() {
        let payouts = CollectionPath::new("payouts");
        for store in stores().await {
            let parent = store.create(&payouts, fields(json!({"name": "Acme"}))).await.unwrap();
            let milestones = payouts.child(&parent.id, "milestones");
            store.create(&milestones, fields(json!({"title": "Kickoff"}))).await.unwrap();

            assert_eq!(store.list(&payouts).await.unwrap().len(), 1);
            assert_eq!(store.list(&milestones).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_memory_store_broadcasts_errors() {
        let store = MemoryRecordStore::new();
        let clients = CollectionPath::new("clients");
        let mut sub = store.subscribe(Query::collection("clients")).await.unwrap();
        assert!(next_ids(&mut sub).await.is_empty());

        store
            .broadcast_error(&clients, DomainError::Storage("permission denied".to_string()))
            .await;
        assert!(matches!(sub.next().await, Some(SnapshotEvent::Error(_))));

        drop(sub);
        assert_eq!(store.subscriber_count(&clients), 0);
    }

    #[tokio::test]
    async fn test_sqlite_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("console.db");
        let projects = CollectionPath::new("projects");

        let id = {
            let state = init_db(&path).await.unwrap();
            let store = SqliteRecordStore::new(state.connection());
            store.create(&projects, fields(json!({"name": "Kept"}))).await.unwrap().id
        };

        let state = init_db(&path).await.unwrap();
        let store = SqliteRecordStore::new(state.connection());
        let doc = store.get(&projects, &id).await.unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("Kept")));

        state.close().await;
        assert!(matches!(store.list(&projects).await, Err(DomainError::Internal(_))));
    }

    #[tokio::test]
    async fn test_fs_blob_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::new(dir.path());

        blobs
            .upload("clients/c1/files/abc_my file.txt", b"hello".to_vec())
            .await
            .expect("Upload failed");
        let url = blobs
            .download_url("clients/c1/files/abc_my file.txt")
            .await
            .expect("URL failed");
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("abc_my%20file.txt"));

        blobs.delete("clients/c1/files/abc_my file.txt").await.expect("Delete failed");
        assert!(matches!(
            blobs.delete("clients/c1/files/abc_my file.txt").await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blob_paths_are_validated() {
        let blobs = MemoryBlobStore::new();
        for bad in ["", "/etc/passwd", "clients/../secret", "a//b"] {
            assert!(matches!(
                blobs.upload(bad, vec![1]).await,
                Err(DomainError::InvalidInput(_))
            ));
        }

        blobs.upload("clients/c1/files/a.png", vec![1, 2]).await.unwrap();
        assert_eq!(
            blobs.download_url("clients/c1/files/a.png").await.unwrap(),
            "mem://clients/c1/files/a.png"
        );
        assert!(blobs.contains("clients/c1/files/a.png").await);
    }
}
