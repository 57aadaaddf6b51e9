//! Subscription Glue
//!
//! Runs a store subscription on a task and feeds each event to a page
//! callback. Dropping the handle cancels the subscription.

use std::collections::HashMap;
use std::sync::Arc;

use pm_console_backend::{CollectionPath, Query, RecordStore, SnapshotEvent};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Live subscription; aborted on drop
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
    /// Count of events handed to the callback
    applied: watch::Receiver<u64>,
}

impl SubscriptionHandle {
    pub fn applied(&self) -> u64 {
        *self.applied.borrow()
    }

    /// Wait until at least `count` events have been handled.
    /// Returns false if the subscription ended first.
    pub async fn wait_for(&self, count: u64) -> bool {
        wait_applied(self.watcher(), count).await
    }

    /// Detached view of the event counter, usable without borrowing the handle
    pub fn watcher(&self) -> watch::Receiver<u64> {
        self.applied.clone()
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Wait on a counter taken from [`SubscriptionHandle::watcher`]
pub async fn wait_applied(mut rx: watch::Receiver<u64>, count: u64) -> bool {
    rx.wait_for(|applied| *applied >= count).await.is_ok()
}

/// Subscribe to `query` and call `on_event` for every push, in order.
///
/// A failed subscribe is reported to `on_event` as an error event.
pub fn watch_collection<F>(store: Arc<dyn RecordStore>, query: Query, mut on_event: F) -> SubscriptionHandle
where
    F: FnMut(SnapshotEvent) + Send + 'static,
{
    let (tx, rx) = watch::channel(0u64);
    let task = tokio::spawn(async move {
        let collection = query.collection.clone();
        let mut subscription = match store.subscribe(query).await {
            Ok(subscription) => subscription,
            Err(e) => {
                log::error!("Could not subscribe to {}: {}", collection, e);
                on_event(SnapshotEvent::Error(e));
                tx.send_modify(|n| *n += 1);
                return;
            }
        };
        while let Some(event) = subscription.next().await {
            on_event(event);
            tx.send_modify(|n| *n += 1);
        }
        log::debug!("Subscription to {} closed", collection);
    });
    SubscriptionHandle { task, applied: rx }
}

type ChildHandler = Arc<dyn Fn(&str, SnapshotEvent) + Send + Sync>;

/// One subscription per parent document to its `name` sub-collection
pub struct ChildSubscriptions {
    store: Arc<dyn RecordStore>,
    parent: CollectionPath,
    name: String,
    /// Builds the query for a child collection path
    query: fn(CollectionPath) -> Query,
    handler: ChildHandler,
    active: HashMap<String, SubscriptionHandle>,
}

impl ChildSubscriptions {
    pub fn new<F>(
        store: Arc<dyn RecordStore>,
        parent: CollectionPath,
        name: &str,
        query: fn(CollectionPath) -> Query,
        handler: F,
    ) -> Self
    where
        F: Fn(&str, SnapshotEvent) + Send + Sync + 'static,
    {
        Self {
            store,
            parent,
            name: name.to_string(),
            query,
            handler: Arc::new(handler),
            active: HashMap::new(),
        }
    }

    /// Open subscriptions for new parents and cancel those whose parent is
    /// gone. Returns the removed parent ids.
    pub fn sync_parents<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let wanted: Vec<&str> = ids.into_iter().collect();

        let stale: Vec<String> = self
            .active
            .keys()
            .filter(|id| !wanted.contains(&id.as_str()))
            .cloned()
            .collect();
        for id in &stale {
            // Dropping the handle aborts the task
            self.active.remove(id);
        }

        for id in wanted {
            if self.active.contains_key(id) {
                continue;
            }
            let path = self.parent.child(id, &self.name);
            let handler = self.handler.clone();
            let parent_id = id.to_string();
            let handle = watch_collection(self.store.clone(), (self.query)(path), move |event| {
                handler(&parent_id, event)
            });
            self.active.insert(id.to_string(), handle);
        }
        stale
    }

    pub fn parent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn handle(&self, parent_id: &str) -> Option<&SubscriptionHandle> {
        self.active.get(parent_id)
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}
