//! Subscription Hub
//!
//! One broadcast channel per collection. Stores publish a full snapshot
//! after every write; subscribers receive them in commit order.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::domain::{CollectionPath, Document, DomainError, Query};

/// Default channel capacity per collection
pub const DEFAULT_BUFFER: usize = 64;

/// What a subscriber receives
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    /// The full, sorted contents of the watched collection
    Snapshot(Vec<Document>),
    /// The store could not deliver a snapshot
    Error(DomainError),
}

pub struct SubscriptionHub {
    channels: Mutex<HashMap<CollectionPath, broadcast::Sender<SnapshotEvent>>>,
    capacity: usize,
}

impl SubscriptionHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, collection: &CollectionPath) -> broadcast::Sender<SnapshotEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(collection.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Register a subscriber. `initial` must be read under the same lock
    /// writers publish under, so no push falls between the two.
    pub fn subscribe(&self, query: Query, initial: Vec<Document>) -> Subscription {
        let rx = self.sender(&query.collection).subscribe();
        Subscription {
            query,
            initial: Some(initial),
            rx,
        }
    }

    pub fn publish(&self, collection: &CollectionPath, docs: Vec<Document>) {
        let sent = self.sender(collection).send(SnapshotEvent::Snapshot(docs));
        if let Ok(receivers) = sent {
            log::debug!("Pushed snapshot of {} to {} subscriber(s)", collection, receivers);
        }
    }

    pub fn publish_error(&self, collection: &CollectionPath, error: DomainError) {
        log::error!("Subscription error on {}: {}", collection, error);
        // No receivers is fine
        let _ = self.sender(collection).send(SnapshotEvent::Error(error));
    }

    pub fn subscriber_count(&self, collection: &CollectionPath) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .get(collection)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

/// A live view of one collection
pub struct Subscription {
    query: Query,
    initial: Option<Vec<Document>>,
    rx: broadcast::Receiver<SnapshotEvent>,
}

impl Subscription {
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Next event; the first one is always the snapshot taken at subscribe
    /// time. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        if let Some(docs) = self.initial.take() {
            return Some(self.prepare(SnapshotEvent::Snapshot(docs)));
        }

        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(self.prepare(event)),
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!(
                        "Subscriber on {} lagged by {} push(es), skipping to newest",
                        self.query.collection,
                        skipped
                    );
                    if let Some(event) = self.drain_to_newest() {
                        return Some(self.prepare(event));
                    }
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn drain_to_newest(&mut self) -> Option<SnapshotEvent> {
        let mut newest = None;
        loop {
            match self.rx.try_recv() {
                Ok(event) => newest = Some(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return newest,
            }
        }
    }

    fn prepare(&self, event: SnapshotEvent) -> SnapshotEvent {
        match event {
            SnapshotEvent::Snapshot(mut docs) => {
                self.query.sort(&mut docs);
                SnapshotEvent::Snapshot(docs)
            }
            error => error,
        }
    }
}
