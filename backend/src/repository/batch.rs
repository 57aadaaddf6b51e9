//! Batched Writes
//!
//! A list of update/delete operations committed atomically by a store.

use std::collections::BTreeSet;

use crate::domain::{CollectionPath, DomainError, DomainResult, Fields};

/// One operation inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Update {
        collection: CollectionPath,
        id: String,
        patch: Fields,
    },
    Delete {
        collection: CollectionPath,
        id: String,
    },
}

impl BatchOp {
    pub fn collection(&self) -> &CollectionPath {
        match self {
            BatchOp::Update { collection, .. } | BatchOp::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            BatchOp::Update { id, .. } | BatchOp::Delete { id, .. } => id,
        }
    }
}

/// Multi-document write applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, collection: &CollectionPath, id: &str, patch: Fields) -> &mut Self {
        self.ops.push(BatchOp::Update {
            collection: collection.clone(),
            id: id.to_string(),
            patch,
        });
        self
    }

    pub fn delete(&mut self, collection: &CollectionPath, id: &str) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            collection: collection.clone(),
            id: id.to_string(),
        });
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Collections touched by the batch (each gets one snapshot push)
    pub fn collections(&self) -> BTreeSet<CollectionPath> {
        self.ops.iter().map(|op| op.collection().clone()).collect()
    }

    /// Reject empty batches before touching storage
    pub(crate) fn ensure_not_empty(&self) -> DomainResult<()> {
        if self.ops.is_empty() {
            return Err(DomainError::InvalidInput("Empty write batch".to_string()));
        }
        Ok(())
    }
}
