//! Nested Collection Updater
//!
//! Pure read-modify-write helpers over embedded item lists. Callers take
//! the list from the freshest mirror state, build the new list here and
//! write it back together with any aggregate in a single update.

use std::collections::HashSet;
use std::sync::Arc;

use pm_console_backend::{BlobStore, DomainResult};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::models::NestedItem;

/// `<prefix>-<uuid>` identifier for a new nested item
pub fn new_item_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// New list with `item` appended
pub fn append<T: NestedItem>(items: &[T], item: T) -> Vec<T> {
    let mut next = items.to_vec();
    next.push(item);
    next
}

/// New list with the item `id` changed by `change`; None if it is absent
pub fn update_item<T: NestedItem>(items: &[T], id: &str, change: impl FnOnce(&mut T)) -> Option<Vec<T>> {
    let mut next = items.to_vec();
    let item = next.iter_mut().find(|item| item.item_id() == id)?;
    change(item);
    Some(next)
}

/// Split `items` into those kept and those whose id is in `ids`
pub fn remove_items<T: NestedItem>(items: &[T], ids: &HashSet<String>) -> (Vec<T>, Vec<T>) {
    items.iter().cloned().partition(|item| !ids.contains(item.item_id()))
}

/// Serialize a nested list for a field patch
pub fn to_value<T: Serialize>(items: &T) -> DomainResult<Value> {
    Ok(serde_json::to_value(items)?)
}

/// Outcome of a best-effort blob sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Delete every blob in parallel. Individual failures are logged and
/// reported, never returned as an error.
pub async fn sweep_blobs(blobs: Arc<dyn BlobStore>, paths: Vec<String>) -> SweepReport {
    let mut set = JoinSet::new();
    for path in paths {
        let blobs = blobs.clone();
        set.spawn(async move {
            let result = blobs.delete(&path).await;
            (path, result)
        });
    }

    let mut report = SweepReport::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((path, Ok(()))) => report.deleted.push(path),
            Ok((path, Err(e))) => {
                log::warn!("Could not delete blob {}: {}", path, e);
                report.failed.push(path);
            }
            Err(e) => log::warn!("Blob delete task failed: {}", e),
        }
    }
    report.deleted.sort();
    report.failed.sort();
    report
}

/// Nested items marked for a batched delete
#[derive(Debug, Default, Clone)]
pub struct SelectionSet {
    active: bool,
    ids: HashSet<String>,
}

impl SelectionSet {
    pub fn enter(&mut self) {
        self.active = true;
        self.ids.clear();
    }

    /// Leaving selection mode forgets the selection
    pub fn exit(&mut self) {
        self.active = false;
        self.ids.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Flip one id; returns whether it is now selected
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    /// Select all of `visible`, or clear when all of them already are
    pub fn toggle_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a str>) {
        let visible: Vec<&str> = visible.into_iter().collect();
        if !visible.is_empty() && visible.iter().all(|id| self.ids.contains(*id)) {
            self.ids.clear();
        } else {
            self.ids = visible.into_iter().map(str::to_string).collect();
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Milestone, MilestoneStatus};
    use pm_console_backend::MemoryBlobStore;

    fn milestone(id: &str, amount: f64) -> Milestone {
        Milestone {
            id: id.to_string(),
            amount,
            ..Milestone::default()
        }
    }

    #[test]
    fn test_ids_are_prefixed_and_unique() {
        let a = new_item_id("ms");
        let b = new_item_id("ms");
        assert!(a.starts_with("ms-"));
        assert_eq!(a.len(), 3 + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_update_and_remove() {
        let items = vec![milestone("a", 1.0), milestone("b", 2.0)];
        let next = update_item(&items, "b", |m| m.status = MilestoneStatus::Paid).unwrap();
        assert_eq!(next[1].status, MilestoneStatus::Paid);
        assert_eq!(items[1].status, MilestoneStatus::Pending);
        assert!(update_item(&items, "zz", |_| {}).is_none());

        let ids: HashSet<String> = ["a".to_string()].into_iter().collect();
        let (kept, removed) = remove_items(&next, &ids);
        assert_eq!(kept.len(), 1);
        assert_eq!(removed[0].id, "a");

        let appended = append(&kept, milestone("c", 3.0));
        assert_eq!(appended.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_sweep_reports_missing_blobs() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.upload("clients/c1/files/a", vec![1]).await.unwrap();
        let report = sweep_blobs(
            blobs.clone(),
            vec!["clients/c1/files/a".to_string(), "clients/c1/files/missing".to_string()],
        )
        .await;
        assert_eq!(report.deleted, vec!["clients/c1/files/a"]);
        assert_eq!(report.failed, vec!["clients/c1/files/missing"]);
        assert!(!blobs.contains("clients/c1/files/a").await);
    }

    #[test]
    fn test_selection() {
        let mut selection = SelectionSet::default();
        selection.enter();
        assert!(selection.toggle("f1"));
        assert!(!selection.toggle("f1"));
        selection.toggle_all(["f1", "f2"]);
        assert_eq!(selection.len(), 2);
        selection.toggle_all(["f1", "f2"]);
        assert!(selection.is_empty());
        selection.toggle("f3");
        selection.exit();
        assert!(selection.is_empty());
        assert!(!selection.is_active());
    }
}
