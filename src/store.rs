//! Local Mirror State
//!
//! The page's copy of one collection. Every snapshot push replaces it
//! wholesale; nothing here is authoritative.

use pm_console_backend::{Document, DomainError};

use crate::models::{decode_all, Record};

#[derive(Debug, Clone)]
pub struct LocalMirror<T> {
    records: Vec<T>,
    loaded: bool,
    /// Snapshots applied so far
    version: u64,
    error: Option<DomainError>,
}

impl<T> Default for LocalMirror<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            loaded: false,
            version: 0,
            error: None,
        }
    }
}

impl<T: Record> LocalMirror<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a pushed snapshot
    pub fn apply(&mut self, docs: &[Document]) {
        self.records = decode_all(docs);
        self.loaded = true;
        self.error = None;
        self.version += 1;
        log::debug!(
            "Applied {} snapshot v{} ({} records)",
            T::COLLECTION,
            self.version,
            self.records.len()
        );
    }

    /// A subscription error clears the mirror and ends the loading state
    pub fn fail(&mut self, error: DomainError) {
        log::error!("Subscription to {} failed: {}", T::COLLECTION, error);
        self.records.clear();
        self.loaded = true;
        self.error = Some(error);
        self.version += 1;
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Identifiers in snapshot order
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn error(&self) -> Option<&DomainError> {
        self.error.as_ref()
    }

    /// Records in the given id order; unknown ids are skipped
    pub fn in_order<'a>(&'a self, ids: &'a [String]) -> impl Iterator<Item = &'a T> + 'a {
        ids.iter().filter_map(move |id| self.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Project;
    use pm_console_backend::fields;
    use serde_json::json;

    fn doc(id: &str, name: &str) -> Document {
        Document::new(id, fields(json!({ "name": name })))
    }

    #[test]
    fn test_push_replaces_wholesale() {
        let mut mirror: LocalMirror<Project> = LocalMirror::new();
        assert!(!mirror.is_loaded());

        mirror.apply(&[doc("p1", "One"), doc("p2", "Two")]);
        mirror.apply(&[doc("p2", "Two v2")]);

        assert_eq!(mirror.ids(), vec!["p2"]);
        assert_eq!(mirror.get("p2").map(|p| p.name.as_str()), Some("Two v2"));
        assert!(!mirror.contains("p1"));
        assert_eq!(mirror.version(), 2);
    }

    #[test]
    fn test_failure_clears_and_stops_loading() {
        let mut mirror: LocalMirror<Project> = LocalMirror::new();
        mirror.apply(&[doc("p1", "One")]);
        mirror.fail(DomainError::Storage("offline".to_string()));

        assert!(mirror.is_empty());
        assert!(mirror.is_loaded());
        assert!(mirror.error().is_some());
    }

    #[test]
    fn test_in_order() {
        let mut mirror: LocalMirror<Project> = LocalMirror::new();
        mirror.apply(&[doc("a", "A"), doc("b", "B")]);
        let order = vec!["b".to_string(), "x".to_string(), "a".to_string()];
        let names: Vec<&str> = mirror.in_order(&order).map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}
