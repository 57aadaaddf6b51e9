//! Store Command Wrappers
//!
//! Typed writes against the record store and blob storage, organized by
//! collection. Pages build argument structs; these turn them into fields.

mod clients;
mod payouts;
mod projects;
mod team;

use std::sync::Arc;
use std::time::Duration;

use pm_console_backend::{
    BlobStore, DomainError, DomainResult, Fields, MemoryBlobStore, MemoryRecordStore, RecordStore,
};
use serde::Serialize;
use serde_json::Value;

pub use clients::*;
pub use payouts::*;
pub use projects::*;
pub use team::*;

/// Default delay before a finished delete's Done state is dismissed
pub const DEFAULT_DONE_DISMISS: Duration = Duration::from_millis(800);

/// The collaborators every page talks to
#[derive(Clone)]
pub struct Backend {
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub dismiss_after: Duration,
}

impl Backend {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            records,
            blobs,
            dismiss_after: DEFAULT_DONE_DISMISS,
        }
    }

    pub fn with_dismiss_after(mut self, delay: Duration) -> Self {
        self.dismiss_after = delay;
        self
    }

    /// Both stores in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRecordStore::new()), Arc::new(MemoryBlobStore::new()))
    }
}

/// Serialize an argument struct into a field map
pub fn to_fields<T: Serialize>(args: &T) -> DomainResult<Fields> {
    match serde_json::to_value(args)? {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::InvalidInput(format!(
            "Expected an object, got {}",
            other
        ))),
    }
}

/// Field map from name/value pairs
pub fn patch<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Fields {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// A required form field, trimmed
pub(crate) fn required<'a>(value: &'a str, what: &str) -> DomainResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::InvalidInput(format!("{} is required", what)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Args {
        due_date: &'static str,
    }

    #[test]
    fn test_to_fields() {
        let fields = to_fields(&Args { due_date: "2024-01-01" }).unwrap();
        assert_eq!(fields.get("dueDate"), Some(&json!("2024-01-01")));
        assert!(to_fields(&3).is_err());
    }

    #[test]
    fn test_required() {
        assert_eq!(required("  Apollo ", "Name").unwrap(), "Apollo");
        assert!(matches!(required("   ", "Name"), Err(DomainError::InvalidInput(_))));
    }
}
