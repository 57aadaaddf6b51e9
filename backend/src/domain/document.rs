//! Documents
//!
//! A schema-less record: identifier, JSON fields and server timestamps.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{DomainError, DomainResult};

/// Field name -> value mapping of a document (also used for partial updates)
pub type Fields = serde_json::Map<String, Value>;

/// Slash-separated collection address.
///
/// `projects` is top level; `payouts/<id>/milestones` is a sub-collection
/// owned by one parent document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Parse and validate a path: an odd number of non-empty segments
    pub fn parse(path: &str) -> DomainResult<Self> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.trim().is_empty()) || segments.len() % 2 == 0 {
            return Err(DomainError::InvalidInput(format!(
                "Invalid collection path: {}",
                path
            )));
        }
        Ok(Self(path.to_string()))
    }

    /// Sub-collection `name` under document `parent_id` of this collection
    pub fn child(&self, parent_id: &str, name: &str) -> Self {
        Self(format!("{}/{}/{}", self.0, parent_id, name))
    }

    /// Parent collection and document id, for sub-collections
    pub fn parent(&self) -> Option<(CollectionPath, String)> {
        let mut parts = self.0.rsplitn(3, '/');
        let _name = parts.next()?;
        let parent_id = parts.next()?;
        let parent = parts.next()?;
        Some((CollectionPath(parent.to_string()), parent_id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Server-assigned identifier
    pub id: String,
    /// Field values
    pub fields: Fields,
    /// Server-assigned creation time
    pub created_at: DateTime<Utc>,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Merge a partial update: each top-level field in `patch` replaces the
    /// stored value, untouched fields are kept.
    pub fn merge(&mut self, patch: Fields) {
        for (key, value) in patch {
            self.fields.insert(key, value);
        }
        self.updated_at = Utc::now();
    }

    /// Fields plus `id` as one JSON object, the shape decoders expect
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(object)
    }
}

/// Build a `Fields` map from a `serde_json::json!` object literal.
///
/// Non-object values produce an empty map.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}
