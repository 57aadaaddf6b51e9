//! Typed Records
//!
//! One struct per collection, decoded from store documents at the mirror
//! boundary. Field names follow the stored camelCase convention.

pub mod lenient;

mod client;
mod payout;
mod project;
mod team;

use pm_console_backend::{Document, DomainResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use client::{
    file_extension, format_file_size, Client, ClientFiles, ClientStatus, FileEntry, FileTab,
    Folder, DOC_TYPES, MEDIA_TYPES,
};
pub use payout::{paid_total, Milestone, MilestoneStatus, PayoutClient, PayoutStatus};
pub(crate) use payout::format_amount;
pub use project::{Project, ProjectStatus, TaskCounts};
pub use team::{avatar_initials, MemberStatus, MemberTask, TaskStatus, TeamMember};

/// A record type living in one top-level collection
pub trait Record: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name in the store
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Decode with defaults for every missing or malformed field
    fn from_document(doc: &Document) -> DomainResult<Self> {
        Ok(serde_json::from_value(doc.to_value())?)
    }
}

/// Embedded list element with its own identifier
pub trait NestedItem: Clone + Serialize {
    fn item_id(&self) -> &str;
}

/// Declares a string-backed enum whose unknown values survive a round trip.
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident, { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $label,)+
                    Self::Other(label) => label.as_str(),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl From<String> for $name {
            fn from(label: String) -> Self {
                let known = match label.as_str() {
                    $($label => Some(Self::$variant),)+
                    _ => None,
                };
                known.unwrap_or(Self::Other(label))
            }
        }

        impl From<&str> for $name {
            fn from(label: &str) -> Self {
                Self::from(label.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use labelled_enum;

labelled_enum!(
    /// Task/project urgency
    Priority, default = Medium, {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Critical => "Critical",
    }
);

impl Priority {
    /// Weight used when ranking urgent tasks
    pub fn score(&self) -> i64 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low | Priority::Other(_) => 1,
        }
    }
}

/// Decode a snapshot, skipping documents that cannot be read
pub fn decode_all<T: Record>(docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match T::from_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping {} record {}: {}", T::COLLECTION, doc.id, e);
                None
            }
        })
        .collect()
}

/// Today as `YYYY-MM-DD`
pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Current month as `Mon YYYY`
pub fn month_year() -> String {
    chrono::Local::now().format("%b %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_console_backend::fields;
    use serde_json::json;

    #[test]
    fn test_unknown_labels_round_trip() {
        let p: Priority = serde_json::from_value(json!("Urgent!")).unwrap();
        assert_eq!(p, Priority::Other("Urgent!".to_string()));
        assert_eq!(serde_json::to_value(&p).unwrap(), json!("Urgent!"));
        assert_eq!(Priority::from("High").score(), 3);
    }

    #[test]
    fn test_decode_all_uses_defaults() {
        let docs = vec![
            Document::new("p1", fields(json!({"name": "Site", "progress": "45"}))),
            Document::new("p2", fields(json!({}))),
        ];
        let projects: Vec<Project> = decode_all(&docs);
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].progress, 45);
        assert_eq!(projects[1].id, "p2");
        assert_eq!(projects[1].status, ProjectStatus::InProgress);
        assert_eq!(projects[1].priority, Priority::Medium);
    }

    #[test]
    fn test_month_year_shape() {
        let label = month_year();
        assert_eq!(label.len(), 8);
        assert!(label.chars().nth(3) == Some(' '));
    }
}
