use serde::{Deserialize, Serialize};

use super::{labelled_enum, lenient, Priority, Record};

labelled_enum!(
    ProjectStatus, default = InProgress, {
        InProgress => "In Progress",
        Completed => "Completed",
        OnHold => "On Hold",
    }
);

/// Task tally shown on the project row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskCounts {
    #[serde(deserialize_with = "lenient::integer")]
    pub total: i64,
    #[serde(deserialize_with = "lenient::integer")]
    pub completed: i64,
}

/// `projects` collection
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: ProjectStatus,
    #[serde(deserialize_with = "lenient::or_default")]
    pub priority: Priority,
    #[serde(deserialize_with = "lenient::integer")]
    pub progress: i64,
    #[serde(deserialize_with = "lenient::string")]
    pub start_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub deadline: String,
    #[serde(deserialize_with = "lenient::string_list")]
    pub team: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub tasks: TaskCounts,
    /// ISO timestamp written by the client on create
    #[serde(deserialize_with = "lenient::string")]
    pub created_at: String,
    #[serde(deserialize_with = "lenient::string")]
    pub updated_at: String,
}

impl Record for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Project {
    /// Start date, falling back to the creation day
    pub fn start_date_or_created(&self) -> String {
        if !self.start_date.is_empty() {
            return self.start_date.clone();
        }
        self.created_at.chars().take(10).collect()
    }

    /// Case-insensitive match on name or description
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        needle.is_empty()
            || self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}
