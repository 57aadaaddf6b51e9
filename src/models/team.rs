use serde::{Deserialize, Serialize};

use super::{labelled_enum, lenient, NestedItem, Priority, Record};

labelled_enum!(
    MemberStatus, default = Active, {
        Active => "Active",
        Away => "Away",
        Inactive => "Inactive",
    }
);

labelled_enum!(
    TaskStatus, default = Pending, {
        Pending => "Pending",
        InProgress => "In Progress",
        Done => "Done",
    }
);

impl TaskStatus {
    /// Pending -> In Progress -> Done -> Pending; unknown labels restart
    pub fn next(&self) -> TaskStatus {
        match self {
            TaskStatus::Pending => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Done,
            TaskStatus::Done | TaskStatus::Other(_) => TaskStatus::Pending,
        }
    }
}

/// Task embedded in a team member's `tasks` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberTask {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    /// None when the task never had one
    #[serde(deserialize_with = "lenient::or_default", skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(deserialize_with = "lenient::string")]
    pub due_date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: TaskStatus,
}

impl NestedItem for MemberTask {
    fn item_id(&self) -> &str {
        &self.id
    }
}

/// `teamMembers` collection
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamMember {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub role: String,
    #[serde(deserialize_with = "lenient::string")]
    pub email: String,
    #[serde(deserialize_with = "lenient::string")]
    pub phone: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: MemberStatus,
    /// Assigned-work counter, bumped with each added task
    #[serde(deserialize_with = "lenient::integer")]
    pub projects: i64,
    #[serde(deserialize_with = "lenient::string")]
    pub avatar: String,
    #[serde(deserialize_with = "lenient::string")]
    pub join_date: String,
    #[serde(deserialize_with = "lenient::list")]
    pub tasks: Vec<MemberTask>,
}

impl Record for TeamMember {
    const COLLECTION: &'static str = "teamMembers";

    fn id(&self) -> &str {
        &self.id
    }
}

impl TeamMember {
    /// First unfinished task, else the last one
    pub fn latest_task(&self) -> Option<&MemberTask> {
        self.tasks
            .iter()
            .find(|t| t.status != TaskStatus::Done)
            .or_else(|| self.tasks.last())
    }
}

/// Two-letter initials: first letters of the first two words, else the
/// first two characters of the name
pub fn avatar_initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let initials: String = if words.len() >= 2 {
        words[..2].iter().filter_map(|w| w.chars().next()).collect()
    } else if name.trim().is_empty() {
        "??".to_string()
    } else {
        name.trim().chars().take(2).collect()
    };
    initials.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: TaskStatus) -> MemberTask {
        MemberTask {
            id: id.to_string(),
            status,
            ..MemberTask::default()
        }
    }

    #[test]
    fn test_status_cycle() {
        assert_eq!(TaskStatus::Pending.next(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::InProgress.next(), TaskStatus::Done);
        assert_eq!(TaskStatus::Done.next(), TaskStatus::Pending);
        assert_eq!(TaskStatus::from("Blocked").next(), TaskStatus::Pending);
    }

    #[test]
    fn test_latest_task() {
        let mut member = TeamMember::default();
        assert!(member.latest_task().is_none());

        member.tasks = vec![task("a", TaskStatus::Done), task("b", TaskStatus::Pending)];
        assert_eq!(member.latest_task().map(|t| t.id.as_str()), Some("b"));

        member.tasks = vec![task("a", TaskStatus::Done), task("c", TaskStatus::Done)];
        assert_eq!(member.latest_task().map(|t| t.id.as_str()), Some("c"));
    }

    #[test]
    fn test_avatar_initials() {
        assert_eq!(avatar_initials("ana maria lopez"), "AM");
        assert_eq!(avatar_initials("raj"), "RA");
        assert_eq!(avatar_initials("  "), "??");
    }
}
