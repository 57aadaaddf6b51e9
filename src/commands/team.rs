//! Team Member Commands

use pm_console_backend::{CollectionPath, Document, DomainResult, Fields};
use serde::Serialize;
use serde_json::Value;

use super::{patch, required, to_fields, Backend};
use crate::models::{
    avatar_initials, month_year, MemberStatus, MemberTask, Priority, Record, TeamMember,
};
use crate::nested;

/// Roles offered by the add-member form and the role filter
pub const ROLES: &[&str] = &[
    "Frontend Developer",
    "Backend Developer",
    "Flutter Developer",
    "UI/UX Designer",
    "Project Manager",
    "QA Engineer",
    "Marketing Manager",
    "Content Writer",
    "DevOps Engineer",
];

#[derive(Debug, Clone, Default)]
pub struct MemberForm {
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: String,
    pub status: MemberStatus,
}

#[derive(Debug, Clone, Default)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: String,
}

// ========================
// Argument Structs
// ========================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMemberArgs<'a> {
    pub name: &'a str,
    pub role: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub projects: i64,
    pub status: &'a str,
    pub avatar: String,
    pub join_date: String,
    pub tasks: Vec<MemberTask>,
}

impl<'a> NewMemberArgs<'a> {
    pub fn from_form(form: &'a MemberForm) -> DomainResult<Self> {
        let name = required(&form.name, "Member name")?;
        Ok(Self {
            name,
            role: &form.role,
            email: form.email.trim(),
            phone: form.phone.trim(),
            projects: 0,
            status: form.status.as_str(),
            avatar: avatar_initials(name),
            join_date: month_year(),
            tasks: Vec::new(),
        })
    }
}

impl MemberTask {
    /// New pending task; the title is required
    pub fn from_form(form: &TaskForm) -> DomainResult<Self> {
        Ok(Self {
            id: nested::new_item_id("task"),
            title: required(&form.title, "Task title")?.to_string(),
            description: form.description.trim().to_string(),
            priority: Some(form.priority.clone()),
            due_date: form.due_date.clone(),
            ..MemberTask::default()
        })
    }
}

// ========================
// Commands
// ========================

pub fn members_path() -> CollectionPath {
    CollectionPath::new(TeamMember::COLLECTION)
}

pub async fn create_member(backend: &Backend, args: &NewMemberArgs<'_>) -> DomainResult<Document> {
    let doc = backend.records.create(&members_path(), to_fields(args)?).await?;
    log::info!("Added team member {} ({})", doc.id, args.name);
    Ok(doc)
}

pub async fn update_member(backend: &Backend, id: &str, patch: Fields) -> DomainResult<()> {
    backend.records.update(&members_path(), id, patch).await
}

pub async fn delete_member(backend: &Backend, id: &str) -> DomainResult<()> {
    backend.records.delete(&members_path(), id).await?;
    log::info!("Removed team member {}", id);
    Ok(())
}

/// Write the task list and the projects counter together
pub async fn write_tasks(backend: &Backend, member_id: &str, tasks: &[MemberTask], projects: i64) -> DomainResult<()> {
    let fields = patch([
        ("tasks", nested::to_value(&tasks)?),
        ("projects", Value::from(projects)),
    ]);
    update_member(backend, member_id, fields).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use serde_json::json;

    #[test]
    fn test_new_member_fields() {
        let form = MemberForm {
            name: "ana lopez".to_string(),
            role: ROLES[1].to_string(),
            ..MemberForm::default()
        };
        let fields = to_fields(&NewMemberArgs::from_form(&form).unwrap()).unwrap();
        assert_eq!(fields["avatar"], json!("AL"));
        assert_eq!(fields["projects"], json!(0));
        assert_eq!(fields["tasks"], json!([]));
        assert_eq!(fields["role"], json!("Backend Developer"));
        assert_eq!(fields["status"], json!("Active"));
        assert!(fields.contains_key("joinDate"));
    }

    #[test]
    fn test_task_from_form() {
        let form = TaskForm {
            title: " Wireframes ".to_string(),
            priority: Priority::High,
            ..TaskForm::default()
        };
        let task = MemberTask::from_form(&form).unwrap();
        assert_eq!(task.title, "Wireframes");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.id.starts_with("task-"));
    }
}
