//! Project Commands

use pm_console_backend::{CollectionPath, Document, DomainResult, Fields};
use serde::Serialize;

use super::{required, to_fields, Backend};
use crate::edit::{parse_int_prefix, split_list};
use crate::models::{Priority, Project, ProjectStatus, Record, TaskCounts};

/// Add-project form as typed by the user
#[derive(Debug, Clone, Default)]
pub struct ProjectForm {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: Priority,
    pub start_date: String,
    pub deadline: String,
    /// Comma separated member names
    pub team: String,
    /// Planned number of tasks
    pub total_tasks: String,
}

// ========================
// Argument Structs
// ========================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProjectArgs<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub status: &'a str,
    pub priority: &'a str,
    pub progress: i64,
    pub deadline: &'a str,
    pub start_date: &'a str,
    pub team: Vec<String>,
    pub tasks: TaskCounts,
    pub created_at: String,
}

impl<'a> NewProjectArgs<'a> {
    /// Validate the form; the name is required
    pub fn from_form(form: &'a ProjectForm) -> DomainResult<Self> {
        Ok(Self {
            name: required(&form.name, "Project name")?,
            description: form.description.trim(),
            status: form.status.as_str(),
            priority: form.priority.as_str(),
            progress: 0,
            deadline: &form.deadline,
            start_date: &form.start_date,
            team: split_list(&form.team),
            tasks: TaskCounts {
                total: parse_int_prefix(&form.total_tasks).unwrap_or(0),
                completed: 0,
            },
            created_at: now_iso(),
        })
    }
}

// ========================
// Commands
// ========================

pub fn projects_path() -> CollectionPath {
    CollectionPath::new(Project::COLLECTION)
}

pub async fn create_project(backend: &Backend, args: &NewProjectArgs<'_>) -> DomainResult<Document> {
    let doc = backend.records.create(&projects_path(), to_fields(args)?).await?;
    log::info!("Created project {} ({})", doc.id, args.name);
    Ok(doc)
}

pub async fn update_project(backend: &Backend, id: &str, patch: Fields) -> DomainResult<()> {
    backend.records.update(&projects_path(), id, patch).await
}

pub async fn delete_project(backend: &Backend, id: &str) -> DomainResult<()> {
    backend.records.delete(&projects_path(), id).await?;
    log::info!("Deleted project {}", id);
    Ok(())
}

/// ISO-8601 timestamp with milliseconds, e.g. `2024-05-01T09:30:00.000Z`
pub fn now_iso() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_console_backend::DomainError;
    use serde_json::json;

    #[test]
    fn test_new_project_fields() {
        let form = ProjectForm {
            name: "  Apollo ".to_string(),
            team: "Ana, Raj,".to_string(),
            total_tasks: "12 tasks".to_string(),
            deadline: "2024-09-01".to_string(),
            ..ProjectForm::default()
        };
        let fields = to_fields(&NewProjectArgs::from_form(&form).unwrap()).unwrap();
        assert_eq!(fields["name"], json!("Apollo"));
        assert_eq!(fields["status"], json!("In Progress"));
        assert_eq!(fields["priority"], json!("Medium"));
        assert_eq!(fields["progress"], json!(0));
        assert_eq!(fields["team"], json!(["Ana", "Raj"]));
        assert_eq!(fields["tasks"], json!({"total": 12, "completed": 0}));
        assert_eq!(fields["startDate"], json!(""));
        assert!(fields["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_name_required() {
        let form = ProjectForm::default();
        assert!(matches!(
            NewProjectArgs::from_form(&form),
            Err(DomainError::InvalidInput(_))
        ));
    }
}
