//! Dashboard
//!
//! Read-only overview over `projects` and `teamMembers`: headline counts,
//! task tallies, upcoming deadlines, the most urgent task and the header
//! search results.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use pm_console_backend::{Query, SnapshotEvent};

use super::lock;
use crate::commands::Backend;
use crate::context::LayoutContext;
use crate::models::{
    MemberStatus, MemberTask, Priority, Project, ProjectStatus, Record, TaskStatus, TeamMember,
};
use crate::store::LocalMirror;
use crate::subscription::{watch_collection, SubscriptionHandle};

/// Deadlines further away than this are not "upcoming"
const UPCOMING_DAYS: i64 = 7;
const UPCOMING_LIMIT: usize = 5;
const SEARCH_LIMIT: usize = 5;
const DAY_MS: i64 = 86_400_000;

/// A member's task with its owner and days left
#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingTask {
    pub member_id: String,
    pub member_name: String,
    pub task: MemberTask,
    /// None when the task has no readable due date
    pub days_left: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSummary {
    pub total_projects: usize,
    pub active_projects: usize,
    pub active_members: usize,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    pub done_tasks: usize,
    /// Not-done tasks due within a week (overdue included), soonest first
    pub upcoming: Vec<UpcomingTask>,
    pub most_urgent: Option<UpcomingTask>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub projects: Vec<Project>,
    pub tasks: Vec<UpcomingTask>,
}

/// Whole days from `now` until `date`, rounded up.
///
/// Accepts `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn days_until(date: &str, now: DateTime<Utc>) -> Option<i64> {
    let date = date.trim();
    let due = match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(day) => day.and_hms_opt(0, 0, 0)?.and_utc(),
        Err(_) => DateTime::parse_from_rfc3339(date).ok()?.with_timezone(&Utc),
    };
    let diff = (due - now).num_milliseconds();
    Some(-(-diff).div_euclid(DAY_MS))
}

/// Extra urgency for tasks that are due soon or overdue
fn due_score(days_left: Option<i64>) -> i64 {
    match days_left {
        Some(d) if d <= 0 => 5,
        Some(d) if d <= 3 => 3,
        Some(d) if d <= UPCOMING_DAYS => 1,
        _ => 0,
    }
}

/// A task without a priority ranks like a low one
fn priority_score(priority: Option<&Priority>) -> i64 {
    priority.map_or(1, Priority::score)
}

#[derive(Default)]
struct DashboardState {
    projects: LocalMirror<Project>,
    members: LocalMirror<TeamMember>,
}

impl DashboardState {
    fn tasks(&self, now: DateTime<Utc>) -> impl Iterator<Item = UpcomingTask> + '_ {
        self.members.records().iter().flat_map(move |member| {
            member.tasks.iter().map(move |task| UpcomingTask {
                member_id: member.id.clone(),
                member_name: member.name.clone(),
                task: task.clone(),
                days_left: days_until(&task.due_date, now),
            })
        })
    }

    fn summary(&self, now: DateTime<Utc>) -> DashboardSummary {
        let projects = self.projects.records();
        let mut summary = DashboardSummary {
            total_projects: projects.len(),
            active_projects: projects
                .iter()
                .filter(|p| p.status == ProjectStatus::InProgress)
                .count(),
            active_members: self
                .members
                .records()
                .iter()
                .filter(|m| m.status == MemberStatus::Active)
                .count(),
            ..DashboardSummary::default()
        };

        let mut best_score = i64::MIN;
        for entry in self.tasks(now) {
            match entry.task.status {
                TaskStatus::Pending => summary.pending_tasks += 1,
                TaskStatus::InProgress => summary.in_progress_tasks += 1,
                TaskStatus::Done => {
                    summary.done_tasks += 1;
                    continue;
                }
                TaskStatus::Other(_) => {}
            }

            let score = priority_score(entry.task.priority.as_ref()) + due_score(entry.days_left);
            if score > best_score {
                best_score = score;
                summary.most_urgent = Some(entry.clone());
            }
            if entry.days_left.is_some_and(|d| d <= UPCOMING_DAYS) {
                summary.upcoming.push(entry);
            }
        }
        summary.upcoming.sort_by_key(|t| t.days_left);
        summary.upcoming.truncate(UPCOMING_LIMIT);
        summary
    }

    fn search(&self, query: &str, now: DateTime<Utc>) -> SearchResults {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            let mut projects = self.projects.records().to_vec();
            projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            projects.truncate(SEARCH_LIMIT);
            let tasks = self
                .tasks(now)
                .filter(|t| t.task.status != TaskStatus::Done)
                .take(SEARCH_LIMIT)
                .collect();
            return SearchResults { projects, tasks };
        }

        let hit = |text: &str| text.to_lowercase().contains(&needle);
        let projects = self
            .projects
            .records()
            .iter()
            .filter(|p| {
                hit(&p.name) || hit(p.status.as_str()) || hit(p.priority.as_str()) || hit(&p.description)
            })
            .cloned()
            .collect();
        let tasks = self
            .tasks(now)
            .filter(|t| {
                hit(&t.task.title)
                    || hit(&t.task.description)
                    || t.task.priority.as_ref().is_some_and(|p| hit(p.as_str()))
                    || hit(&t.member_name)
            })
            .collect();
        SearchResults { projects, tasks }
    }
}

pub struct Dashboard {
    layout: LayoutContext,
    state: Arc<Mutex<DashboardState>>,
    projects: SubscriptionHandle,
    members: SubscriptionHandle,
}

impl Dashboard {
    pub async fn mount(backend: Backend, layout: LayoutContext) -> Self {
        let state = Arc::new(Mutex::new(DashboardState::default()));

        let weak = Arc::downgrade(&state);
        let projects = watch_collection(
            backend.records.clone(),
            Query::collection(Project::COLLECTION),
            move |event| {
                if let Some(state) = weak.upgrade() {
                    let mut state = lock(&state);
                    match event {
                        SnapshotEvent::Snapshot(docs) => state.projects.apply(&docs),
                        SnapshotEvent::Error(e) => state.projects.fail(e),
                    }
                }
            },
        );

        let weak = Arc::downgrade(&state);
        let members = watch_collection(
            backend.records.clone(),
            Query::collection(TeamMember::COLLECTION),
            move |event| {
                if let Some(state) = weak.upgrade() {
                    let mut state = lock(&state);
                    match event {
                        SnapshotEvent::Snapshot(docs) => state.members.apply(&docs),
                        SnapshotEvent::Error(e) => state.members.fail(e),
                    }
                }
            },
        );

        projects.wait_for(1).await;
        members.wait_for(1).await;
        log::info!("Dashboard mounted");
        Self {
            layout,
            state,
            projects,
            members,
        }
    }

    pub async fn wait_for_projects(&self, generation: u64) -> bool {
        self.projects.wait_for(generation).await
    }

    pub async fn wait_for_members(&self, generation: u64) -> bool {
        self.members.wait_for(generation).await
    }

    pub fn is_loaded(&self) -> bool {
        let state = lock(&self.state);
        state.projects.is_loaded() && state.members.is_loaded()
    }

    pub fn summary(&self, now: DateTime<Utc>) -> DashboardSummary {
        lock(&self.state).summary(now)
    }

    /// Results for the layout's header search
    pub fn search(&self, now: DateTime<Utc>) -> SearchResults {
        let query = self.layout.search_query();
        lock(&self.state).search(&query, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{members_path, projects_path};
    use pm_console_backend::{fields, MemoryRecordStore, RecordStore};
    use serde_json::json;

    fn at(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_days_until_rounds_up() {
        let now = at("2024-05-01T12:00:00Z");
        assert_eq!(days_until("2024-05-02", now), Some(1));
        assert_eq!(days_until("2024-05-01", now), Some(0));
        assert_eq!(days_until("2024-04-29", now), Some(-2));
        assert_eq!(days_until("2024-05-03T12:00:00Z", now), Some(2));
        assert_eq!(days_until("soon", now), None);
        assert_eq!(days_until("", now), None);
    }

    #[test]
    fn test_missing_priority_scores_like_low() {
        let task: MemberTask = serde_json::from_value(json!({"id": "t", "title": "No priority"})).unwrap();
        assert_eq!(task.priority, None);
        assert_eq!(priority_score(task.priority.as_ref()), 1);
        assert_eq!(priority_score(Some(&Priority::Medium)), 2);
        assert!(serde_json::to_value(&task).unwrap().get("priority").is_none());
    }

    #[tokio::test]
    async fn test_task_without_priority_is_not_most_urgent() {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .create(
                &members_path(),
                fields(json!({"name": "Ana", "tasks": [
                    {"id": "bare", "title": "Bare", "status": "Pending", "dueDate": "2024-05-10"},
                    {"id": "low", "title": "Low", "status": "Pending", "priority": "Low", "dueDate": "2024-05-06"},
                ]})),
            )
            .await
            .unwrap();
        let backend = Backend::new(store, Arc::new(pm_console_backend::MemoryBlobStore::new()));
        let dashboard = Dashboard::mount(backend, LayoutContext::new()).await;

        let summary = dashboard.summary(at("2024-05-01T08:00:00Z"));
        assert_eq!(summary.most_urgent.unwrap().task.id, "low");
    }

    #[test]
    fn test_due_score() {
        assert_eq!(due_score(Some(-3)), 5);
        assert_eq!(due_score(Some(2)), 3);
        assert_eq!(due_score(Some(6)), 1);
        assert_eq!(due_score(Some(30)), 0);
        assert_eq!(due_score(None), 0);
    }

    fn task(id: &str, status: &str, priority: &str, due: &str) -> serde_json::Value {
        json!({"id": id, "title": format!("Task {}", id), "status": status, "priority": priority, "dueDate": due})
    }

    async fn seeded() -> Dashboard {
        let store = Arc::new(MemoryRecordStore::new());
        let projects = projects_path();
        store
            .create(&projects, fields(json!({"name": "Site", "status": "In Progress", "createdAt": "2024-01-01T00:00:00.000Z"})))
            .await
            .unwrap();
        store
            .create(&projects, fields(json!({"name": "App", "status": "Completed", "priority": "High", "createdAt": "2024-02-01T00:00:00.000Z"})))
            .await
            .unwrap();
        store
            .create(
                &members_path(),
                fields(json!({"name": "Ana", "status": "Active", "tasks": [
                    task("a", "Pending", "Low", "2024-05-03"),
                    task("b", "Done", "Critical", "2024-05-01"),
                    task("c", "In Progress", "High", "2024-04-30"),
                ]})),
            )
            .await
            .unwrap();
        store
            .create(
                &members_path(),
                fields(json!({"name": "Raj", "status": "Away", "tasks": [
                    task("d", "Pending", "Medium", "2024-06-30"),
                    task("e", "Pending", "Low", "whenever"),
                ]})),
            )
            .await
            .unwrap();
        let backend = Backend::new(store, Arc::new(pm_console_backend::MemoryBlobStore::new()));
        Dashboard::mount(backend, LayoutContext::new()).await
    }

    #[tokio::test]
    async fn test_summary() {
        let dashboard = seeded().await;
        let summary = dashboard.summary(at("2024-05-01T08:00:00Z"));

        assert_eq!(summary.total_projects, 2);
        assert_eq!(summary.active_projects, 1);
        assert_eq!(summary.active_members, 1);
        assert_eq!(
            (summary.pending_tasks, summary.in_progress_tasks, summary.done_tasks),
            (3, 1, 1)
        );

        let upcoming: Vec<&str> = summary.upcoming.iter().map(|t| t.task.id.as_str()).collect();
        assert_eq!(upcoming, vec!["c", "a"]);
        assert_eq!(summary.upcoming[0].days_left, Some(-1));

        let urgent = summary.most_urgent.unwrap();
        assert_eq!(urgent.task.id, "c");
        assert_eq!(urgent.member_name, "Ana");
    }

    #[tokio::test]
    async fn test_search_uses_layout_query() {
        let dashboard = seeded().await;
        let now = at("2024-05-01T08:00:00Z");

        let idle = dashboard.search(now);
        let names: Vec<&str> = idle.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["App", "Site"]);
        assert_eq!(idle.tasks.len(), 4);

        dashboard.layout.set_search_query("raj");
        let hits = dashboard.search(now);
        assert!(hits.projects.is_empty());
        assert_eq!(hits.tasks.len(), 2);

        dashboard.layout.set_search_query("high");
        let hits = dashboard.search(now);
        assert_eq!(hits.projects.len(), 1);
        assert_eq!(hits.tasks[0].task.id, "c");
    }
}
