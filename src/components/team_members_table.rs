//! Team Members Table
//!
//! Members newest first with search, role and status filters, a member
//! drawer, and the member's embedded task list.

use std::sync::{Arc, Mutex};

use pm_console_backend::{DomainResult, Query, SnapshotEvent};
use serde_json::Value;

use super::{lock, progress, report, settle, PageState, TableState};
use crate::commands::{
    create_member, delete_member, patch, update_member, write_tasks, Backend, MemberForm,
    NewMemberArgs, TaskForm,
};
use crate::confirm::{ConfirmFlow, ConfirmState};
use crate::context::{AddTarget, LayoutContext};
use crate::edit::{CellEditSession, EditableField, FieldKind, PendingCommit};
use crate::models::{avatar_initials, MemberStatus, MemberTask, Record, TaskStatus, TeamMember};
use crate::nested;
use crate::notice::Notices;
use crate::order::{DisplayOrder, OrderMode};
use crate::store::LocalMirror;
use crate::subscription::{watch_collection, SubscriptionHandle};

/// Inline-editable member columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberField {
    Name,
    Role,
    Email,
    Phone,
    Status,
    Projects,
}

impl EditableField for MemberField {
    fn name(&self) -> &'static str {
        match self {
            MemberField::Name => "name",
            MemberField::Role => "role",
            MemberField::Email => "email",
            MemberField::Phone => "phone",
            MemberField::Status => "status",
            MemberField::Projects => "projects",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            MemberField::Name | MemberField::Email | MemberField::Phone => FieldKind::Trimmed,
            MemberField::Role | MemberField::Status => FieldKind::Text,
            MemberField::Projects => FieldKind::Integer,
        }
    }
}

impl MemberField {
    pub fn current(&self, member: &TeamMember) -> String {
        match self {
            MemberField::Name => member.name.clone(),
            MemberField::Role => member.role.clone(),
            MemberField::Email => member.email.clone(),
            MemberField::Phone => member.phone.clone(),
            MemberField::Status => member.status.to_string(),
            MemberField::Projects => member.projects.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberAction {
    Delete { id: String },
}

#[derive(Debug, Clone, Default)]
struct MemberFilters {
    search: String,
    role: Option<String>,
    status: Option<MemberStatus>,
}

impl MemberFilters {
    fn matches(&self, member: &TeamMember) -> bool {
        let needle = self.search.trim().to_lowercase();
        let text = needle.is_empty()
            || [&member.name, &member.email, &member.role]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
        let role = self.role.as_ref().map(|r| &member.role == r).unwrap_or(true);
        let status = self.status.as_ref().map(|s| &member.status == s).unwrap_or(true);
        text && role && status
    }
}

struct MembersState {
    mirror: LocalMirror<TeamMember>,
    order: DisplayOrder,
    edit: CellEditSession<MemberField>,
    confirm: ConfirmFlow<MemberAction>,
    notices: Notices,
    filters: MemberFilters,
    /// Member shown in the drawer
    selected: Option<String>,
    add_open: bool,
}

impl PageState for MembersState {
    fn notices(&mut self) -> &mut Notices {
        &mut self.notices
    }
}

impl TableState for MembersState {
    type Row = TeamMember;
    type Field = MemberField;

    fn mirror(&self) -> &LocalMirror<TeamMember> {
        &self.mirror
    }

    fn order(&mut self) -> &mut DisplayOrder {
        &mut self.order
    }

    fn edit(&mut self) -> &mut CellEditSession<MemberField> {
        &mut self.edit
    }

    fn add_open(&mut self) -> &mut bool {
        &mut self.add_open
    }

    fn current(row: &TeamMember, field: MemberField) -> String {
        field.current(row)
    }
}

fn confirm_flow(state: &mut MembersState) -> &mut ConfirmFlow<MemberAction> {
    &mut state.confirm
}

impl MembersState {
    fn new() -> Self {
        Self {
            mirror: LocalMirror::new(),
            order: DisplayOrder::new(OrderMode::Local),
            edit: CellEditSession::new(),
            confirm: ConfirmFlow::new(),
            notices: Notices::default(),
            filters: MemberFilters::default(),
            selected: None,
            add_open: false,
        }
    }

    fn on_event(&mut self, event: SnapshotEvent) {
        match event {
            SnapshotEvent::Snapshot(docs) => self.mirror.apply(&docs),
            SnapshotEvent::Error(e) => self.mirror.fail(e),
        }
        self.order.sync(&self.mirror.ids());

        let mirror = &self.mirror;
        self.edit.cancel_if_missing(|id| mirror.contains(id));
        self.confirm
            .cancel_if(|MemberAction::Delete { id }| !mirror.contains(id));
        if self.selected.as_ref().is_some_and(|id| !mirror.contains(id)) {
            log::debug!("Member in drawer disappeared, closing it");
            self.selected = None;
        }
    }

    fn visible_ids(&self) -> Vec<String> {
        self.mirror
            .in_order(self.order.ids())
            .filter(|m| self.filters.matches(m))
            .map(|m| m.id.clone())
            .collect()
    }
}

pub struct TeamMembersTable {
    backend: Backend,
    layout: LayoutContext,
    state: Arc<Mutex<MembersState>>,
    subscription: SubscriptionHandle,
}

impl TeamMembersTable {
    pub async fn mount(backend: Backend, layout: LayoutContext) -> Self {
        let state = Arc::new(Mutex::new(MembersState::new()));
        let weak = Arc::downgrade(&state);
        let subscription = watch_collection(
            backend.records.clone(),
            Query::collection(TeamMember::COLLECTION).newest_first(),
            move |event| {
                if let Some(state) = weak.upgrade() {
                    lock(&state).on_event(event);
                }
            },
        );
        subscription.wait_for(1).await;
        log::info!("Team members table mounted");
        Self {
            backend,
            layout,
            state,
            subscription,
        }
    }

    table_controls!(core);

    // ========================
    // Rows and filters
    // ========================

    pub fn rows(&self) -> Vec<TeamMember> {
        let state = lock(&self.state);
        state
            .visible_ids()
            .iter()
            .filter_map(|id| state.mirror.get(id).cloned())
            .collect()
    }

    pub fn member(&self, id: &str) -> Option<TeamMember> {
        lock(&self.state).mirror.get(id).cloned()
    }

    pub fn set_search(&self, query: impl Into<String>) {
        lock(&self.state).filters.search = query.into();
    }

    pub fn set_role_filter(&self, role: Option<String>) {
        lock(&self.state).filters.role = role;
    }

    pub fn set_status_filter(&self, status: Option<MemberStatus>) {
        lock(&self.state).filters.status = status;
    }

    // ========================
    // Drag and drop
    // ========================

    table_controls!(drag);

    /// Drop on a visible row; the new order stays on this page only
    pub fn drop_on(&self, index: usize) -> bool {
        let mut state = lock(&self.state);
        let Some(mv) = state.order.drop_on(index) else {
            return false;
        };
        let view = state.visible_ids();
        state.order.apply_view_move(&view, mv)
    }

    // ========================
    // Drawer
    // ========================

    pub fn open_member(&self, id: &str) -> bool {
        let mut state = lock(&self.state);
        if !state.mirror.contains(id) {
            return false;
        }
        state.selected = Some(id.to_string());
        true
    }

    pub fn selected_member(&self) -> Option<TeamMember> {
        let state = lock(&self.state);
        state.selected.as_ref().and_then(|id| state.mirror.get(id).cloned())
    }

    pub fn close_member(&self) {
        lock(&self.state).selected = None;
    }

    /// Task shown on the member's row
    pub fn latest_task(&self, member_id: &str) -> Option<MemberTask> {
        lock(&self.state)
            .mirror
            .get(member_id)
            .and_then(|m| m.latest_task().cloned())
    }

    // ========================
    // Inline editing
    // ========================

    table_controls!(edit MemberField);

    /// A renamed member gets fresh initials in the same write
    async fn write_commit(&self, commit: PendingCommit<MemberField>) -> bool {
        if !commit.should_write() {
            return false;
        }
        let value = commit.coerced();
        let mut fields = patch([(commit.field.name(), value.clone())]);
        if commit.field == MemberField::Name {
            let name = value.as_str().unwrap_or_default();
            fields.insert("avatar".to_string(), Value::String(avatar_initials(name)));
        }
        let result = update_member(&self.backend, &commit.record_id, fields).await;
        report(&self.state, result, &format!("update {}", commit.field.name()))
    }

    // ========================
    // Add member
    // ========================

    table_controls!(add AddTarget::Member);

    pub async fn add_member(&self, form: &MemberForm) -> DomainResult<bool> {
        let args = NewMemberArgs::from_form(form)?;
        let created = create_member(&self.backend, &args).await.map(|_| ());
        let ok = report(&self.state, created, "add member");
        if ok {
            lock(&self.state).add_open = false;
        }
        Ok(ok)
    }

    // ========================
    // Tasks
    // ========================

    /// Append a task and bump the member's projects counter
    pub async fn add_task(&self, member_id: &str, form: &TaskForm) -> DomainResult<bool> {
        let task = MemberTask::from_form(form)?;
        Ok(self
            .mutate_tasks(member_id, "add task", move |member| {
                Some((nested::append(&member.tasks, task), member.projects + 1))
            })
            .await)
    }

    /// Pending -> In Progress -> Done -> Pending
    pub async fn cycle_task(&self, member_id: &str, task_id: &str) -> bool {
        self.mutate_tasks(member_id, "update task", |member| {
            let tasks = nested::update_item(&member.tasks, task_id, |t| t.status = t.status.next())?;
            Some((tasks, member.projects))
        })
        .await
    }

    pub async fn set_task_status(&self, member_id: &str, task_id: &str, status: TaskStatus) -> bool {
        self.mutate_tasks(member_id, "update task", |member| {
            let tasks = nested::update_item(&member.tasks, task_id, |t| t.status = status)?;
            Some((tasks, member.projects))
        })
        .await
    }

    /// Remove a task; the projects counter never drops below zero
    pub async fn delete_task(&self, member_id: &str, task_id: &str) -> bool {
        self.mutate_tasks(member_id, "delete task", |member| {
            let ids = [task_id.to_string()].into_iter().collect();
            let (kept, removed) = nested::remove_items(&member.tasks, &ids);
            if removed.is_empty() {
                return None;
            }
            Some((kept, (member.projects - 1).max(0)))
        })
        .await
    }

    async fn mutate_tasks(
        &self,
        member_id: &str,
        action: &str,
        change: impl FnOnce(&TeamMember) -> Option<(Vec<MemberTask>, i64)>,
    ) -> bool {
        let next = {
            let mut state = lock(&self.state);
            let Some(member) = state.mirror.get(member_id) else {
                state
                    .notices
                    .transient(format!("Failed to {}: member no longer exists", action));
                return false;
            };
            change(member)
        };
        let Some((tasks, projects)) = next else {
            return false;
        };
        let result = write_tasks(&self.backend, member_id, &tasks, projects).await;
        report(&self.state, result, action)
    }

    // ========================
    // Delete member
    // ========================

    pub fn request_delete(&self, id: &str) -> bool {
        let mut state = lock(&self.state);
        let Some(name) = state.mirror.get(id).map(|m| m.name.clone()) else {
            return false;
        };
        state.confirm.ask(
            format!("Remove {} from the team?", name),
            MemberAction::Delete { id: id.to_string() },
        )
    }

    pub fn cancel_delete(&self) -> bool {
        lock(&self.state).confirm.cancel()
    }

    pub fn confirm_state(&self) -> ConfirmState<MemberAction> {
        lock(&self.state).confirm.state().clone()
    }

    pub async fn confirm_delete(&self) -> bool {
        let Some(MemberAction::Delete { id }) = lock(&self.state).confirm.confirm() else {
            return false;
        };
        progress(&self.state, confirm_flow, "Removing member...", 50);
        let result = delete_member(&self.backend, &id).await;
        settle(&self.state, self.backend.dismiss_after, result, "remove member", confirm_flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::members_path;
    use crate::edit::EditKey;
    use crate::models::Priority;
    use crate::testing::{RecordingStore, WriteCall};
    use pm_console_backend::{fields, MemoryBlobStore, RecordStore};
    use serde_json::json;
    use std::time::Duration;

    fn backend(store: Arc<RecordingStore>) -> Backend {
        Backend::new(store, Arc::new(MemoryBlobStore::new())).with_dismiss_after(Duration::from_millis(10))
    }

    async fn seed(store: &RecordingStore, value: serde_json::Value) -> String {
        store
            .inner()
            .create(&members_path(), fields(value))
            .await
            .unwrap()
            .id
    }

    fn task(id: &str, status: &str) -> serde_json::Value {
        json!({"id": id, "title": id, "status": status, "priority": "High"})
    }

    #[tokio::test]
    async fn test_newest_first_and_filters() {
        let store = Arc::new(RecordingStore::new());
        seed(&store, json!({"name": "Ana", "role": "QA Engineer", "status": "Active"})).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        seed(&store, json!({"name": "Raj", "role": "DevOps Engineer", "status": "Away", "email": "raj@x.io"})).await;
        let table = TeamMembersTable::mount(backend(store.clone()), LayoutContext::new()).await;

        let names: Vec<String> = table.rows().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Raj", "Ana"]);

        table.set_search("RAJ@");
        assert_eq!(table.rows().len(), 1);
        table.set_search("");
        table.set_role_filter(Some("QA Engineer".to_string()));
        assert_eq!(table.rows()[0].name, "Ana");
        table.set_role_filter(None);
        table.set_status_filter(Some(MemberStatus::Away));
        assert_eq!(table.rows()[0].name, "Raj");
    }

    #[tokio::test]
    async fn test_rename_rewrites_avatar() {
        let store = Arc::new(RecordingStore::new());
        let id = seed(&store, json!({"name": "Ana Lopez", "avatar": "AL"})).await;
        let table = TeamMembersTable::mount(backend(store.clone()), LayoutContext::new()).await;

        table.start_edit(&id, MemberField::Name).await;
        table.change_draft(" maria garcia ");
        assert!(table.key(EditKey::Enter).await);
        let patch = store.calls()[0].patch().unwrap().clone();
        assert_eq!(patch["name"], json!("maria garcia"));
        assert_eq!(patch["avatar"], json!("MG"));
    }

    #[tokio::test]
    async fn test_task_lifecycle_tracks_projects_counter() {
        let store = Arc::new(RecordingStore::new());
        let id = seed(&store, json!({"name": "Ana", "projects": 0, "tasks": []})).await;
        let table = TeamMembersTable::mount(backend(store.clone()), LayoutContext::new()).await;

        let form = TaskForm {
            title: "Wireframes".to_string(),
            priority: Priority::High,
            due_date: "2024-06-01".to_string(),
            ..TaskForm::default()
        };
        assert!(table.add_task(&id, &form).await.unwrap());
        table.wait_for_generation(2).await;
        let member = table.member(&id).unwrap();
        assert_eq!(member.projects, 1);
        let task_id = member.tasks[0].id.clone();

        assert!(table.cycle_task(&id, &task_id).await);
        table.wait_for_generation(3).await;
        assert_eq!(table.member(&id).unwrap().tasks[0].status, TaskStatus::InProgress);

        assert!(table.set_task_status(&id, &task_id, TaskStatus::Done).await);
        table.wait_for_generation(4).await;
        assert_eq!(table.latest_task(&id).unwrap().status, TaskStatus::Done);

        assert!(table.delete_task(&id, &task_id).await);
        table.wait_for_generation(5).await;
        let member = table.member(&id).unwrap();
        assert!(member.tasks.is_empty());
        assert_eq!(member.projects, 0);
        assert!(!table.delete_task(&id, &task_id).await);
    }

    #[tokio::test]
    async fn test_delete_task_floors_counter() {
        let store = Arc::new(RecordingStore::new());
        let id = seed(
            &store,
            json!({"name": "Ana", "projects": 0, "tasks": [task("t1", "Pending"), task("t2", "Weird")]}),
        )
        .await;
        let table = TeamMembersTable::mount(backend(store.clone()), LayoutContext::new()).await;

        assert!(table.cycle_task(&id, "t2").await);
        assert_eq!(store.calls()[0].patch().unwrap()["tasks"][1]["status"], json!("Pending"));
        table.wait_for_generation(2).await;

        assert!(table.delete_task(&id, "t1").await);
        assert_eq!(store.calls()[1].patch().unwrap()["projects"], json!(0));
    }

    #[tokio::test]
    async fn test_add_member_validation() {
        let store = Arc::new(RecordingStore::new());
        let layout = LayoutContext::new();
        let table = TeamMembersTable::mount(backend(store.clone()), layout.clone()).await;

        layout.request_add(AddTarget::Member);
        assert!(table.sync_layout());
        assert!(table.add_member(&MemberForm::default()).await.is_err());
        assert!(table.is_add_open());
        let form = MemberForm {
            name: "Ana".to_string(),
            ..MemberForm::default()
        };
        assert!(table.add_member(&form).await.unwrap());
        assert!(matches!(store.calls()[0], WriteCall::Create { .. }));
        assert!(!table.is_add_open());
    }

    #[tokio::test]
    async fn test_drawer_closes_when_member_removed() {
        let store = Arc::new(RecordingStore::new());
        let id = seed(&store, json!({"name": "Ana"})).await;
        let table = TeamMembersTable::mount(backend(store.clone()), LayoutContext::new()).await;

        assert!(table.open_member(&id));
        assert!(table.request_delete(&id));
        assert!(table.confirm_delete().await);
        table.wait_for_generation(2).await;
        assert!(table.selected_member().is_none());
        assert!(table.rows().is_empty());
    }

    #[tokio::test]
    async fn test_failed_task_write_is_a_notice() {
        let store = Arc::new(RecordingStore::new());
        let id = seed(&store, json!({"name": "Ana", "tasks": [task("t1", "Pending")]})).await;
        let table = TeamMembersTable::mount(backend(store.clone()), LayoutContext::new()).await;
        store.fail_writes(true);

        assert!(!table.cycle_task(&id, "t1").await);
        assert_eq!(table.take_notices().len(), 1);
        assert!(!table.cycle_task("ghost", "t1").await);
        assert_eq!(table.take_notices().len(), 1);
    }
}
