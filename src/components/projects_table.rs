//! Projects Table
//!
//! Status tabs, search, drag-to-reorder (client-side only) and inline
//! editing over the `projects` collection.

use std::sync::{Arc, Mutex};

use pm_console_backend::{DomainResult, Query, SnapshotEvent};
use serde_json::Value;

use super::{lock, progress, report, settle, PageState, TableState};
use crate::commands::{
    create_project, delete_project, now_iso, patch, update_project, Backend, NewProjectArgs,
    ProjectForm,
};
use crate::confirm::{ConfirmFlow, ConfirmState};
use crate::context::{AddTarget, LayoutContext};
use crate::edit::{CellEditSession, EditableField, FieldKind, PendingCommit};
use crate::models::{Project, ProjectStatus, Record};
use crate::notice::Notices;
use crate::order::{DisplayOrder, OrderMode};
use crate::store::LocalMirror;
use crate::subscription::{watch_collection, SubscriptionHandle};

/// Inline-editable project columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectField {
    Name,
    Description,
    Status,
    Priority,
    Progress,
    StartDate,
    Deadline,
    Team,
}

impl EditableField for ProjectField {
    fn name(&self) -> &'static str {
        match self {
            ProjectField::Name => "name",
            ProjectField::Description => "description",
            ProjectField::Status => "status",
            ProjectField::Priority => "priority",
            ProjectField::Progress => "progress",
            ProjectField::StartDate => "startDate",
            ProjectField::Deadline => "deadline",
            ProjectField::Team => "team",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            ProjectField::Name | ProjectField::Description => FieldKind::Trimmed,
            ProjectField::Status | ProjectField::Priority => FieldKind::Text,
            ProjectField::Progress => FieldKind::Percent,
            ProjectField::StartDate | ProjectField::Deadline => FieldKind::Date,
            ProjectField::Team => FieldKind::List,
        }
    }
}

impl ProjectField {
    /// Text the edit input is seeded with
    pub fn current(&self, project: &Project) -> String {
        match self {
            ProjectField::Name => project.name.clone(),
            ProjectField::Description => project.description.clone(),
            ProjectField::Status => project.status.to_string(),
            ProjectField::Priority => project.priority.to_string(),
            ProjectField::Progress => project.progress.to_string(),
            ProjectField::StartDate => project.start_date_or_created(),
            ProjectField::Deadline => project.deadline.clone(),
            ProjectField::Team => project.team.join(", "),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectTab {
    #[default]
    All,
    InProgress,
    Completed,
}

impl ProjectTab {
    pub fn includes(&self, project: &Project) -> bool {
        match self {
            ProjectTab::All => true,
            ProjectTab::InProgress => project.status == ProjectStatus::InProgress,
            ProjectTab::Completed => project.status == ProjectStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectAction {
    Delete { id: String },
}

struct ProjectsState {
    mirror: LocalMirror<Project>,
    order: DisplayOrder,
    edit: CellEditSession<ProjectField>,
    confirm: ConfirmFlow<ProjectAction>,
    notices: Notices,
    tab: ProjectTab,
    search: String,
    add_open: bool,
}

impl PageState for ProjectsState {
    fn notices(&mut self) -> &mut Notices {
        &mut self.notices
    }
}

impl TableState for ProjectsState {
    type Row = Project;
    type Field = ProjectField;

    fn mirror(&self) -> &LocalMirror<Project> {
        &self.mirror
    }

    fn order(&mut self) -> &mut DisplayOrder {
        &mut self.order
    }

    fn edit(&mut self) -> &mut CellEditSession<ProjectField> {
        &mut self.edit
    }

    fn add_open(&mut self) -> &mut bool {
        &mut self.add_open
    }

    fn current(row: &Project, field: ProjectField) -> String {
        field.current(row)
    }
}

fn confirm_flow(state: &mut ProjectsState) -> &mut ConfirmFlow<ProjectAction> {
    &mut state.confirm
}

impl ProjectsState {
    fn new() -> Self {
        Self {
            mirror: LocalMirror::new(),
            order: DisplayOrder::new(OrderMode::Local),
            edit: CellEditSession::new(),
            confirm: ConfirmFlow::new(),
            notices: Notices::default(),
            tab: ProjectTab::All,
            search: String::new(),
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
            .cancel_if(|ProjectAction::Delete { id }| !mirror.contains(id));
    }

    /// Ids of the rows shown under the current tab and search
    fn visible_ids(&self) -> Vec<String> {
        self.mirror
            .in_order(self.order.ids())
            .filter(|p| self.tab.includes(p) && p.matches(self.search.trim()))
            .map(|p| p.id.clone())
            .collect()
    }
}

pub struct ProjectsTable {
    backend: Backend,
    layout: LayoutContext,
    state: Arc<Mutex<ProjectsState>>,
    subscription: SubscriptionHandle,
}

impl ProjectsTable {
    /// Subscribe and wait for the first snapshot
    pub async fn mount(backend: Backend, layout: LayoutContext) -> Self {
        let state = Arc::new(Mutex::new(ProjectsState::new()));
        let weak = Arc::downgrade(&state);
        let subscription = watch_collection(
            backend.records.clone(),
            Query::collection(Project::COLLECTION),
            move |event| {
                if let Some(state) = weak.upgrade() {
                    lock(&state).on_event(event);
                }
            },
        );
        subscription.wait_for(1).await;
        log::info!("Projects table mounted");
        Self {
            backend,
            layout,
            state,
            subscription,
        }
    }

    table_controls!(core);

    // ========================
    // Rows
    // ========================

    /// Visible rows in display order
    pub fn rows(&self) -> Vec<Project> {
        let state = lock(&self.state);
        state
            .visible_ids()
            .iter()
            .filter_map(|id| state.mirror.get(id).cloned())
            .collect()
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        lock(&self.state).mirror.get(id).cloned()
    }

    pub fn set_tab(&self, tab: ProjectTab) {
        lock(&self.state).tab = tab;
    }

    pub fn tab(&self) -> ProjectTab {
        lock(&self.state).tab
    }

    pub fn set_search(&self, query: impl Into<String>) {
        lock(&self.state).search = query.into();
    }

    /// Row counts per tab over the whole mirror
    pub fn tab_count(&self, tab: ProjectTab) -> usize {
        lock(&self.state)
            .mirror
            .records()
            .iter()
            .filter(|p| tab.includes(p))
            .count()
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
    // Inline editing
    // ========================

    table_controls!(edit ProjectField);

    async fn write_commit(&self, commit: PendingCommit<ProjectField>) -> bool {
        if !commit.should_write() {
            return false;
        }
        let fields = patch([
            (commit.field.name(), commit.coerced()),
            ("updatedAt", Value::String(now_iso())),
        ]);
        let result = update_project(&self.backend, &commit.record_id, fields).await;
        report(&self.state, result, &format!("update {}", commit.field.name()))
    }

    // ========================
    // Add
    // ========================

    table_controls!(add AddTarget::Project);

    /// `Err` for an invalid form (nothing is written), `Ok(false)` when the
    /// store rejected the write
    pub async fn add_project(&self, form: &ProjectForm) -> DomainResult<bool> {
        let args = NewProjectArgs::from_form(form)?;
        let created = create_project(&self.backend, &args).await.map(|_| ());
        let ok = report(&self.state, created, "add project");
        if ok {
            lock(&self.state).add_open = false;
        }
        Ok(ok)
    }

    // ========================
    // Delete
    // ========================

    pub fn request_delete(&self, id: &str) -> bool {
        let mut state = lock(&self.state);
        let Some(name) = state.mirror.get(id).map(|p| p.name.clone()) else {
            return false;
        };
        state.confirm.ask(
            format!("Delete project \"{}\"? This cannot be undone.", name),
            ProjectAction::Delete { id: id.to_string() },
        )
    }

    pub fn cancel_delete(&self) -> bool {
        lock(&self.state).confirm.cancel()
    }

    pub fn confirm_state(&self) -> ConfirmState<ProjectAction> {
        lock(&self.state).confirm.state().clone()
    }

    pub async fn confirm_delete(&self) -> bool {
        let Some(ProjectAction::Delete { id }) = lock(&self.state).confirm.confirm() else {
            return false;
        };
        progress(&self.state, confirm_flow, "Deleting project...", 50);
        let result = delete_project(&self.backend, &id).await;
        settle(&self.state, self.backend.dismiss_after, result, "delete project", confirm_flow)
    }
}
