//! Payout Tracker
//!
//! Payout clients in their persisted `order`, inline editing, milestones
//! with a derived `paidAmount`, and a detail view for one client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pm_console_backend::{
    CollectionPath, Direction, DomainError, DomainResult, Query, SnapshotEvent,
};

use super::{lock, progress, report, settle, PageState, TableState};
use crate::commands::{
    commit_order, create_payout, delete_payout, patch, payouts_path, update_payout,
    write_milestones, Backend, MilestoneForm, NewPayoutArgs, PayoutForm,
};
use crate::confirm::{ConfirmFlow, ConfirmState};
use crate::context::{AddTarget, LayoutContext};
use crate::edit::{CellEditSession, EditableField, FieldKind, PendingCommit};
use crate::models::{Milestone, MilestoneStatus, PayoutClient, Record};
use crate::nested;
use crate::notice::Notices;
use crate::order::{DisplayOrder, OrderMode};
use crate::store::LocalMirror;
use crate::subscription::{wait_applied, watch_collection, ChildSubscriptions, SubscriptionHandle};

/// Inline-editable payout columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutField {
    Name,
    Project,
    Status,
    DueDate,
    TotalBudget,
    PaidAmount,
}

impl EditableField for PayoutField {
    fn name(&self) -> &'static str {
        match self {
            PayoutField::Name => "name",
            PayoutField::Project => "project",
            PayoutField::Status => "status",
            PayoutField::DueDate => "dueDate",
            PayoutField::TotalBudget => "totalBudget",
            PayoutField::PaidAmount => "paidAmount",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            PayoutField::Name | PayoutField::Project => FieldKind::Trimmed,
            PayoutField::Status => FieldKind::Text,
            PayoutField::DueDate => FieldKind::Date,
            PayoutField::TotalBudget | PayoutField::PaidAmount => FieldKind::Number,
        }
    }

    fn skip_empty(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutAction {
    DeleteClient { id: String },
}

/// Budget totals over every client
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PayoutSummary {
    pub total_budget: f64,
    pub paid: f64,
    pub outstanding: f64,
}

struct PayoutState {
    mirror: LocalMirror<PayoutClient>,
    /// Milestones of records that still keep them in a sub-collection
    legacy: HashMap<String, Vec<Milestone>>,
    children: Option<ChildSubscriptions>,
    order: DisplayOrder,
    edit: CellEditSession<PayoutField>,
    confirm: ConfirmFlow<PayoutAction>,
    notices: Notices,
    selected: Option<String>,
    add_open: bool,
}

impl PageState for PayoutState {
    fn notices(&mut self) -> &mut Notices {
        &mut self.notices
    }
}

impl TableState for PayoutState {
    type Row = PayoutClient;
    type Field = PayoutField;

    fn mirror(&self) -> &LocalMirror<PayoutClient> {
        &self.mirror
    }

    fn order(&mut self) -> &mut DisplayOrder {
        &mut self.order
    }

    fn edit(&mut self) -> &mut CellEditSession<PayoutField> {
        &mut self.edit
    }

    fn add_open(&mut self) -> &mut bool {
        &mut self.add_open
    }

    fn current(row: &PayoutClient, field: PayoutField) -> String {
        row.field_text(field.name())
    }
}

fn confirm_flow(state: &mut PayoutState) -> &mut ConfirmFlow<PayoutAction> {
    &mut state.confirm
}

impl PayoutState {
    fn new() -> Self {
        Self {
            mirror: LocalMirror::new(),
            legacy: HashMap::new(),
            children: None,
            order: DisplayOrder::new(OrderMode::Persisted),
            edit: CellEditSession::new(),
            confirm: ConfirmFlow::new(),
            notices: Notices::default(),
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
            .cancel_if(|PayoutAction::DeleteClient { id }| !mirror.contains(id));
        let selection_gone = self
            .selected
            .as_ref()
            .map(|id| !mirror.contains(id))
            .unwrap_or(false);
        if selection_gone {
            log::debug!("Selected payout client disappeared");
            self.selected = None;
        }

        let legacy_parents: Vec<&str> = mirror
            .records()
            .iter()
            .filter(|c| c.milestones.is_none())
            .map(|c| c.id.as_str())
            .collect();
        if let Some(children) = self.children.as_mut() {
            for gone in children.sync_parents(legacy_parents) {
                self.legacy.remove(&gone);
            }
        }
    }

    fn on_child_event(&mut self, parent_id: &str, event: SnapshotEvent) {
        match event {
            SnapshotEvent::Snapshot(docs) => {
                let milestones = docs
                    .iter()
                    .filter_map(|doc| match Milestone::from_document(doc) {
                        Ok(milestone) => Some(milestone),
                        Err(e) => {
                            log::warn!("Skipping milestone {}: {}", doc.id, e);
                            None
                        }
                    })
                    .collect();
                self.legacy.insert(parent_id.to_string(), milestones);
            }
            SnapshotEvent::Error(e) => {
                log::error!("Milestones of {} unavailable: {}", parent_id, e);
                self.legacy.remove(parent_id);
            }
        }
    }

    /// Embedded milestones, else the legacy sub-collection
    fn milestones_of(&self, client: &PayoutClient) -> Vec<Milestone> {
        match &client.milestones {
            Some(list) => list.clone(),
            None => self.legacy.get(&client.id).cloned().unwrap_or_default(),
        }
    }

    /// Keeps its milestones in the sub-collection, which has not delivered
    fn legacy_pending(&self, client: &PayoutClient) -> bool {
        client.milestones.is_none() && !self.legacy.contains_key(&client.id)
    }

    /// Legacy documents to remove when `client` is next written
    fn legacy_ids(&self, client: &PayoutClient) -> Vec<String> {
        if client.milestones.is_some() {
            return Vec::new();
        }
        self.legacy
            .get(&client.id)
            .map(|list| list.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }
}

pub struct PayoutTracker {
    backend: Backend,
    layout: LayoutContext,
    state: Arc<Mutex<PayoutState>>,
    subscription: SubscriptionHandle,
}

impl PayoutTracker {
    pub async fn mount(backend: Backend, layout: LayoutContext) -> Self {
        let state = Arc::new(Mutex::new(PayoutState::new()));

        let weak = Arc::downgrade(&state);
        let children = ChildSubscriptions::new(
            backend.records.clone(),
            payouts_path(),
            "milestones",
            |path: CollectionPath| Query::collection(path),
            move |parent_id, event| {
                if let Some(state) = weak.upgrade() {
                    lock(&state).on_child_event(parent_id, event);
                }
            },
        );
        lock(&state).children = Some(children);

        let weak = Arc::downgrade(&state);
        let subscription = watch_collection(
            backend.records.clone(),
            Query::collection(PayoutClient::COLLECTION).order_by_field("order", Direction::Asc),
            move |event| {
                if let Some(state) = weak.upgrade() {
                    lock(&state).on_event(event);
                }
            },
        );
        subscription.wait_for(1).await;
        log::info!("Payout tracker mounted");
        Self {
            backend,
            layout,
            state,
            subscription,
        }
    }

    table_controls!(core);

    /// Wait for `count` pushes of a legacy client's milestone sub-collection
    pub async fn wait_for_milestones(&self, client_id: &str, count: u64) -> bool {
        let watcher = lock(&self.state)
            .children
            .as_ref()
            .and_then(|children| children.handle(client_id))
            .map(|handle| handle.watcher());
        match watcher {
            Some(rx) => wait_applied(rx, count).await,
            None => false,
        }
    }

    /// Let a client that still keeps its milestones in the sub-collection
    /// receive them before anything reads or replaces them
    async fn legacy_loaded(&self, client_id: &str) {
        let pending = {
            let state = lock(&self.state);
            state
                .mirror
                .get(client_id)
                .is_some_and(|client| state.legacy_pending(client))
        };
        if pending && !self.wait_for_milestones(client_id, 1).await {
            log::warn!("Milestone subscription of {} ended before its first push", client_id);
        }
    }

    // ========================
    // Rows
    // ========================

    pub fn rows(&self) -> Vec<PayoutClient> {
        let state = lock(&self.state);
        state.mirror.in_order(state.order.ids()).cloned().collect()
    }

    pub fn client(&self, id: &str) -> Option<PayoutClient> {
        lock(&self.state).mirror.get(id).cloned()
    }

    /// Current milestones of a client, wherever they are stored
    pub fn milestones(&self, client_id: &str) -> Vec<Milestone> {
        let state = lock(&self.state);
        state
            .mirror
            .get(client_id)
            .map(|client| state.milestones_of(client))
            .unwrap_or_default()
    }

    pub fn summary(&self) -> PayoutSummary {
        let state = lock(&self.state);
        let total_budget: f64 = state.mirror.records().iter().map(|c| c.total_budget).sum();
        let paid: f64 = state.mirror.records().iter().map(|c| c.paid_amount).sum();
        PayoutSummary {
            total_budget,
            paid,
            outstanding: total_budget - paid,
        }
    }

    // ========================
    // Detail view
    // ========================

    pub fn select(&self, id: &str) -> bool {
        let mut state = lock(&self.state);
        if !state.mirror.contains(id) {
            return false;
        }
        state.selected = Some(id.to_string());
        true
    }

    pub fn selected(&self) -> Option<PayoutClient> {
        let state = lock(&self.state);
        state.selected.as_ref().and_then(|id| state.mirror.get(id).cloned())
    }

    pub fn clear_selection(&self) {
        lock(&self.state).selected = None;
    }

    // ========================
    // Drag and drop
    // ========================

    table_controls!(drag);

    /// Drop and renumber every client in one batch. A rejected batch puts
    /// the rows back in the store's order.
    pub async fn drop_on(&self, index: usize) -> bool {
        let positions: Vec<(String, i64)> = {
            let mut state = lock(&self.state);
            let Some(mv) = state.order.drop_on(index) else {
                return false;
            };
            if !state.order.move_row(mv) {
                return false;
            }
            state
                .order
                .positions()
                .map(|(id, position)| (id.to_string(), position))
                .collect()
        };

        let result = commit_order(
            &self.backend,
            positions.iter().map(|(id, position)| (id.as_str(), *position)),
        )
        .await;
        if let Err(e) = result {
            let mut state = lock(&self.state);
            let ids = state.mirror.ids();
            state.order.reset(&ids);
            state.notices.transient(format!("Failed to save order: {}", e));
            return false;
        }
        true
    }

    // ========================
    // Inline editing
    // ========================

    table_controls!(edit PayoutField);

    async fn write_commit(&self, commit: PendingCommit<PayoutField>) -> bool {
        if !commit.should_write() {
            log::debug!("Empty {} draft, nothing written", commit.field.name());
            return false;
        }
        let fields = patch([(commit.field.name(), commit.coerced())]);
        let result = update_payout(&self.backend, &commit.record_id, fields).await;
        report(&self.state, result, &format!("update {}", commit.field.name()))
    }

    // ========================
    // Add client
    // ========================

    table_controls!(add AddTarget::Payout);

    pub async fn add_client(&self, form: &PayoutForm) -> DomainResult<bool> {
        let order = lock(&self.state).mirror.len() as i64;
        let args = NewPayoutArgs::from_form(form, order)?;
        let created = create_payout(&self.backend, &args).await.map(|_| ());
        let ok = report(&self.state, created, "add client");
        if ok {
            lock(&self.state).add_open = false;
        }
        Ok(ok)
    }

    // ========================
    // Milestones
    // ========================

    pub async fn add_milestone(&self, client_id: &str, form: &MilestoneForm) -> DomainResult<bool> {
        let milestone = Milestone::from_form(form)?;
        Ok(self
            .mutate_milestones(client_id, "add milestone", move |list| {
                Some(nested::append(list, milestone))
            })
            .await)
    }

    /// Paid <-> Pending
    pub async fn toggle_milestone(&self, client_id: &str, milestone_id: &str) -> bool {
        self.mutate_milestones(client_id, "update milestone", |list| {
            nested::update_item(list, milestone_id, |m| m.status = m.status.toggled())
        })
        .await
    }

    pub async fn set_milestone_status(&self, client_id: &str, milestone_id: &str, status: MilestoneStatus) -> bool {
        self.mutate_milestones(client_id, "update milestone", |list| {
            nested::update_item(list, milestone_id, |m| m.status = status)
        })
        .await
    }

    pub async fn delete_milestone(&self, client_id: &str, milestone_id: &str) -> bool {
        self.mutate_milestones(client_id, "delete milestone", |list| {
            let ids = [milestone_id.to_string()].into_iter().collect();
            let (kept, removed) = nested::remove_items(list, &ids);
            (!removed.is_empty()).then_some(kept)
        })
        .await
    }

    /// Read the freshest list, apply `change` and write list + `paidAmount`
    /// in one go
    async fn mutate_milestones(
        &self,
        client_id: &str,
        action: &str,
        change: impl FnOnce(&[Milestone]) -> Option<Vec<Milestone>>,
    ) -> bool {
        self.legacy_loaded(client_id).await;
        let (next, legacy_ids) = {
            let mut state = lock(&self.state);
            let refused = match state.mirror.get(client_id) {
                None => Some("client no longer exists"),
                Some(client) if state.legacy_pending(client) => Some("milestones could not be loaded"),
                Some(_) => None,
            };
            if let Some(reason) = refused {
                state.notices.transient(format!("Failed to {}: {}", action, reason));
                return false;
            }
            let Some(client) = state.mirror.get(client_id) else {
                return false;
            };
            let current = state.milestones_of(client);
            let legacy_ids = state.legacy_ids(client);
            (change(&current), legacy_ids)
        };
        let Some(next) = next else {
            return false;
        };
        let result = write_milestones(&self.backend, client_id, &next, &legacy_ids).await;
        report(&self.state, result, action)
    }

    // ========================
    // Delete client
    // ========================

    pub fn request_delete(&self, id: &str) -> bool {
        let mut state = lock(&self.state);
        let Some(name) = state.mirror.get(id).map(|c| c.name.clone()) else {
            return false;
        };
        state.confirm.ask(
            format!("Delete \"{}\" and all of its milestones?", name),
            PayoutAction::DeleteClient { id: id.to_string() },
        )
    }

    pub fn cancel_delete(&self) -> bool {
        lock(&self.state).confirm.cancel()
    }

    pub fn confirm_state(&self) -> ConfirmState<PayoutAction> {
        lock(&self.state).confirm.state().clone()
    }

    pub async fn confirm_delete(&self) -> bool {
        let Some(PayoutAction::DeleteClient { id }) = lock(&self.state).confirm.confirm() else {
            return false;
        };
        progress(&self.state, confirm_flow, "Deleting client...", 50);
        self.legacy_loaded(&id).await;
        let legacy_ids = {
            let state = lock(&self.state);
            match state.mirror.get(&id) {
                Some(client) if state.legacy_pending(client) => None,
                Some(client) => Some(state.legacy_ids(client)),
                None => Some(Vec::new()),
            }
        };
        let result = match legacy_ids {
            Some(legacy_ids) => delete_payout(&self.backend, &id, &legacy_ids).await,
            None => Err(DomainError::Storage(format!("milestones of {} could not be loaded", id))),
        };
        settle(&self.state, self.backend.dismiss_after, result, "delete client", confirm_flow)
    }
}
