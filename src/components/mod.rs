//! Page Controllers
//!
//! One controller per list-backed page. Each owns its page state behind a
//! mutex that is never held across an await; subscription callbacks reach
//! it through a weak reference so dropping the page ends everything.

/// Public methods shared by the table pages. The page needs `state`,
/// `subscription` and `layout` fields; the `edit` arm also needs a
/// `write_commit(PendingCommit<Field>) -> bool` method.
macro_rules! table_controls {
    (core) => {
        /// Snapshots applied so far
        pub fn generation(&self) -> u64 {
            self.subscription.applied()
        }

        pub async fn wait_for_generation(&self, generation: u64) -> bool {
            self.subscription.wait_for(generation).await
        }

        pub fn is_loaded(&self) -> bool {
            $crate::components::with_mirror(&self.state, |mirror| mirror.is_loaded())
        }

        pub fn load_error(&self) -> Option<pm_console_backend::DomainError> {
            $crate::components::with_mirror(&self.state, |mirror| mirror.error().cloned())
        }

        pub fn notices(&self) -> Vec<$crate::notice::Notice> {
            $crate::components::with_notices(&self.state, |notices| notices.all().to_vec())
        }

        pub fn take_notices(&self) -> Vec<$crate::notice::Notice> {
            $crate::components::with_notices(&self.state, |notices| notices.take())
        }
    };
    (drag) => {
        pub fn drag_start(&self, index: usize) {
            $crate::components::with_order(&self.state, |order| order.drag_start(index))
        }

        pub fn drag_enter(&self, index: usize) -> bool {
            $crate::components::with_order(&self.state, |order| order.drag_enter(index))
        }

        pub fn drag_over(&self, index: usize) -> bool {
            $crate::components::with_order(&self.state, |order| order.drag_over(index))
        }

        pub fn drag_end(&self) {
            $crate::components::with_order(&self.state, |order| order.drag_end())
        }

        pub fn is_drop_target(&self, index: usize) -> bool {
            $crate::components::with_order(&self.state, |order| order.is_drop_target(index))
        }

        /// Every row id in display order, filters ignored
        pub fn display_order(&self) -> Vec<String> {
            $crate::components::with_order(&self.state, |order| order.ids().to_vec())
        }
    };
    (edit $field:ty) => {
        /// Start editing; a different cell being edited is committed first
        pub async fn start_edit(&self, id: &str, field: $field) -> bool {
            let Some(forced) = $crate::components::start_edit(&self.state, id, field) else {
                return false;
            };
            if let Some(commit) = forced {
                self.write_commit(commit).await;
            }
            true
        }

        pub fn change_draft(&self, value: impl Into<String>) -> bool {
            $crate::components::with_edit(&self.state, |edit| edit.change_draft(value))
        }

        pub fn editing(&self) -> Option<(String, $field)> {
            $crate::components::with_edit(&self.state, |edit| {
                edit.active().map(|(id, field)| (id.to_string(), field))
            })
        }

        pub fn draft(&self) -> Option<String> {
            $crate::components::with_edit(&self.state, |edit| edit.draft().map(str::to_string))
        }

        pub async fn commit_edit(&self) -> bool {
            let commit = $crate::components::with_edit(&self.state, |edit| edit.commit());
            self.write_pending(commit).await
        }

        /// Drop the draft without writing anything
        pub fn cancel_edit(&self) -> bool {
            $crate::components::with_edit(&self.state, |edit| edit.cancel())
        }

        pub async fn key(&self, key: $crate::edit::EditKey) -> bool {
            let commit = $crate::components::with_edit(&self.state, |edit| edit.key(key));
            self.write_pending(commit).await
        }

        pub async fn blur(&self) -> bool {
            let commit = $crate::components::with_edit(&self.state, |edit| edit.blur());
            self.write_pending(commit).await
        }

        async fn write_pending(&self, commit: Option<$crate::edit::PendingCommit<$field>>) -> bool {
            match commit {
                Some(commit) => self.write_commit(commit).await,
                None => false,
            }
        }
    };
    (add $target:expr) => {
        /// Open the add form if the layout asked for it
        pub fn sync_layout(&self) -> bool {
            $crate::components::sync_add(&self.state, &self.layout, $target)
        }

        pub fn is_add_open(&self) -> bool {
            $crate::components::with_add_open(&self.state, |open| *open)
        }

        pub fn close_add(&self) {
            $crate::components::with_add_open(&self.state, |open| *open = false)
        }
    };
}

mod client_files;
mod dashboard;
mod payout_tracker;
mod projects_table;
mod team_members_table;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use pm_console_backend::DomainResult;

use crate::confirm::ConfirmFlow;
use crate::context::{AddTarget, LayoutContext};
use crate::edit::{CellEditSession, EditableField, PendingCommit, StartOutcome};
use crate::models::Record;
use crate::notice::Notices;
use crate::order::DisplayOrder;
use crate::store::LocalMirror;

pub use client_files::{ClientField, ClientsAction, ClientsDirectory};
pub use dashboard::{days_until, Dashboard, DashboardSummary, SearchResults, UpcomingTask};
pub use payout_tracker::{PayoutAction, PayoutField, PayoutTracker};
pub use projects_table::{ProjectAction, ProjectField, ProjectTab, ProjectsTable};
pub use team_members_table::{MemberAction, MemberField, TeamMembersTable};

/// Lock page state, recovering from a poisoned mutex
pub fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State that collects user-facing notices
pub(crate) trait PageState {
    fn notices(&mut self) -> &mut Notices;
}

/// Page state over one mirrored collection with a display order, inline
/// editing and an add form
pub(crate) trait TableState: PageState {
    type Row: Record;
    type Field: EditableField;

    fn mirror(&self) -> &LocalMirror<Self::Row>;
    fn order(&mut self) -> &mut DisplayOrder;
    fn edit(&mut self) -> &mut CellEditSession<Self::Field>;
    fn add_open(&mut self) -> &mut bool;

    /// Text the edit input is seeded with
    fn current(row: &Self::Row, field: Self::Field) -> String;
}

pub(crate) fn with_notices<S: PageState, R>(state: &Mutex<S>, f: impl FnOnce(&mut Notices) -> R) -> R {
    f(lock(state).notices())
}

pub(crate) fn with_mirror<S: TableState, R>(state: &Mutex<S>, f: impl FnOnce(&LocalMirror<S::Row>) -> R) -> R {
    f(lock(state).mirror())
}

pub(crate) fn with_order<S: TableState, R>(state: &Mutex<S>, f: impl FnOnce(&mut DisplayOrder) -> R) -> R {
    f(lock(state).order())
}

pub(crate) fn with_edit<S: TableState, R>(
    state: &Mutex<S>,
    f: impl FnOnce(&mut CellEditSession<S::Field>) -> R,
) -> R {
    f(lock(state).edit())
}

pub(crate) fn with_add_open<S: TableState, R>(state: &Mutex<S>, f: impl FnOnce(&mut bool) -> R) -> R {
    f(lock(state).add_open())
}

/// Begin editing `field` of row `id`. `None` when the row is gone,
/// otherwise the edit forced out of another cell, if any.
pub(crate) fn start_edit<S: TableState>(
    state: &Mutex<S>,
    id: &str,
    field: S::Field,
) -> Option<Option<PendingCommit<S::Field>>> {
    let mut state = lock(state);
    let current = S::current(state.mirror().get(id)?, field);
    match state.edit().start(id, field, current) {
        StartOutcome::AlreadyEditing => Some(None),
        StartOutcome::Started { forced } => Some(forced),
    }
}

/// Open the add form when the layout requested it for `target`
pub(crate) fn sync_add<S: TableState>(state: &Mutex<S>, layout: &LayoutContext, target: AddTarget) -> bool {
    let requested = layout.take_add(target);
    let mut state = lock(state);
    if requested {
        *state.add_open() = true;
    }
    *state.add_open()
}

/// Turn a write result into a transient notice; returns whether it succeeded
pub(crate) fn report<S: PageState>(state: &Mutex<S>, result: DomainResult<()>, action: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            lock(state).notices().transient(format!("Failed to {}: {}", action, e));
            false
        }
    }
}

/// Return a finished confirmation flow to Idle after `delay`
pub(crate) fn spawn_dismiss<S, A>(
    state: Weak<Mutex<S>>,
    delay: Duration,
    epoch: u64,
    flow: fn(&mut S) -> &mut ConfirmFlow<A>,
) where
    S: Send + 'static,
    A: Clone + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(state) = state.upgrade() {
            flow(&mut lock(&state)).dismiss(epoch);
        }
    });
}

/// Finish a confirmed action: Done + timed dismiss, or a blocking notice
pub(crate) fn settle<S, A>(
    state: &Arc<Mutex<S>>,
    delay: Duration,
    result: DomainResult<()>,
    action: &str,
    flow: fn(&mut S) -> &mut ConfirmFlow<A>,
) -> bool
where
    S: PageState + Send + 'static,
    A: Clone + Send + 'static,
{
    let mut guard = lock(state);
    match result {
        Ok(()) => {
            if let Some(epoch) = flow(&mut guard).finish() {
                drop(guard);
                spawn_dismiss(Arc::downgrade(state), delay, epoch, flow);
            }
            true
        }
        Err(e) => {
            flow(&mut guard).fail();
            guard.notices().blocking(format!("Failed to {}: {}", action, e));
            false
        }
    }
}

/// Record one progress step of a running confirmed action
pub(crate) fn progress<S, A: Clone>(
    state: &Mutex<S>,
    flow: fn(&mut S) -> &mut ConfirmFlow<A>,
    label: impl Into<String>,
    percent: u8,
) {
    flow(&mut lock(state)).report(label, percent);
}
