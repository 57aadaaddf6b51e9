//! PM Console
//!
//! Client-side core of the project-management console: live mirrors of
//! the record store, display order overlays, inline cell editing, nested
//! item updates and confirmed destructive actions, assembled into one
//! controller per page.

pub mod app;
pub mod commands;
pub mod components;
pub mod confirm;
pub mod context;
pub mod edit;
pub mod models;
pub mod nested;
pub mod notice;
pub mod order;
pub mod store;
pub mod subscription;

#[cfg(test)]
mod testing;

pub use app::App;
pub use commands::Backend;
pub use components::{
    ClientsDirectory, Dashboard, DashboardSummary, PayoutTracker, ProjectsTable, SearchResults,
    TeamMembersTable,
};
pub use confirm::{ConfirmFlow, ConfirmState};
pub use context::{AddTarget, LayoutContext};
pub use edit::{CellEditSession, EditKey};
pub use notice::{Notice, NoticeLevel};
pub use order::{DisplayOrder, OrderMode};
pub use store::LocalMirror;
