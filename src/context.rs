//! Layout Context
//!
//! Shared state owned by the layout and handed to every page: one
//! "show add form" flag per page plus the header search query. Pages only
//! request transitions; the layout owns the flags.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::components::lock;

/// Which page's add form a flag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddTarget {
    Member,
    Client,
    Project,
    Payout,
}

#[derive(Debug, Default)]
struct LayoutState {
    add_requests: HashSet<AddTarget>,
    search_query: String,
}

/// Cloneable handle; clones share the same flags
#[derive(Debug, Clone, Default)]
pub struct LayoutContext {
    state: Arc<Mutex<LayoutState>>,
}

impl LayoutContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the "show add form" flag for `target`
    pub fn request_add(&self, target: AddTarget) {
        log::debug!("Add form requested for {:?}", target);
        lock(&self.state).add_requests.insert(target);
    }

    /// Consume the flag; returns whether it was set
    pub fn take_add(&self, target: AddTarget) -> bool {
        lock(&self.state).add_requests.remove(&target)
    }

    pub fn is_add_requested(&self, target: AddTarget) -> bool {
        lock(&self.state).add_requests.contains(&target)
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        lock(&self.state).search_query = query.into();
    }

    pub fn search_query(&self) -> String {
        lock(&self.state).search_query.clone()
    }
}
