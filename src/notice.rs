//! User-Facing Notices
//!
//! Failures of user actions end up here instead of propagating.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    /// Non-blocking toast (failed inline edit, failed add)
    Transient,
    /// Alert the user must acknowledge (failed destructive action)
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Pending notices of one page, oldest first
#[derive(Debug, Default, Clone)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn transient(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.items.push(Notice {
            level: NoticeLevel::Transient,
            message,
        });
    }

    pub fn blocking(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{}", message);
        self.items.push(Notice {
            level: NoticeLevel::Blocking,
            message,
        });
    }

    pub fn all(&self) -> &[Notice] {
        &self.items
    }

    /// Hand the notices to the view and forget them
    pub fn take(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
