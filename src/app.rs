//! PM Console App
//!
//! Wires the configured stores, logging and layout context together and
//! mounts page controllers on top of them.

use std::sync::Arc;
use std::time::Duration;

use pm_console_backend::{init_db, ConsoleConfig, DbState, DomainResult, FsBlobStore, SqliteRecordStore};

use crate::commands::Backend;
use crate::components::{ClientsDirectory, Dashboard, PayoutTracker, ProjectsTable, TeamMembersTable};
use crate::context::LayoutContext;

const APP_NAME: &str = "PmConsole";

pub struct App {
    config: ConsoleConfig,
    db_state: DbState,
    backend: Backend,
    layout: LayoutContext,
}

impl App {
    /// Open the database and blob root named by `config`.
    ///
    /// A logger that cannot be set up is reported and skipped.
    pub async fn start(config: ConsoleConfig) -> DomainResult<Self> {
        if let Err(e) = rolling_logger::init_logger(&config.log_dir, APP_NAME) {
            eprintln!("Failed to init rolling logger: {}", e);
        }

        let db_state = init_db(&config.database_path).await?;
        let records = SqliteRecordStore::with_buffer(db_state.connection(), config.subscription_buffer);
        let blobs = FsBlobStore::new(config.blob_root.clone());
        let backend = Backend::new(Arc::new(records), Arc::new(blobs))
            .with_dismiss_after(Duration::from_millis(config.done_dismiss_ms));

        let _ = rolling_logger::info("Console started");
        log::info!(
            "Console started with database {} and blobs under {}",
            config.database_path.display(),
            config.blob_root.display()
        );
        Ok(Self {
            config,
            db_state,
            backend,
            layout: LayoutContext::new(),
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn layout(&self) -> &LayoutContext {
        &self.layout
    }

    pub async fn dashboard(&self) -> Dashboard {
        Dashboard::mount(self.backend.clone(), self.layout.clone()).await
    }

    pub async fn projects(&self) -> ProjectsTable {
        ProjectsTable::mount(self.backend.clone(), self.layout.clone()).await
    }

    pub async fn payouts(&self) -> PayoutTracker {
        PayoutTracker::mount(self.backend.clone(), self.layout.clone()).await
    }

    pub async fn team(&self) -> TeamMembersTable {
        TeamMembersTable::mount(self.backend.clone(), self.layout.clone()).await
    }

    pub async fn clients(&self) -> ClientsDirectory {
        ClientsDirectory::mount(self.backend.clone(), self.layout.clone()).await
    }

    /// Close the database; mounted pages see failing writes afterwards
    pub async fn shutdown(&self) {
        self.db_state.close().await;
        log::info!("Console stopped");
    }
}
