//! Clients Directory
//!
//! The clients table plus the per-client file manager: tabs, folders,
//! selection mode, uploads and cascading deletes that sweep stored blobs
//! before the metadata write.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use pm_console_backend::{DomainError, DomainResult, Query, SnapshotEvent};

use super::{lock, progress, report, settle, PageState, TableState};
use crate::commands::{
    create_client, delete_client, patch, update_client, upload_file, write_files, Backend,
    ClientForm, NewClientArgs, UploadFile,
};
use crate::confirm::{ConfirmFlow, ConfirmState};
use crate::context::{AddTarget, LayoutContext};
use crate::edit::{CellEditSession, EditableField, FieldKind, PendingCommit};
use crate::models::{Client, ClientFiles, FileEntry, FileTab, Folder, Record, DOC_TYPES, MEDIA_TYPES};
use crate::nested::{self, sweep_blobs, SelectionSet};
use crate::notice::Notices;
use crate::order::{DisplayOrder, OrderMode};
use crate::store::LocalMirror;
use crate::subscription::{watch_collection, SubscriptionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientField {
    Name,
    Contact,
    Email,
    Phone,
    Industry,
    Status,
    Revenue,
    Projects,
}

impl EditableField for ClientField {
    fn name(&self) -> &'static str {
        match self {
            ClientField::Name => "name",
            ClientField::Contact => "contact",
            ClientField::Email => "email",
            ClientField::Phone => "phone",
            ClientField::Industry => "industry",
            ClientField::Status => "status",
            ClientField::Revenue => "revenue",
            ClientField::Projects => "projects",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            ClientField::Name
            | ClientField::Contact
            | ClientField::Email
            | ClientField::Phone
            | ClientField::Industry => FieldKind::Trimmed,
            ClientField::Status => FieldKind::Text,
            ClientField::Revenue => FieldKind::Money,
            ClientField::Projects => FieldKind::Integer,
        }
    }
}

impl ClientField {
    pub fn current(&self, client: &Client) -> String {
        match self {
            ClientField::Name => client.name.clone(),
            ClientField::Contact => client.contact.clone(),
            ClientField::Email => client.email.clone(),
            ClientField::Phone => client.phone.clone(),
            ClientField::Industry => client.industry.clone(),
            ClientField::Status => client.status.to_string(),
            ClientField::Revenue => client.revenue.clone(),
            ClientField::Projects => client.projects.to_string(),
        }
    }
}

/// Destructive actions waiting on confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientsAction {
    DeleteClient {
        id: String,
    },
    DeleteFile {
        client_id: String,
        folder: Option<String>,
        file_id: String,
    },
    DeleteSelected {
        client_id: String,
        folder: Option<String>,
        file_ids: Vec<String>,
    },
    DeleteFolder {
        client_id: String,
        folder_id: String,
    },
}

impl ClientsAction {
    fn client_id(&self) -> &str {
        match self {
            ClientsAction::DeleteClient { id } => id,
            ClientsAction::DeleteFile { client_id, .. }
            | ClientsAction::DeleteSelected { client_id, .. }
            | ClientsAction::DeleteFolder { client_id, .. } => client_id,
        }
    }
}

/// File manager view over one client
#[derive(Debug, Default)]
struct FileManager {
    client_id: Option<String>,
    tab: FileTab,
    folder: Option<String>,
    selection: SelectionSet,
}

impl FileManager {
    fn close(&mut self) {
        *self = FileManager::default();
    }
}

struct ClientsState {
    mirror: LocalMirror<Client>,
    order: DisplayOrder,
    edit: CellEditSession<ClientField>,
    confirm: ConfirmFlow<ClientsAction>,
    notices: Notices,
    search: String,
    files: FileManager,
    add_open: bool,
}

impl PageState for ClientsState {
    fn notices(&mut self) -> &mut Notices {
        &mut self.notices
    }
}

impl TableState for ClientsState {
    type Row = Client;
    type Field = ClientField;

    fn mirror(&self) -> &LocalMirror<Client> {
        &self.mirror
    }

    fn order(&mut self) -> &mut DisplayOrder {
        &mut self.order
    }

    fn edit(&mut self) -> &mut CellEditSession<ClientField> {
        &mut self.edit
    }

    fn add_open(&mut self) -> &mut bool {
        &mut self.add_open
    }

    fn current(row: &Client, field: ClientField) -> String {
        field.current(row)
    }
}

fn confirm_flow(state: &mut ClientsState) -> &mut ConfirmFlow<ClientsAction> {
    &mut state.confirm
}

impl ClientsState {
    fn new() -> Self {
        Self {
            mirror: LocalMirror::new(),
            order: DisplayOrder::new(OrderMode::Local),
            edit: CellEditSession::new(),
            confirm: ConfirmFlow::new(),
            notices: Notices::default(),
            search: String::new(),
            files: FileManager::default(),
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
        self.confirm.cancel_if(|action| !mirror.contains(action.client_id()));

        let Some(client) = self.files.client_id.as_ref().map(|id| mirror.get(id)) else {
            return;
        };
        match client {
            None => {
                log::debug!("Client with open file manager disappeared, closing it");
                self.files.close();
            }
            Some(client) => {
                let folder_gone = self
                    .files
                    .folder
                    .as_deref()
                    .is_some_and(|id| client.files.files_in(Some(id)).is_none());
                if folder_gone {
                    self.files.folder = None;
                    self.files.selection.clear();
                }
            }
        }
    }

    fn open_client(&self) -> Option<&Client> {
        self.files.client_id.as_ref().and_then(|id| self.mirror.get(id))
    }

    fn visible_files(&self) -> Vec<FileEntry> {
        let Some(client) = self.open_client() else {
            return Vec::new();
        };
        match self.files.folder.as_deref() {
            Some(folder) => client.files.files_in(Some(folder)).cloned().unwrap_or_default(),
            // Folders tab lists folders, not root files
            None if self.files.tab == FileTab::Folders => Vec::new(),
            None => client
                .files
                .root
                .iter()
                .filter(|f| self.files.tab.shows(f))
                .cloned()
                .collect(),
        }
    }

    /// Whether an upload named `ext` fits the current tab or folder
    fn accepts(&self, ext: &str) -> bool {
        if self.files.folder.is_some() {
            MEDIA_TYPES.contains(&ext) || DOC_TYPES.contains(&ext)
        } else {
            self.files.tab.accepts_upload(ext)
        }
    }
}

pub struct ClientsDirectory {
    backend: Backend,
    layout: LayoutContext,
    state: Arc<Mutex<ClientsState>>,
    subscription: SubscriptionHandle,
}

impl ClientsDirectory {
    pub async fn mount(backend: Backend, layout: LayoutContext) -> Self {
        let state = Arc::new(Mutex::new(ClientsState::new()));
        let weak = Arc::downgrade(&state);
        let subscription = watch_collection(
            backend.records.clone(),
            Query::collection(Client::COLLECTION).newest_first(),
            move |event| {
                if let Some(state) = weak.upgrade() {
                    lock(&state).on_event(event);
                }
            },
        );
        subscription.wait_for(1).await;
        log::info!("Clients directory mounted");
        Self {
            backend,
            layout,
            state,
            subscription,
        }
    }

    table_controls!(core);

    // ========================
    // Clients table
    // ========================

    pub fn rows(&self) -> Vec<Client> {
        let state = lock(&self.state);
        state
            .mirror
            .in_order(state.order.ids())
            .filter(|c| c.matches(&state.search))
            .cloned()
            .collect()
    }

    pub fn client(&self, id: &str) -> Option<Client> {
        lock(&self.state).mirror.get(id).cloned()
    }

    pub fn set_search(&self, query: impl Into<String>) {
        lock(&self.state).search = query.into();
    }

    table_controls!(edit ClientField);

    async fn write_commit(&self, commit: PendingCommit<ClientField>) -> bool {
        if !commit.should_write() {
            return false;
        }
        let fields = patch([(commit.field.name(), commit.coerced())]);
        let result = update_client(&self.backend, &commit.record_id, fields).await;
        report(&self.state, result, &format!("update {}", commit.field.name()))
    }

    table_controls!(add AddTarget::Client);

    pub async fn add_client(&self, form: &ClientForm) -> DomainResult<bool> {
        let args = NewClientArgs::from_form(form)?;
        let created = create_client(&self.backend, &args).await.map(|_| ());
        let ok = report(&self.state, created, "add client");
        if ok {
            lock(&self.state).add_open = false;
        }
        Ok(ok)
    }

    // ========================
    // File manager navigation
    // ========================

    pub fn open_files(&self, client_id: &str) -> bool {
        let mut state = lock(&self.state);
        if !state.mirror.contains(client_id) {
            return false;
        }
        state.files.close();
        state.files.client_id = Some(client_id.to_string());
        true
    }

    pub fn close_files(&self) {
        lock(&self.state).files.close();
    }

    pub fn open_client(&self) -> Option<Client> {
        lock(&self.state).open_client().cloned()
    }

    pub fn tab(&self) -> FileTab {
        lock(&self.state).files.tab
    }

    /// Switching tabs leaves any folder and clears the selection
    pub fn set_tab(&self, tab: FileTab) {
        let mut state = lock(&self.state);
        state.files.tab = tab;
        state.files.folder = None;
        state.files.selection.clear();
    }

    pub fn open_folder(&self, folder_id: &str) -> bool {
        let mut state = lock(&self.state);
        let exists = state
            .open_client()
            .is_some_and(|c| c.files.files_in(Some(folder_id)).is_some());
        if !exists {
            return false;
        }
        state.files.folder = Some(folder_id.to_string());
        state.files.selection.clear();
        true
    }

    pub fn leave_folder(&self) {
        let mut state = lock(&self.state);
        state.files.folder = None;
        state.files.selection.clear();
    }

    pub fn current_folder(&self) -> Option<String> {
        lock(&self.state).files.folder.clone()
    }

    pub fn folders(&self) -> Vec<Folder> {
        lock(&self.state)
            .open_client()
            .map(|c| c.files.folders.clone())
            .unwrap_or_default()
    }

    /// Files listed for the current tab or folder
    pub fn visible_files(&self) -> Vec<FileEntry> {
        lock(&self.state).visible_files()
    }

    // ========================
    // Selection mode
    // ========================

    pub fn enter_selection(&self) {
        lock(&self.state).files.selection.enter();
    }

    pub fn exit_selection(&self) {
        lock(&self.state).files.selection.exit();
    }

    pub fn is_selecting(&self) -> bool {
        lock(&self.state).files.selection.is_active()
    }

    pub fn toggle_selected(&self, file_id: &str) -> bool {
        lock(&self.state).files.selection.toggle(file_id)
    }

    pub fn toggle_select_all(&self) {
        let mut state = lock(&self.state);
        let visible: Vec<String> = state.visible_files().into_iter().map(|f| f.id).collect();
        state
            .files
            .selection
            .toggle_all(visible.iter().map(String::as_str));
    }

    pub fn selected_count(&self) -> usize {
        lock(&self.state).files.selection.len()
    }

    // ========================
    // File mutations
    // ========================

    /// Upload files into the current tab or folder with one record write.
    ///
    /// Every file's type is checked before anything is uploaded.
    pub async fn upload(&self, files: Vec<UploadFile>) -> DomainResult<bool> {
        let (client_id, folder) = {
            let state = lock(&self.state);
            let Some(client_id) = state.files.client_id.clone() else {
                return Err(DomainError::InvalidInput("No client selected".to_string()));
            };
            if let Some(bad) = files.iter().find(|f| !state.accepts(&f.extension())) {
                return Err(DomainError::InvalidInput(format!(
                    "{} is not an accepted file type here",
                    bad.name
                )));
            }
            (client_id, state.files.folder.clone())
        };
        if files.is_empty() {
            return Ok(false);
        }

        let mut entries = Vec::with_capacity(files.len());
        let mut failure = None;
        for file in files {
            match upload_file(&self.backend, &client_id, file).await {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        let uploaded: Vec<String> = entries
            .iter()
            .filter_map(|f: &FileEntry| f.stored_blob().map(str::to_string))
            .collect();
        if let Some(e) = failure {
            sweep_blobs(self.backend.blobs.clone(), uploaded).await;
            return Ok(report(&self.state, Err(e), "upload files"));
        }

        let count = entries.len();
        let ok = self
            .mutate_files(&client_id, "save uploaded files", |files| {
                let target = files.files_in_mut(folder.as_deref())?;
                target.extend(entries);
                Some(())
            })
            .await;
        if ok {
            log::info!("Added {} file(s) to client {}", count, client_id);
        } else {
            // Nothing references the new blobs
            sweep_blobs(self.backend.blobs.clone(), uploaded).await;
        }
        Ok(ok)
    }

    pub async fn add_link(&self, name: &str, url: &str) -> DomainResult<bool> {
        let entry = FileEntry::link(name, url)?;
        Ok(self.add_entry(entry, "add link").await)
    }

    pub async fn add_text(&self, name: &str, content: &str) -> DomainResult<bool> {
        let entry = FileEntry::text(name, content)?;
        Ok(self.add_entry(entry, "add note").await)
    }

    async fn add_entry(&self, entry: FileEntry, action: &str) -> bool {
        let Some((client_id, folder)) = self.location() else {
            return false;
        };
        self.mutate_files(&client_id, action, |files| {
            files.files_in_mut(folder.as_deref())?.push(entry);
            Some(())
        })
        .await
    }

    pub async fn create_folder(&self, name: &str) -> DomainResult<bool> {
        let folder = Folder::named(name)?;
        let Some((client_id, _)) = self.location() else {
            return Ok(false);
        };
        Ok(self
            .mutate_files(&client_id, "create folder", |files| {
                files.folders = nested::append(&files.folders, folder);
                Some(())
            })
            .await)
    }

    /// Rename a file in the current view; text notes may also get new content
    pub async fn edit_file(&self, file_id: &str, name: &str, content: Option<&str>) -> DomainResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidInput("File name is required".to_string()));
        }
        let Some((client_id, folder)) = self.location() else {
            return Ok(false);
        };
        Ok(self
            .mutate_files(&client_id, "update file", |files| {
                let list = files.files_in_mut(folder.as_deref())?;
                let updated = nested::update_item(list, file_id, |file| {
                    file.name = name.to_string();
                    if let Some(content) = content.filter(|_| file.is_text()) {
                        file.content = Some(content.to_string());
                    }
                })?;
                *list = updated;
                Some(())
            })
            .await)
    }

    fn location(&self) -> Option<(String, Option<String>)> {
        let state = lock(&self.state);
        let client_id = state.files.client_id.clone()?;
        Some((client_id, state.files.folder.clone()))
    }

    /// Read-modify-write of a client's `files` from the latest snapshot
    async fn mutate_files(
        &self,
        client_id: &str,
        action: &str,
        change: impl FnOnce(&mut ClientFiles) -> Option<()>,
    ) -> bool {
        let files = {
            let mut state = lock(&self.state);
            let Some(mut files) = state.mirror.get(client_id).map(|c| c.files.clone()) else {
                state
                    .notices
                    .transient(format!("Failed to {}: client no longer exists", action));
                return false;
            };
            if change(&mut files).is_none() {
                return false;
            }
            files
        };
        let result = write_files(&self.backend, client_id, &files).await;
        report(&self.state, result, action)
    }

    // ========================
    // Confirmed deletes
    // ========================

    pub fn request_delete_client(&self, id: &str) -> bool {
        let mut state = lock(&self.state);
        let Some(client) = state.mirror.get(id) else {
            return false;
        };
        let message = format!(
            "Delete {} and all {} stored file(s)?",
            client.name,
            client.files.blob_paths().len()
        );
        state
            .confirm
            .ask(message, ClientsAction::DeleteClient { id: id.to_string() })
    }

    pub fn request_delete_file(&self, file_id: &str) -> bool {
        let mut state = lock(&self.state);
        let folder = state.files.folder.clone();
        let Some(client) = state.open_client() else {
            return false;
        };
        let Some(file) = client
            .files
            .files_in(folder.as_deref())
            .and_then(|files| files.iter().find(|f| f.id == file_id))
        else {
            return false;
        };
        let message = format!("Delete {}?", file.name);
        let action = ClientsAction::DeleteFile {
            client_id: client.id.clone(),
            folder,
            file_id: file_id.to_string(),
        };
        state.confirm.ask(message, action)
    }

    pub fn request_delete_selected(&self) -> bool {
        let mut state = lock(&self.state);
        let Some(client_id) = state.files.client_id.clone() else {
            return false;
        };
        let mut file_ids: Vec<String> = state.files.selection.ids().iter().cloned().collect();
        if file_ids.is_empty() {
            return false;
        }
        file_ids.sort();
        let message = format!("Delete {} selected file(s)?", file_ids.len());
        let action = ClientsAction::DeleteSelected {
            client_id,
            folder: state.files.folder.clone(),
            file_ids,
        };
        state.confirm.ask(message, action)
    }

    pub fn request_delete_folder(&self, folder_id: &str) -> bool {
        let mut state = lock(&self.state);
        let Some(client) = state.open_client() else {
            return false;
        };
        let Some(folder) = client.files.folders.iter().find(|f| f.id == folder_id) else {
            return false;
        };
        let message = format!(
            "Delete folder {} and its {} file(s)?",
            folder.name,
            folder.files.len()
        );
        let action = ClientsAction::DeleteFolder {
            client_id: client.id.clone(),
            folder_id: folder_id.to_string(),
        };
        state.confirm.ask(message, action)
    }

    pub fn cancel_delete(&self) -> bool {
        lock(&self.state).confirm.cancel()
    }

    pub fn confirm_state(&self) -> ConfirmState<ClientsAction> {
        lock(&self.state).confirm.state().clone()
    }

    /// Progress steps reported by the running or last confirmed action
    pub fn confirm_steps(&self) -> Vec<(String, u8)> {
        lock(&self.state).confirm.steps().to_vec()
    }

    pub async fn confirm_delete(&self) -> bool {
        let Some(action) = lock(&self.state).confirm.confirm() else {
            return false;
        };
        let (result, what) = match action {
            ClientsAction::DeleteClient { id } => (self.run_delete_client(&id).await, "delete client"),
            ClientsAction::DeleteFile {
                client_id,
                folder,
                file_id,
            } => (
                self.run_delete_file(&client_id, folder.as_deref(), &file_id).await,
                "delete file",
            ),
            ClientsAction::DeleteSelected {
                client_id,
                folder,
                file_ids,
            } => (
                self.run_delete_selected(&client_id, folder.as_deref(), file_ids).await,
                "delete files",
            ),
            ClientsAction::DeleteFolder {
                client_id,
                folder_id,
            } => (
                self.run_delete_folder(&client_id, &folder_id).await,
                "delete folder",
            ),
        };
        settle(&self.state, self.backend.dismiss_after, result, what, confirm_flow)
    }

    fn files_of(&self, client_id: &str) -> DomainResult<ClientFiles> {
        lock(&self.state)
            .mirror
            .get(client_id)
            .map(|c| c.files.clone())
            .ok_or_else(|| DomainError::NotFound(format!("client {}", client_id)))
    }

    async fn run_delete_client(&self, id: &str) -> DomainResult<()> {
        let blobs = self.files_of(id)?.blob_paths();
        if !blobs.is_empty() {
            progress(
                &self.state,
                confirm_flow,
                format!("Removing {} stored file(s)...", blobs.len()),
                30,
            );
            sweep_blobs(self.backend.blobs.clone(), blobs).await;
        }
        progress(&self.state, confirm_flow, "Deleting client...", 70);
        delete_client(&self.backend, id).await
    }

    async fn run_delete_file(&self, client_id: &str, folder: Option<&str>, file_id: &str) -> DomainResult<()> {
        progress(&self.state, confirm_flow, "Deleting file...", 20);
        let blob = self
            .files_of(client_id)?
            .files_in(folder)
            .and_then(|files| files.iter().find(|f| f.id == file_id))
            .and_then(|f| f.stored_blob().map(str::to_string));
        if let Some(blob) = blob {
            progress(&self.state, confirm_flow, "Removing from storage...", 50);
            sweep_blobs(self.backend.blobs.clone(), vec![blob]).await;
        }

        progress(&self.state, confirm_flow, "Saving changes...", 80);
        let ids = HashSet::from([file_id.to_string()]);
        self.remove_files(client_id, folder, &ids).await
    }

    async fn run_delete_selected(
        &self,
        client_id: &str,
        folder: Option<&str>,
        file_ids: Vec<String>,
    ) -> DomainResult<()> {
        progress(&self.state, confirm_flow, "Preparing deletion...", 10);
        let ids: HashSet<String> = file_ids.into_iter().collect();
        let blobs: Vec<String> = self
            .files_of(client_id)?
            .files_in(folder)
            .map(|files| {
                files
                    .iter()
                    .filter(|f| ids.contains(&f.id))
                    .filter_map(|f| f.stored_blob().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        progress(
            &self.state,
            confirm_flow,
            format!("Deleting {} files...", ids.len()),
            50,
        );
        sweep_blobs(self.backend.blobs.clone(), blobs).await;

        progress(&self.state, confirm_flow, "Saving changes...", 80);
        self.remove_files(client_id, folder, &ids).await?;
        lock(&self.state).files.selection.exit();
        Ok(())
    }

    async fn run_delete_folder(&self, client_id: &str, folder_id: &str) -> DomainResult<()> {
        progress(&self.state, confirm_flow, "Preparing folder deletion...", 10);
        let blobs: Vec<String> = self
            .files_of(client_id)?
            .folders
            .iter()
            .filter(|f| f.id == folder_id)
            .flat_map(|f| f.files.iter())
            .filter_map(|f| f.stored_blob().map(str::to_string))
            .collect();
        if !blobs.is_empty() {
            progress(
                &self.state,
                confirm_flow,
                format!("Deleting {} file(s)...", blobs.len()),
                40,
            );
            let sweep = sweep_blobs(self.backend.blobs.clone(), blobs).await;
            if !sweep.failed.is_empty() {
                log::warn!(
                    "Folder {} removed with {} blob(s) left in storage",
                    folder_id,
                    sweep.failed.len()
                );
            }
        }

        progress(&self.state, confirm_flow, "Removing folder...", 75);
        let mut files = self.files_of(client_id)?;
        let ids = HashSet::from([folder_id.to_string()]);
        let (kept, _) = nested::remove_items(&files.folders, &ids);
        files.folders = kept;
        write_files(&self.backend, client_id, &files).await?;

        let mut state = lock(&self.state);
        if state.files.folder.as_deref() == Some(folder_id) {
            state.files.folder = None;
            state.files.selection.clear();
        }
        Ok(())
    }

    /// Drop entries from the latest snapshot and write `files` once
    async fn remove_files(&self, client_id: &str, folder: Option<&str>, ids: &HashSet<String>) -> DomainResult<()> {
        let mut files = self.files_of(client_id)?;
        let list = files
            .files_in_mut(folder)
            .ok_or_else(|| DomainError::NotFound("folder".to_string()))?;
        let (kept, removed) = nested::remove_items(list, ids);
        *list = kept;
        log::info!("Removing {} file(s) from client {}", removed.len(), client_id);
        write_files(&self.backend, client_id, &files).await
    }
}
