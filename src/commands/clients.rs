//! Client Commands
//!
//! Client records plus the blob side of the file manager.

use pm_console_backend::{CollectionPath, Document, DomainResult, Fields};
use serde::Serialize;
use uuid::Uuid;

use super::{patch, required, to_fields, Backend};
use crate::edit::money_label;
use crate::models::{
    file_extension, format_file_size, month_year, today, Client, ClientFiles, ClientStatus,
    FileEntry, Folder, Record,
};
use crate::nested;

#[derive(Debug, Clone, Default)]
pub struct ClientForm {
    pub name: String,
    pub contact: String,
    pub email: String,
    pub phone: String,
    pub industry: String,
    pub status: ClientStatus,
    pub revenue: String,
}

/// A file picked for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn extension(&self) -> String {
        file_extension(&self.name)
    }
}

// ========================
// Argument Structs
// ========================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClientArgs<'a> {
    pub name: &'a str,
    pub contact: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub industry: &'a str,
    pub status: &'a str,
    pub revenue: String,
    pub projects: i64,
    pub since: String,
    pub files: ClientFiles,
}

impl<'a> NewClientArgs<'a> {
    pub fn from_form(form: &'a ClientForm) -> DomainResult<Self> {
        Ok(Self {
            name: required(&form.name, "Client name")?,
            contact: form.contact.trim(),
            email: form.email.trim(),
            phone: form.phone.trim(),
            industry: form.industry.trim(),
            status: form.status.as_str(),
            revenue: money_label(form.revenue.trim()),
            projects: 0,
            since: month_year(),
            files: ClientFiles::default(),
        })
    }
}

impl FileEntry {
    /// Saved link; name and URL are required
    pub fn link(name: &str, url: &str) -> DomainResult<Self> {
        Ok(Self {
            id: nested::new_item_id("file"),
            name: required(name, "Link name")?.to_string(),
            size: "Link".to_string(),
            kind: "link".to_string(),
            uploaded_on: today(),
            link: Some(required(url, "Link URL")?.to_string()),
            ..FileEntry::default()
        })
    }

    /// Text note; name and content are required
    pub fn text(name: &str, content: &str) -> DomainResult<Self> {
        required(content, "Note content")?;
        Ok(Self {
            id: nested::new_item_id("file"),
            name: required(name, "Note name")?.to_string(),
            size: "Text".to_string(),
            kind: "text".to_string(),
            uploaded_on: today(),
            content: Some(content.to_string()),
            ..FileEntry::default()
        })
    }
}

impl Folder {
    pub fn named(name: &str) -> DomainResult<Self> {
        Ok(Self {
            id: nested::new_item_id("folder"),
            name: required(name, "Folder name")?.to_string(),
            files: Vec::new(),
        })
    }
}

// ========================
// Commands
// ========================

pub fn clients_path() -> CollectionPath {
    CollectionPath::new(Client::COLLECTION)
}

/// `clients/<id>/files/<uuid>_<name>`
pub fn file_blob_path(client_id: &str, file_name: &str) -> String {
    format!(
        "clients/{}/files/{}_{}",
        client_id,
        Uuid::new_v4().simple(),
        file_name.replace('/', "_")
    )
}

pub async fn create_client(backend: &Backend, args: &NewClientArgs<'_>) -> DomainResult<Document> {
    let doc = backend.records.create(&clients_path(), to_fields(args)?).await?;
    log::info!("Created client {} ({})", doc.id, args.name);
    Ok(doc)
}

pub async fn update_client(backend: &Backend, id: &str, patch: Fields) -> DomainResult<()> {
    backend.records.update(&clients_path(), id, patch).await
}

pub async fn delete_client(backend: &Backend, id: &str) -> DomainResult<()> {
    backend.records.delete(&clients_path(), id).await?;
    log::info!("Deleted client {}", id);
    Ok(())
}

/// Replace the whole `files` structure of a client
pub async fn write_files(backend: &Backend, client_id: &str, files: &ClientFiles) -> DomainResult<()> {
    update_client(backend, client_id, patch([("files", nested::to_value(files)?)])).await
}

/// Store one file's bytes and describe it as a file entry. Bytes whose
/// URL cannot be resolved are removed again.
pub async fn upload_file(backend: &Backend, client_id: &str, file: UploadFile) -> DomainResult<FileEntry> {
    let path = file_blob_path(client_id, &file.name);
    let size = format_file_size(file.bytes.len());
    let kind = file.extension();
    backend.blobs.upload(&path, file.bytes).await?;
    let url = match backend.blobs.download_url(&path).await {
        Ok(url) => url,
        Err(e) => {
            if let Err(cleanup) = backend.blobs.delete(&path).await {
                log::warn!("Could not remove {} after a failed upload: {}", path, cleanup);
            }
            return Err(e);
        }
    };
    log::info!("Uploaded {} for client {}", path, client_id);
    Ok(FileEntry {
        id: nested::new_item_id("file"),
        name: file.name,
        size,
        kind,
        uploaded_on: today(),
        url: Some(url),
        storage_path: Some(path),
        ..FileEntry::default()
    })
}
