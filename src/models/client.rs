use serde::{Deserialize, Serialize};

use super::{labelled_enum, lenient, NestedItem, Record};

/// Extensions shown under the Media tab
pub const MEDIA_TYPES: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "mp4", "mov", "avi", "mkv"];

/// Extensions shown under the Docs tab (text notes too)
pub const DOC_TYPES: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "csv", "zip", "rar",
];

labelled_enum!(
    ClientStatus, default = Active, {
        Active => "Active",
        Inactive => "Inactive",
        Pending => "Pending",
    }
);

/// An uploaded file, a saved link or a text note
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    /// Human readable size, or `Link` / `Text`
    #[serde(deserialize_with = "lenient::string")]
    pub size: String,
    /// Lower-case extension, `link` or `text`
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    pub kind: String,
    #[serde(deserialize_with = "lenient::string")]
    pub uploaded_on: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub storage_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub content: Option<String>,
}

impl NestedItem for FileEntry {
    fn item_id(&self) -> &str {
        &self.id
    }
}

impl FileEntry {
    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }

    pub fn is_link(&self) -> bool {
        self.kind == "link"
    }

    /// Blob to remove when the entry goes away
    pub fn stored_blob(&self) -> Option<&str> {
        self.storage_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Named group of files inside a client's file area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Folder {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::list")]
    pub files: Vec<FileEntry>,
}

impl NestedItem for Folder {
    fn item_id(&self) -> &str {
        &self.id
    }
}

/// The `files` field of a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientFiles {
    #[serde(deserialize_with = "lenient::list")]
    pub root: Vec<FileEntry>,
    #[serde(deserialize_with = "lenient::list")]
    pub folders: Vec<Folder>,
}

impl ClientFiles {
    /// Files at the root, or inside `folder` (None if that folder is gone)
    pub fn files_in(&self, folder: Option<&str>) -> Option<&Vec<FileEntry>> {
        match folder {
            None => Some(&self.root),
            Some(id) => self.folders.iter().find(|f| f.id == id).map(|f| &f.files),
        }
    }

    pub fn files_in_mut(&mut self, folder: Option<&str>) -> Option<&mut Vec<FileEntry>> {
        match folder {
            None => Some(&mut self.root),
            Some(id) => self
                .folders
                .iter_mut()
                .find(|f| f.id == id)
                .map(|f| &mut f.files),
        }
    }

    /// Every stored blob path, root and folders
    pub fn blob_paths(&self) -> Vec<String> {
        self.root
            .iter()
            .chain(self.folders.iter().flat_map(|f| f.files.iter()))
            .filter_map(|f| f.stored_blob().map(str::to_string))
            .collect()
    }
}

/// File manager tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileTab {
    #[default]
    Media,
    Docs,
    Links,
    Folders,
}

impl FileTab {
    /// Whether `file` is listed under this tab
    pub fn shows(&self, file: &FileEntry) -> bool {
        let kind = file.kind.to_lowercase();
        match self {
            FileTab::Media => MEDIA_TYPES.contains(&kind.as_str()),
            FileTab::Docs => DOC_TYPES.contains(&kind.as_str()) || file.is_text(),
            FileTab::Links => file.is_link(),
            FileTab::Folders => true,
        }
    }

    /// Whether a file with extension `ext` may be uploaded on this tab
    pub fn accepts_upload(&self, ext: &str) -> bool {
        match self {
            FileTab::Media => MEDIA_TYPES.contains(&ext),
            FileTab::Docs => DOC_TYPES.contains(&ext),
            FileTab::Links | FileTab::Folders => false,
        }
    }
}

/// `clients` collection
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Client {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub contact: String,
    #[serde(deserialize_with = "lenient::string")]
    pub email: String,
    #[serde(deserialize_with = "lenient::string")]
    pub phone: String,
    #[serde(deserialize_with = "lenient::string")]
    pub industry: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: ClientStatus,
    /// `$`-prefixed label
    #[serde(deserialize_with = "lenient::string")]
    pub revenue: String,
    #[serde(deserialize_with = "lenient::integer")]
    pub projects: i64,
    /// `Mon YYYY`
    #[serde(deserialize_with = "lenient::string")]
    pub since: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub files: ClientFiles,
}

impl Record for Client {
    const COLLECTION: &'static str = "clients";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Client {
    /// Case-insensitive match on name, contact, email or industry
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [&self.name, &self.contact, &self.email, &self.industry]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// `1.5 KB`-style size label
pub fn format_file_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let n = bytes as f64;
    if n < KB {
        format!("{} B", bytes)
    } else if n < KB * KB {
        format!("{:.1} KB", n / KB)
    } else {
        format!("{:.1} MB", n / (KB * KB))
    }
}

/// Lower-cased text after the last dot (the whole name when there is none)
pub fn file_extension(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_console_backend::{fields, Document};
    use serde_json::json;

    #[test]
    fn test_decode_files() {
        let doc = Document::new(
            "c1",
            fields(json!({
                "name": "Acme",
                "files": {
                    "root": [{"id": "f1", "name": "logo.png", "type": "png", "storagePath": "clients/c1/files/a_logo.png"}],
                    "folders": [{"id": "d1", "name": "Contracts", "files": [
                        {"id": "f2", "name": "nda.pdf", "type": "pdf", "storagePath": "clients/c1/files/b_nda.pdf"},
                        {"id": "f3", "name": "Site", "type": "link", "link": "https://acme.test"}
                    ]}]
                }
            })),
        );
        let client = Client::from_document(&doc).unwrap();
        assert_eq!(client.files.root.len(), 1);
        assert_eq!(
            client.files.blob_paths(),
            vec!["clients/c1/files/a_logo.png", "clients/c1/files/b_nda.pdf"]
        );
        assert_eq!(client.files.files_in(Some("d1")).map(|f| f.len()), Some(2));
        assert!(client.files.files_in(Some("nope")).is_none());
    }

    #[test]
    fn test_entry_serializes_without_empty_options() {
        let entry = FileEntry {
            id: "l1".to_string(),
            name: "Site".to_string(),
            size: "Link".to_string(),
            kind: "link".to_string(),
            uploaded_on: "2024-01-01".to_string(),
            link: Some("https://acme.test".to_string()),
            ..FileEntry::default()
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"id": "l1", "name": "Site", "size": "Link", "type": "link",
                   "uploadedOn": "2024-01-01", "link": "https://acme.test"})
        );
    }

    #[test]
    fn test_tabs() {
        let png = FileEntry { kind: "PNG".to_string(), ..FileEntry::default() };
        let note = FileEntry { kind: "text".to_string(), ..FileEntry::default() };
        assert!(FileTab::Media.shows(&png));
        assert!(!FileTab::Docs.shows(&png));
        assert!(FileTab::Docs.shows(&note));
        assert!(FileTab::Docs.accepts_upload("pdf"));
        assert!(!FileTab::Media.accepts_upload("pdf"));
        assert!(!FileTab::Links.accepts_upload("png"));
    }

    #[test]
    fn test_size_and_extension() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(file_extension("Report.Final.PDF"), "pdf");
        assert_eq!(file_extension("README"), "readme");
    }

    #[test]
    fn test_search() {
        let client = Client {
            name: "Acme".to_string(),
            industry: "Technology".to_string(),
            ..Client::default()
        };
        assert!(client.matches("tech"));
        assert!(client.matches(""));
        assert!(!client.matches("finance"));
    }
}
