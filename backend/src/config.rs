//! Console Configuration
//!
//! JSON settings file; every field has a default so a partial or missing
//! file still yields a usable config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainResult};
use crate::repository::DEFAULT_BUFFER;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// SQLite file for the record store
    pub database_path: PathBuf,
    /// Directory holding uploaded blobs
    pub blob_root: PathBuf,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    /// How long a finished destructive action stays on screen
    pub done_dismiss_ms: u64,
    /// Per-collection subscription channel capacity
    pub subscription_buffer: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("pm_console.db"),
            blob_root: PathBuf::from("blobs"),
            log_dir: PathBuf::from("logs"),
            done_dismiss_ms: 800,
            subscription_buffer: DEFAULT_BUFFER,
        }
    }
}

impl ConsoleConfig {
    /// Read `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> DomainResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| {
            DomainError::InvalidInput(format!("Malformed config {}: {}", path.display(), e))
        })
    }

    pub fn save(&self, path: &Path) -> DomainResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Resolve relative paths against `base`
    pub fn rooted_at(mut self, base: &Path) -> Self {
        for path in [&mut self.database_path, &mut self.blob_root, &mut self.log_dir] {
            if path.is_relative() && path.as_os_str() != ":memory:" {
                *path = base.join(&*path);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConsoleConfig::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.done_dismiss_ms, 800);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"done_dismiss_ms": 50}"#).unwrap();

        let config = ConsoleConfig::load(&path).unwrap();
        assert_eq!(config.done_dismiss_ms, 50);
        assert_eq!(config.blob_root, PathBuf::from("blobs"));
    }

    #[test]
    fn test_malformed_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(ConsoleConfig::load(&path), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ConsoleConfig {
            subscription_buffer: 8,
            ..ConsoleConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(ConsoleConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_rooted_at() {
        let config = ConsoleConfig::default().rooted_at(Path::new("/data"));
        assert_eq!(config.database_path, PathBuf::from("/data/pm_console.db"));
        assert_eq!(config.log_dir, PathBuf::from("/data/logs"));
    }
}
