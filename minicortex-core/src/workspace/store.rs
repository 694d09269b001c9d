//! Workspace files on disk.

use super::{FORMAT_VERSION, WorkspaceDoc};
use crate::error::{CortexError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A directory of workspace files, one JSON document per saved name.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    dir: PathBuf,
}

impl WorkspaceStore {
    /// A store rooted at the given directory (created lazily on save).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a workspace document under the given name.
    pub fn save(&self, name: &str, doc: &WorkspaceDoc) -> Result<()> {
        let path = self.path(name)?;
        fs::create_dir_all(&self.dir).map_err(|e| storage_error(&self.dir, e))?;
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| storage_error(&path, std::io::Error::other(e)))?;
        fs::write(&path, json).map_err(|e| storage_error(&path, e))?;
        tracing::info!(name, path = %path.display(), "workspace saved");
        Ok(())
    }

    /// Read and parse a workspace document.
    pub fn load(&self, name: &str) -> Result<WorkspaceDoc> {
        let path = self.path(name)?;
        let text = fs::read_to_string(&path).map_err(|e| CortexError::LoadFailed {
            name: name.to_string(),
            cause: e.to_string(),
        })?;
        let doc: WorkspaceDoc =
            serde_json::from_str(&text).map_err(|e| CortexError::LoadFailed {
                name: name.to_string(),
                cause: format!("corrupted workspace file: {e}"),
            })?;
        if doc.version > FORMAT_VERSION {
            return Err(CortexError::LoadFailed {
                name: name.to_string(),
                cause: format!("unsupported format version {}", doc.version),
            });
        }
        Ok(doc)
    }

    /// Delete a saved workspace.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        if !path.exists() {
            return Err(CortexError::not_found("workspace", name));
        }
        fs::remove_file(&path).map_err(|e| storage_error(&path, e))
    }

    /// Enumerate saved workspace names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| storage_error(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| storage_error(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolve a workspace name to its file path. Names are sanitized to
    /// `[A-Za-z0-9_-]` so they cannot escape the store directory.
    fn path(&self, name: &str) -> Result<PathBuf> {
        let safe: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe.is_empty() {
            return Err(CortexError::validation("name", "empty workspace name"));
        }
        Ok(self.dir.join(format!("{safe}.json")))
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> CortexError {
    CortexError::Storage {
        path: path.display().to_string(),
        cause: err.to_string(),
    }
}
