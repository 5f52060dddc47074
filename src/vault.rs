//! Vault listing collaborator.
//!
//! A [`Vault`] lists every file in the note collection as a [`FileRef`];
//! content is read lazily, one file at a time, during an index pass.
//! [`FsVault`] walks a local directory, skipping tool and VCS folders.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::ChatError;

/// Creation and modification times, when the platform reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTimes {
    pub ctime: Option<DateTime<Utc>>,
    pub mtime: Option<DateTime<Utc>>,
}

/// A file in the vault, addressed by its vault-relative path.
#[async_trait]
pub trait FileRef: Send + Sync {
    /// Vault-relative, `/`-separated path.
    fn path(&self) -> &str;
    /// Extension without the leading dot (`"md"`), or empty.
    fn extension(&self) -> &str;
    /// File name including extension.
    fn name(&self) -> &str;
    fn stat(&self) -> FileTimes;
    async fn read(&self) -> Result<String, ChatError>;
}

pub trait Vault: Send + Sync {
    type File: FileRef;

    fn list_files(&self) -> Result<Vec<Self::File>>;
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsFileRef {
    abs_path: PathBuf,
    path: String,
    name: String,
    extension: String,
    times: FileTimes,
}

#[async_trait]
impl FileRef for FsFileRef {
    fn path(&self) -> &str {
        &self.path
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> FileTimes {
        self.times
    }

    async fn read(&self) -> Result<String, ChatError> {
        tokio::fs::read_to_string(&self.abs_path)
            .await
            .map_err(|e| ChatError::io(self.path.clone(), e))
    }
}

/// Vault rooted at a local directory.
pub struct FsVault {
    root: PathBuf,
    exclude_set: GlobSet,
}

const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/.obsidian/**",
    "**/.trash/**",
    "**/node_modules/**",
];

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        Ok(Self {
            root: root.into(),
            exclude_set: build_globset(&patterns)?,
        })
    }
}

impl Vault for FsVault {
    type File = FsFileRef;

    fn list_files(&self) -> Result<Vec<FsFileRef>> {
        if !self.root.exists() {
            bail!("Vault root does not exist: {}", self.root.display());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable vault entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");

            if self.exclude_set.is_match(&rel_str) {
                continue;
            }

            files.push(file_ref(path, rel_str));
        }

        // Sort for deterministic ordering
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(files)
    }
}

fn file_ref(path: &Path, relative_path: String) -> FsFileRef {
    let times = match std::fs::metadata(path) {
        Ok(meta) => FileTimes {
            ctime: meta.created().ok().map(to_utc),
            mtime: meta.modified().ok().map(to_utc),
        },
        Err(_) => FileTimes::default(),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();

    FsFileRef {
        abs_path: path.to_path_buf(),
        path: relative_path,
        name,
        extension,
        times,
    }
}

fn to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn vault_fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("notes/sub")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(root.join("notes/a.md"), "alpha").unwrap();
        fs::write(root.join("notes/sub/b.md"), "beta").unwrap();
        fs::write(root.join("readme.txt"), "plain").unwrap();
        fs::write(root.join(".obsidian/workspace.json"), "{}").unwrap();
        tmp
    }

    #[test]
    fn test_lists_relative_sorted_paths() {
        let tmp = vault_fixture();
        let vault = FsVault::new(tmp.path()).unwrap();
        let files = vault.list_files().unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path()).collect();
        assert_eq!(paths, vec!["notes/a.md", "notes/sub/b.md", "readme.txt"]);
    }

    #[test]
    fn test_file_ref_fields() {
        let tmp = vault_fixture();
        let vault = FsVault::new(tmp.path()).unwrap();
        let files = vault.list_files().unwrap();
        let b = files.iter().find(|f| f.path() == "notes/sub/b.md").unwrap();
        assert_eq!(b.name(), "b.md");
        assert_eq!(b.extension(), "md");
        assert!(b.stat().mtime.is_some());
    }

    #[tokio::test]
    async fn test_read_content() {
        let tmp = vault_fixture();
        let vault = FsVault::new(tmp.path()).unwrap();
        let files = vault.list_files().unwrap();
        assert_eq!(files[0].read().await.unwrap(), "alpha");
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let vault = FsVault::new(tmp.path().join("nope")).unwrap();
        assert!(vault.list_files().is_err());
    }
}
