//! File adapter used by the history store.
//!
//! [`FileAdapter`] is the exact capability set the history log needs:
//! existence checks, whole-file read and write, copy, remove, and size.
//! [`FsAdapter`] backs it with `tokio::fs`. Unit tests use an in-memory
//! adapter that can also be told to fail individual operations.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{ChatError, Result};

/// Subset of file metadata the history store measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub size: u64,
}

#[async_trait]
pub trait FileAdapter: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;
    async fn read(&self, path: &Path) -> Result<String>;
    /// Replace the file's content, creating parent directories if needed.
    async fn write(&self, path: &Path, content: &str) -> Result<()>;
    /// Copy `src` over `dst`, overwriting any existing file.
    async fn copy(&self, src: &Path, dst: &Path) -> Result<()>;
    async fn remove(&self, path: &Path) -> Result<()>;
    async fn stat(&self, path: &Path) -> Result<FileStat>;
}

/// Local filesystem adapter.
#[derive(Debug, Default, Clone)]
pub struct FsAdapter;

#[async_trait]
impl FileAdapter for FsAdapter {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ChatError::io(path.display().to_string(), e))
    }

    async fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ChatError::io(parent.display().to_string(), e))?;
            }
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ChatError::io(path.display().to_string(), e))
    }

    async fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        tokio::fs::copy(src, dst)
            .await
            .map(|_| ())
            .map_err(|e| ChatError::io(src.display().to_string(), e))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| ChatError::io(path.display().to_string(), e))
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ChatError::io(path.display().to_string(), e))?;
        Ok(FileStat { size: meta.len() })
    }
}

#[cfg(test)]
pub(crate) use memory::{MemoryAdapter, Op};

#[cfg(test)]
mod memory {
    use std::collections::{HashMap, HashSet};
    use std::path::Path;

    use async_trait::async_trait;
    use parking_lot::RwLock;

    use super::{FileAdapter, FileStat};
    use crate::error::{ChatError, Result};

    /// Adapter operations that can be made to fail.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) enum Op {
        Read,
        Write,
        Copy,
        Remove,
        Stat,
    }

    /// In-memory adapter for tests.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryAdapter {
        files: RwLock<HashMap<String, String>>,
        failing: RwLock<HashSet<Op>>,
    }

    impl MemoryAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every later `op` call return an I/O error.
        pub fn fail(&self, op: Op) {
            self.failing.write().insert(op);
        }

        fn check(&self, op: Op, path: &Path) -> Result<()> {
            if self.failing.read().contains(&op) {
                return Err(ChatError::io(
                    Self::key(path),
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "injected failure"),
                ));
            }
            Ok(())
        }

        fn key(path: &Path) -> String {
            path.to_string_lossy().to_string()
        }

        fn not_found(path: &Path) -> ChatError {
            ChatError::io(
                Self::key(path),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        }

        /// Direct read without the async trait, for assertions.
        pub fn get(&self, path: &Path) -> Option<String> {
            self.files.read().get(&Self::key(path)).cloned()
        }

        /// Direct write without the async trait, for fixtures.
        pub fn put(&self, path: &Path, content: &str) {
            self.files
                .write()
                .insert(Self::key(path), content.to_string());
        }
    }

    #[async_trait]
    impl FileAdapter for MemoryAdapter {
        async fn exists(&self, path: &Path) -> bool {
            self.files.read().contains_key(&Self::key(path))
        }

        async fn read(&self, path: &Path) -> Result<String> {
            self.check(Op::Read, path)?;
            self.get(path).ok_or_else(|| Self::not_found(path))
        }

        async fn write(&self, path: &Path, content: &str) -> Result<()> {
            self.check(Op::Write, path)?;
            self.put(path, content);
            Ok(())
        }

        async fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
            self.check(Op::Copy, src)?;
            let content = self.get(src).ok_or_else(|| Self::not_found(src))?;
            self.put(dst, &content);
            Ok(())
        }

        async fn remove(&self, path: &Path) -> Result<()> {
            self.check(Op::Remove, path)?;
            self.files
                .write()
                .remove(&Self::key(path))
                .map(|_| ())
                .ok_or_else(|| Self::not_found(path))
        }

        async fn stat(&self, path: &Path) -> Result<FileStat> {
            self.check(Op::Stat, path)?;
            let files = self.files.read();
            let content = files.get(&Self::key(path)).ok_or_else(|| Self::not_found(path))?;
            Ok(FileStat {
                size: content.len() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fs_adapter_write_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data").join("nested").join("log.json");
        let fs = FsAdapter;

        assert!(!fs.exists(&path).await);
        fs.write(&path, "[]").await.unwrap();
        assert!(fs.exists(&path).await);
        assert_eq!(fs.read(&path).await.unwrap(), "[]");
        assert_eq!(fs.stat(&path).await.unwrap().size, 2);
    }

    #[tokio::test]
    async fn test_fs_adapter_copy_overwrites() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.json");
        let dst = tmp.path().join("b.json");
        let fs = FsAdapter;

        fs.write(&src, "new").await.unwrap();
        fs.write(&dst, "old content").await.unwrap();
        fs.copy(&src, &dst).await.unwrap();
        assert_eq!(fs.read(&dst).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_fs_adapter_remove_missing_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = FsAdapter.remove(&tmp.path().join("missing")).await;
        assert!(matches!(err, Err(ChatError::Io { .. })));
    }

    #[tokio::test]
    async fn test_memory_adapter_roundtrip() {
        let mem = MemoryAdapter::new();
        let path = Path::new("log.json");

        assert!(mem.read(path).await.is_err());
        mem.write(path, "abc").await.unwrap();
        assert_eq!(mem.stat(path).await.unwrap().size, 3);
        mem.copy(path, Path::new("log.json.backup")).await.unwrap();
        mem.remove(path).await.unwrap();
        assert!(!mem.exists(path).await);
        assert_eq!(mem.get(Path::new("log.json.backup")).as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_memory_adapter_injected_failure() {
        let mem = MemoryAdapter::new();
        let path = Path::new("log.json");
        mem.put(path, "abc");
        mem.fail(Op::Read);

        assert!(matches!(mem.read(path).await, Err(ChatError::Io { .. })));
        assert_eq!(mem.stat(path).await.unwrap().size, 3);
    }
}
