//! Size-bounded, rotating conversation log.
//!
//! The log is a single JSON array of [`ChatMessage`]s at a fixed path.
//! Every [`HistoryStore::append`] keeps the file under the configured quota
//! (in KiB of its serialized form):
//!
//! 1. No log yet: the batch becomes the whole file.
//! 2. Log already over quota: it is copied to the single backup slot
//!    (`<path>.backup`) and the log is overwritten with the batch alone.
//! 3. Otherwise existing and new messages are concatenated and the oldest
//!    entries are dropped from the head until the result fits.
//!
//! The most recent message is never dropped. A single message larger than
//! the quota is written on its own and logged as an overflow.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::adapter::FileAdapter;
use crate::config::HistoryConfig;
use crate::error::{ChatError, Result};
use crate::models::ChatMessage;

/// Suffix appended to the log path to form the backup slot.
pub const BACKUP_SUFFIX: &str = ".backup";

pub struct HistoryStore<A: FileAdapter> {
    adapter: A,
    path: PathBuf,
    backup_path: PathBuf,
    quota_kib: u64,
    enabled: bool,
}

impl<A: FileAdapter> HistoryStore<A> {
    pub fn new(adapter: A, path: impl Into<PathBuf>, quota_kib: u64, enabled: bool) -> Self {
        let path = path.into();
        let mut backup = path.as_os_str().to_owned();
        backup.push(BACKUP_SUFFIX);
        Self {
            adapter,
            path,
            backup_path: PathBuf::from(backup),
            quota_kib,
            enabled,
        }
    }

    pub fn from_config(adapter: A, config: &HistoryConfig) -> Self {
        Self::new(
            adapter,
            config.path.clone(),
            config.log_file_size_limit,
            config.save_message_history,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Persist a batch of new messages, rotating or trimming as needed.
    ///
    /// No-op when persistence is disabled or the batch is empty.
    pub async fn append(&self, new_messages: &[ChatMessage]) -> Result<()> {
        if !self.enabled || new_messages.is_empty() {
            return Ok(());
        }

        if !self.adapter.exists(&self.path).await {
            return self.write_fitted(new_messages.to_vec()).await;
        }

        let existing_kib = kib(self.adapter.stat(&self.path).await?.size);
        if existing_kib > self.quota_kib as f64 {
            self.adapter.copy(&self.path, &self.backup_path).await?;
            info!(
                path = %self.path.display(),
                size_kib = existing_kib,
                quota_kib = self.quota_kib,
                "history log over quota, rotated to backup"
            );
            return self.write_fitted(new_messages.to_vec()).await;
        }

        let raw = self.adapter.read(&self.path).await?;
        let mut combined = match self.parse(&raw) {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "history log is corrupt, overwriting with new messages");
                Vec::new()
            }
        };
        combined.extend_from_slice(new_messages);
        self.write_fitted(combined).await
    }

    /// Read the whole log. Missing, disabled, unreadable, or corrupt logs
    /// all yield an empty history.
    pub async fn load_all(&self) -> Vec<ChatMessage> {
        if !self.enabled || !self.adapter.exists(&self.path).await {
            return Vec::new();
        }

        let raw = match self.adapter.read(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to read history log");
                return Vec::new();
            }
        };

        match self.parse(&raw) {
            Ok(messages) => {
                debug!(count = messages.len(), "history loaded");
                messages
            }
            Err(e) => {
                warn!(error = %e, "history log is corrupt, starting empty");
                Vec::new()
            }
        }
    }

    fn parse(&self, raw: &str) -> Result<Vec<ChatMessage>> {
        serde_json::from_str(raw).map_err(|source| ChatError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Delete the log file. The backup slot is left alone.
    pub async fn clear(&self) -> Result<()> {
        if !self.adapter.exists(&self.path).await {
            return Ok(());
        }
        self.adapter.remove(&self.path).await?;
        debug!(path = %self.path.display(), "history log cleared");
        Ok(())
    }

    async fn write_fitted(&self, messages: Vec<ChatMessage>) -> Result<()> {
        let fitted = fit_to_quota(messages, self.quota_kib)?;
        if fitted.dropped > 0 {
            debug!(dropped = fitted.dropped, "trimmed oldest history entries");
        }
        if fitted.overflow {
            warn!(
                quota_kib = self.quota_kib,
                size_kib = kib(fitted.json.len() as u64),
                "single message exceeds history quota, writing it anyway"
            );
        }
        self.adapter.write(&self.path, &fitted.json).await
    }
}

struct Fitted {
    json: String,
    dropped: usize,
    overflow: bool,
}

/// Drop messages from the head until the serialized form fits the quota,
/// keeping at least the most recent message.
fn fit_to_quota(mut messages: Vec<ChatMessage>, quota_kib: u64) -> Result<Fitted> {
    let quota = quota_kib as f64;
    let mut json = serialize(&messages)?;
    let mut dropped = 0;

    while messages.len() > 1 && kib(json.len() as u64) > quota {
        messages.remove(0);
        dropped += 1;
        json = serialize(&messages)?;
    }

    let overflow = kib(json.len() as u64) > quota;
    Ok(Fitted {
        json,
        dropped,
        overflow,
    })
}

fn serialize(messages: &[ChatMessage]) -> Result<String> {
    serde_json::to_string_pretty(messages).map_err(ChatError::Serialize)
}

fn kib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{FileAdapter, MemoryAdapter, Op};

    const LOG: &str = "history.json";

    fn store(quota_kib: u64) -> HistoryStore<MemoryAdapter> {
        HistoryStore::new(MemoryAdapter::new(), LOG, quota_kib, true)
    }

    fn logged(store: &HistoryStore<MemoryAdapter>) -> Vec<ChatMessage> {
        let raw = store.adapter().get(Path::new(LOG)).expect("log exists");
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_backup_path_has_suffix() {
        let s = HistoryStore::new(MemoryAdapter::new(), "data/log.json", 10, true);
        assert_eq!(s.backup_path(), Path::new("data/log.json.backup"));
    }

    #[tokio::test]
    async fn test_first_append_writes_batch() {
        let s = store(64);
        let batch = vec![ChatMessage::user("hello"), ChatMessage::assistant("hi")];
        s.append(&batch).await.unwrap();
        assert_eq!(logged(&s), batch);
    }

    #[tokio::test]
    async fn test_append_concatenates_existing_first() {
        let s = store(64);
        let first = ChatMessage::user("one");
        let second = ChatMessage::assistant("two");
        s.append(std::slice::from_ref(&first)).await.unwrap();
        s.append(std::slice::from_ref(&second)).await.unwrap();
        assert_eq!(logged(&s), vec![first, second]);
    }

    #[tokio::test]
    async fn test_quota_invariant_holds_after_each_append() {
        let s = store(1);
        for i in 0..50 {
            let batch = vec![
                ChatMessage::user(format!("question number {}", i)),
                ChatMessage::assistant(format!("answer number {}", i)),
            ];
            s.append(&batch).await.unwrap();
            let size = s.adapter().stat(Path::new(LOG)).await.unwrap().size;
            assert!(size <= 1024, "log grew to {} bytes after append {}", size, i);
        }
        // Trimming is from the head: the newest pair always survives.
        let log = logged(&s);
        assert_eq!(log.last().unwrap().content, "answer number 49");
        assert_eq!(log[log.len() - 2].content, "question number 49");
    }

    #[tokio::test]
    async fn test_rotation_preserves_prior_log_in_backup() {
        let s = store(1);
        let big: Vec<ChatMessage> = (0..40)
            .map(|i| ChatMessage::user(format!("old message {:04}", i)))
            .collect();
        let big_json = serde_json::to_string_pretty(&big).unwrap();
        assert!(big_json.len() > 1024);
        s.adapter().put(Path::new(LOG), &big_json);

        let batch = vec![ChatMessage::user("fresh")];
        s.append(&batch).await.unwrap();

        let backup = s.adapter().get(s.backup_path()).expect("backup written");
        assert_eq!(backup, big_json);
        assert_eq!(logged(&s), batch);
    }

    #[tokio::test]
    async fn test_rotation_overwrites_previous_backup() {
        let s = store(1);
        s.adapter().put(s.backup_path(), "stale");
        let oversized = "x".repeat(2048);
        s.adapter().put(Path::new(LOG), &oversized);

        s.append(&[ChatMessage::user("next")]).await.unwrap();
        assert_eq!(s.adapter().get(s.backup_path()).unwrap(), oversized);
    }

    #[tokio::test]
    async fn test_corrupt_log_under_quota_is_overwritten() {
        let s = store(64);
        s.adapter().put(Path::new(LOG), "{not json");
        let batch = vec![ChatMessage::user("recovered")];
        s.append(&batch).await.unwrap();
        assert_eq!(logged(&s), batch);
    }

    #[tokio::test]
    async fn test_oversized_single_message_is_kept_alone() {
        let s = store(1);
        s.append(&[ChatMessage::user("small")]).await.unwrap();
        let huge = ChatMessage::assistant("y".repeat(4096));
        s.append(std::slice::from_ref(&huge)).await.unwrap();
        assert_eq!(logged(&s), vec![huge]);
    }

    #[tokio::test]
    async fn test_load_all_missing_is_empty() {
        let s = store(64);
        assert!(s.load_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_all_corrupt_is_empty() {
        let s = store(64);
        s.adapter().put(Path::new(LOG), "[{\"role\":");
        assert!(s.load_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_all_roundtrips_appended_messages() {
        let s = store(64);
        let batch = vec![ChatMessage::user("q"), ChatMessage::assistant("a")];
        s.append(&batch).await.unwrap();
        assert_eq!(s.load_all().await, batch);
    }

    #[tokio::test]
    async fn test_disabled_store_neither_reads_nor_writes() {
        let s = HistoryStore::new(MemoryAdapter::new(), LOG, 64, false);
        s.adapter().put(Path::new(LOG), "[]");
        s.append(&[ChatMessage::user("ignored")]).await.unwrap();
        assert_eq!(s.adapter().get(Path::new(LOG)).unwrap(), "[]");
        assert!(s.load_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_log_and_is_idempotent() {
        let s = store(64);
        s.append(&[ChatMessage::user("bye")]).await.unwrap();
        s.clear().await.unwrap();
        assert!(s.adapter().get(Path::new(LOG)).is_none());
        s.clear().await.unwrap();
    }

    #[test]
    fn test_serialized_timestamp_is_iso8601() {
        let json = serialize(&[ChatMessage::user("t")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let ts = value[0]["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        assert_eq!(value[0]["role"], "user");
    }

    #[tokio::test]
    async fn test_load_all_read_failure_is_empty() {
        let s = store(64);
        s.append(&[ChatMessage::user("kept on disk")]).await.unwrap();
        s.adapter().fail(Op::Read);
        assert!(s.load_all().await.is_empty());
    }

    #[test]
    fn test_corrupt_log_is_parse_error() {
        let s = store(64);
        let err = s.parse("[{\"role\":").unwrap_err();
        assert!(matches!(err, ChatError::Parse { ref path, .. } if path == LOG));
    }

    #[tokio::test]
    async fn test_append_stat_failure_is_io_error() {
        let s = store(64);
        s.append(&[ChatMessage::user("first")]).await.unwrap();
        s.adapter().fail(Op::Stat);

        let err = s.append(&[ChatMessage::user("second")]).await.unwrap_err();
        assert!(matches!(err, ChatError::Io { .. }));
        assert_eq!(logged(&s).len(), 1);
    }

    #[tokio::test]
    async fn test_append_copy_failure_leaves_log_untouched() {
        let s = store(1);
        let oversized = serde_json::to_string(&vec![ChatMessage::user("z".repeat(2048))]).unwrap();
        s.adapter().put(Path::new(LOG), &oversized);
        s.adapter().fail(Op::Copy);

        let err = s.append(&[ChatMessage::user("next")]).await.unwrap_err();
        assert!(matches!(err, ChatError::Io { .. }));
        assert_eq!(s.adapter().get(Path::new(LOG)).unwrap(), oversized);
        assert!(s.adapter().get(s.backup_path()).is_none());
    }

    #[tokio::test]
    async fn test_append_write_failure_is_io_error() {
        let s = store(64);
        s.adapter().fail(Op::Write);

        let err = s.append(&[ChatMessage::user("lost")]).await.unwrap_err();
        assert!(matches!(err, ChatError::Io { .. }));
        assert!(!s.adapter().exists(Path::new(LOG)).await);
    }

    #[tokio::test]
    async fn test_clear_remove_failure_is_io_error() {
        let s = store(64);
        s.append(&[ChatMessage::user("stays")]).await.unwrap();
        s.adapter().fail(Op::Remove);

        assert!(matches!(s.clear().await, Err(ChatError::Io { .. })));
        assert_eq!(logged(&s).len(), 1);
    }
}
