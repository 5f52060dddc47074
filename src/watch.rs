//! Debounced re-indexing on vault changes.
//!
//! [`ReindexScheduler`] owns a single pending-timer slot. Each
//! [`signal`](ReindexScheduler::signal) aborts the pending timer (if any)
//! and arms a new one, so a burst of signals collapses into one pass that
//! starts one window after the last signal. The pass itself runs on its
//! own task: aborting a timer never interrupts a pass already started.
//!
//! [`VaultWatcher`] feeds filesystem notifications for markdown files into
//! a scheduler.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::index::RelevanceIndex;
use crate::vault::Vault;

/// Something that can rebuild the index.
#[async_trait]
pub trait Reindex: Send + Sync + 'static {
    async fn reindex(&self);
}

/// Lists a vault and runs an index pass over it.
pub struct VaultReindexer<V: Vault> {
    index: Arc<RelevanceIndex>,
    vault: Arc<V>,
    folder_path: String,
}

impl<V> VaultReindexer<V>
where
    V: Vault + 'static,
    V::File: 'static,
{
    pub fn new(index: Arc<RelevanceIndex>, vault: V, folder_path: impl Into<String>) -> Self {
        Self {
            index,
            vault: Arc::new(vault),
            folder_path: folder_path.into(),
        }
    }

    /// Run one pass. Returns the number of indexed documents, or `None`
    /// when the vault could not be listed or a pass was already running.
    pub async fn run(&self) -> Option<usize> {
        // Listing walks the directory tree synchronously.
        let vault = Arc::clone(&self.vault);
        let files = match tokio::task::spawn_blocking(move || vault.list_files()).await {
            Ok(Ok(files)) => files,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to list vault, keeping previous index");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "vault listing task failed, keeping previous index");
                return None;
            }
        };
        self.index
            .index(&files, &self.folder_path)
            .await
            .map(|docs| docs.len())
    }
}

#[async_trait]
impl<V> Reindex for VaultReindexer<V>
where
    V: Vault + 'static,
    V::File: 'static,
{
    async fn reindex(&self) {
        self.run().await;
    }
}

pub struct ReindexScheduler {
    target: Arc<dyn Reindex>,
    window: Duration,
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ReindexScheduler {
    /// Must be called from within a tokio runtime; later signals may come
    /// from any thread.
    pub fn new(target: Arc<dyn Reindex>, window: Duration) -> Self {
        Self {
            target,
            window,
            runtime: Handle::current(),
            pending: Mutex::new(None),
        }
    }

    /// Schedule a pass one window from now, replacing any pending one.
    pub fn signal(&self) {
        let target = Arc::clone(&self.target);
        let window = self.window;
        let runtime = self.runtime.clone();

        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
            trace!("pending re-index timer replaced");
        }
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            debug!("debounce window elapsed, starting re-index");
            runtime.spawn(async move { target.reindex().await });
        }));
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drop the pending timer without running a pass.
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for ReindexScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Watches a vault directory and signals a scheduler on note changes.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    forward: JoinHandle<()>,
}

impl VaultWatcher {
    pub fn start(root: &Path, scheduler: Arc<ReindexScheduler>) -> Result<Self> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_note_change(&event) => {
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "vault watch error"),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!(root = %root.display(), "watching vault for changes");

        let forward = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                scheduler.signal();
            }
        });

        Ok(Self {
            _watcher: watcher,
            forward,
        })
    }
}

impl Drop for VaultWatcher {
    fn drop(&mut self) {
        self.forward.abort();
    }
}

fn is_note_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.extension().is_some_and(|ext| ext == "md"))
}
