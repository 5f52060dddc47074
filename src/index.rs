//! Lexical relevance index over vault notes.
//!
//! The index holds an immutable snapshot of [`Document`]s behind an
//! [`ArcSwap`]. An index pass builds a complete new list and swaps it in
//! at the end, so a query sees either the previous snapshot or the new
//! one, never a partially read pass.
//!
//! # Scoring
//!
//! 1. Split the query on whitespace; drop terms shorter than 3 characters.
//! 2. Each term becomes a case-insensitive pattern over its escaped text.
//! 3. A document's score is the total number of matches of all terms.
//! 4. Sort by score (desc); ties keep snapshot order. Truncate to `limit`.
//!
//! Zero-score documents are not filtered here; callers decide whether
//! they qualify.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::models::{Document, DocumentMetadata, ScoredDocument};
use crate::vault::FileRef;

/// Terms shorter than this (in characters) are ignored by [`RelevanceIndex::query`].
pub const MIN_TERM_CHARS: usize = 3;

const MARKDOWN_EXTENSION: &str = "md";

pub struct RelevanceIndex {
    snapshot: ArcSwap<Vec<Document>>,
    indexing: AtomicBool,
}

/// Resets the single-flight flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RelevanceIndex {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            indexing: AtomicBool::new(false),
        }
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::Acquire)
    }

    /// The current snapshot.
    pub fn documents(&self) -> Arc<Vec<Document>> {
        self.snapshot.load_full()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Rebuild the index from `all_files`, keeping markdown notes under
    /// `folder_path`.
    ///
    /// Returns `None` without doing anything if another pass is running.
    /// Unreadable files are logged and skipped.
    pub async fn index<F: FileRef>(
        &self,
        all_files: &[F],
        folder_path: &str,
    ) -> Option<Arc<Vec<Document>>> {
        if self
            .indexing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("index pass already running, request declined");
            return None;
        }
        let _guard = PassGuard(&self.indexing);

        let prefix = normalize_folder(folder_path);
        let mut documents = Vec::new();
        let mut skipped = 0usize;

        for file in all_files.iter().filter(|f| is_included(*f, prefix.as_deref())) {
            match file.read().await {
                Ok(content) => {
                    let times = file.stat();
                    documents.push(Document {
                        path: file.path().to_string(),
                        content,
                        metadata: DocumentMetadata {
                            filename: file.name().to_string(),
                            created: times.ctime,
                            modified: times.mtime,
                        },
                    });
                }
                Err(e) => {
                    warn!(path = file.path(), error = %e, "skipping unreadable note");
                    skipped += 1;
                }
            }
        }

        let snapshot = Arc::new(documents);
        self.snapshot.store(Arc::clone(&snapshot));
        info!(
            documents = snapshot.len(),
            skipped,
            folder = folder_path,
            "index pass complete"
        );
        Some(snapshot)
    }

    /// Score every document against `text` and return the best `limit`.
    pub fn query(&self, text: &str, limit: usize) -> Vec<ScoredDocument> {
        let patterns = term_patterns(text);
        let snapshot = self.snapshot.load_full();

        let mut ranked: Vec<(usize, u64)> = snapshot
            .iter()
            .enumerate()
            .map(|(i, doc)| (i, score(&patterns, &doc.content)))
            .collect();

        // sort_by is stable: equal scores keep snapshot order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);

        ranked
            .into_iter()
            .map(|(i, score)| ScoredDocument {
                document: snapshot[i].clone(),
                score,
            })
            .collect()
    }
}

impl Default for RelevanceIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// `None` means the whole vault.
fn normalize_folder(folder_path: &str) -> Option<String> {
    let trimmed = folder_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return None;
    }
    let mut prefix = trimmed.to_string();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    Some(prefix)
}

fn is_included<F: FileRef>(file: &F, prefix: Option<&str>) -> bool {
    if file.extension() != MARKDOWN_EXTENSION {
        return false;
    }
    match prefix {
        None => true,
        Some(prefix) => file.path().starts_with(prefix),
    }
}

fn term_patterns(text: &str) -> Vec<Regex> {
    text.split_whitespace()
        .filter(|term| term.chars().count() >= MIN_TERM_CHARS)
        .filter_map(|term| {
            RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()
                .ok()
        })
        .collect()
}

fn score(patterns: &[Regex], content: &str) -> u64 {
    patterns
        .iter()
        .map(|p| p.find_iter(content).count() as u64)
        .sum()
}
