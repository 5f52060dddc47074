//! Prompt context assembly for retrieval-augmented generation.
//!
//! [`ContextAssembler::assemble`] turns the best-scoring notes for a query
//! into a delimited block that is prepended to the user's prompt:
//!
//! ```text
//! --- Relevant notes from your vault ---
//! Document 1 (deploy.md):
//! <content, at most 1500 characters>
//!
//! Document 2 (infra.md):
//! ...
//! --- End of notes ---
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::index::RelevanceIndex;

pub const CONTEXT_HEADER: &str = "--- Relevant notes from your vault ---";
pub const CONTEXT_FOOTER: &str = "--- End of notes ---";
/// Per-document content cap, in characters.
pub const MAX_DOCUMENT_CHARS: usize = 1500;
const ELLIPSIS: &str = "...";

pub struct ContextAssembler {
    index: Arc<RelevanceIndex>,
}

impl ContextAssembler {
    pub fn new(index: Arc<RelevanceIndex>) -> Self {
        Self { index }
    }

    /// Build the context block for `query`, or an empty string when RAG is
    /// off, the index is empty, or no note matches any query term.
    pub fn assemble(&self, query: &str, window_size: usize, rag_enabled: bool) -> String {
        if !rag_enabled || self.index.is_empty() {
            return String::new();
        }

        let matches: Vec<_> = self
            .index
            .query(query, window_size)
            .into_iter()
            .filter(|scored| scored.score > 0)
            .collect();

        if matches.is_empty() {
            debug!("no notes matched the query");
            return String::new();
        }

        let mut out = String::new();
        out.push_str(CONTEXT_HEADER);
        out.push('\n');
        for (i, scored) in matches.iter().enumerate() {
            out.push_str(&format!(
                "Document {} ({}):\n",
                i + 1,
                scored.document.metadata.filename
            ));
            out.push_str(&truncate_chars(&scored.document.content, MAX_DOCUMENT_CHARS));
            out.push_str("\n\n");
        }
        out.push_str(CONTEXT_FOOTER);
        out.push('\n');

        debug!(documents = matches.len(), chars = out.len(), "context assembled");
        out
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_pos, _)) => format!("{}{}", &text[..byte_pos], ELLIPSIS),
        None => text.to_string(),
    }
}
