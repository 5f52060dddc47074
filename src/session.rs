//! Per-conversation orchestration.
//!
//! A [`ConversationSession`] is an explicitly owned value: the host
//! creates it (optionally restoring the persisted log) and drops it when
//! done. One turn of [`ConversationSession::send`] runs:
//!
//! ```text
//! user input ─▶ append user message
//!            ─▶ assemble RAG context (if enabled)
//!            ─▶ generate reply (errors become an assistant message)
//!            ─▶ segment reply ─▶ append assistant message
//!            ─▶ persist both messages (awaited)
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapter::FileAdapter;
use crate::config::Config;
use crate::context::ContextAssembler;
use crate::history::HistoryStore;
use crate::models::{ChatMessage, Segment};
use crate::ollama::Generator;
use crate::segment;

/// Per-session knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub model: String,
    pub rag_enabled: bool,
    pub context_window_size: usize,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.ollama.model.clone(),
            rag_enabled: config.rag.enabled,
            context_window_size: config.rag.context_window_size,
        }
    }
}

/// Outcome of one turn.
#[derive(Debug, Clone)]
pub struct Reply {
    pub message: ChatMessage,
    pub segments: Vec<Segment>,
    /// Whether retrieved notes were prepended to the prompt.
    pub used_context: bool,
    /// Whether the message is a synthesized error.
    pub failed: bool,
}

pub struct ConversationSession<A: FileAdapter> {
    messages: Vec<ChatMessage>,
    history: HistoryStore<A>,
    assembler: ContextAssembler,
    generator: Arc<dyn Generator>,
    options: SessionOptions,
}

impl<A: FileAdapter> ConversationSession<A> {
    /// Start an empty session.
    pub fn new(
        history: HistoryStore<A>,
        assembler: ContextAssembler,
        generator: Arc<dyn Generator>,
        options: SessionOptions,
    ) -> Self {
        Self {
            messages: Vec::new(),
            history,
            assembler,
            generator,
            options,
        }
    }

    /// Start a session seeded with the persisted log.
    pub async fn restore(
        history: HistoryStore<A>,
        assembler: ContextAssembler,
        generator: Arc<dyn Generator>,
        options: SessionOptions,
    ) -> Self {
        let mut session = Self::new(history, assembler, generator, options);
        session.messages = session.history.load_all().await;
        debug!(messages = session.messages.len(), "session restored");
        session
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Run one turn. Returns `None` for blank input.
    pub async fn send(&mut self, input: &str) -> Option<Reply> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let user = ChatMessage::user(input);
        self.messages.push(user.clone());

        let context = self.assembler.assemble(
            input,
            self.options.context_window_size,
            self.options.rag_enabled,
        );
        let used_context = !context.is_empty();
        let prompt = build_prompt(&context, input);

        let (content, failed) = match self.generator.generate(&self.options.model, &prompt).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(error = %e, "generation failed");
                (format!("Error: {}", e), true)
            }
        };

        let segments = segment::parse_reply(&content);
        let assistant = ChatMessage::assistant(content);
        self.messages.push(assistant.clone());

        if let Err(e) = self.history.append(&[user, assistant.clone()]).await {
            warn!(error = %e, "failed to persist chat history");
        }

        Some(Reply {
            message: assistant,
            segments,
            used_context,
            failed,
        })
    }

    /// Start a new chat: forget in-memory messages and delete the log.
    pub async fn clear(&mut self) {
        self.messages.clear();
        if let Err(e) = self.history.clear().await {
            warn!(error = %e, "failed to clear chat history");
        }
    }
}

fn build_prompt(context: &str, input: &str) -> String {
    if context.is_empty() {
        input.to_string()
    } else {
        format!("{}\n{}", context, input)
    }
}
