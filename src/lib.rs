//! # Vault Chat
//!
//! A local chat client for an Ollama-hosted language model, augmented with
//! lexical retrieval over a vault of markdown notes.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────┐
//!  user input ──▶ │   ConversationSession    │ ──▶ Ollama /api/generate
//!                 └──┬───────────┬────────┬──┘
//!                    │           │        │
//!                    ▼           ▼        ▼
//!          ┌────────────────┐ ┌───────┐ ┌──────────────┐
//!          │ContextAssembler│ │Segment│ │ HistoryStore │
//!          └───────┬────────┘ └───────┘ └──────┬───────┘
//!                  ▼                           ▼
//!          ┌────────────────┐           ┌─────────────┐
//!          │ RelevanceIndex │◀─ watch   │ FileAdapter │
//!          └───────┬────────┘           └─────────────┘
//!                  ▼
//!               Vault (FS)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`adapter`] | File adapter for the history log |
//! | [`history`] | Size-bounded rotating conversation log |
//! | [`vault`] | Vault listing (filesystem) |
//! | [`index`] | Lexical relevance index |
//! | [`context`] | RAG context assembly |
//! | [`segment`] | Reasoning-tag segmentation |
//! | [`ollama`] | Ollama HTTP client |
//! | [`session`] | Per-turn conversation flow |
//! | [`watch`] | Debounced re-indexing on vault changes |

pub mod adapter;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod index;
pub mod models;
pub mod ollama;
pub mod segment;
pub mod session;
pub mod vault;
pub mod watch;
