//! Error taxonomy for the content pipeline.
//!
//! None of these are fatal: callers degrade to empty history, an empty
//! context block, or a visible assistant-side error message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not serialize history: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Ollama API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Ollama connection error (is Ollama running at {url}?): {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ChatError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ChatError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
