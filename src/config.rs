use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Root directory of the note vault.
    #[serde(default = "default_vault_root")]
    pub vault_root: PathBuf,
    /// Vault-relative folder to index. Empty or `/` means the whole vault.
    #[serde(default)]
    pub folder_path: String,
    #[serde(default = "default_context_window_size")]
    pub context_window_size: usize,
    #[serde(default = "default_reindex_debounce_secs")]
    pub reindex_debounce_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            vault_root: default_vault_root(),
            folder_path: String::new(),
            context_window_size: default_context_window_size(),
            reindex_debounce_secs: default_reindex_debounce_secs(),
        }
    }
}

fn default_vault_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_context_window_size() -> usize {
    5
}
fn default_reindex_debounce_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub save_message_history: bool,
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
    /// Quota for the serialized log, in KiB.
    #[serde(default = "default_log_file_size_limit")]
    pub log_file_size_limit: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            save_message_history: true,
            path: default_history_path(),
            log_file_size_limit: default_log_file_size_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_history_path() -> PathBuf {
    PathBuf::from("./data/chat-history.json")
}
fn default_log_file_size_limit() -> u64 {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    /// Print reasoning segments (dimmed) before the answer.
    #[serde(default = "default_true")]
    pub show_reasoning: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_reasoning: true,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.ollama.server_url.trim().is_empty() {
        anyhow::bail!("ollama.server_url must not be empty");
    }
    if config.ollama.model.trim().is_empty() {
        anyhow::bail!("ollama.model must not be empty");
    }

    if config.rag.context_window_size < 1 {
        anyhow::bail!("rag.context_window_size must be >= 1");
    }

    if config.history.log_file_size_limit < 1 {
        anyhow::bail!("history.log_file_size_limit must be >= 1 (KiB)");
    }

    Ok(config)
}
