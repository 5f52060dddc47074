//! # Vault Chat CLI (`vchat`)
//!
//! Chat with a local Ollama model, grounded in your markdown notes.
//!
//! ## Usage
//!
//! ```bash
//! vchat --config ./config/vchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vchat chat` | Interactive chat session |
//! | `vchat ask "<prompt>"` | Single turn, printed to stdout |
//! | `vchat index` | Run one index pass over the vault |
//! | `vchat search "<query>"` | Rank notes for a query |
//! | `vchat context "<query>"` | Show the RAG context a query would get |
//! | `vchat history show` | Print the persisted conversation |
//! | `vchat history clear` | Delete the persisted conversation |
//! | `vchat models` | List models installed on the Ollama server |

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use vault_chat::config::load_config;

/// Vault Chat — a local chat client for Ollama with retrieval over your notes.
#[derive(Parser)]
#[command(
    name = "vchat",
    about = "Vault Chat — chat with a local Ollama model, grounded in your markdown notes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vchat.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat.
    ///
    /// Type `/clear` to start a new chat, `/models` to list models,
    /// `/quit` to leave. The vault is re-indexed in the background when
    /// notes change.
    Chat,

    /// Send a single prompt and print the reply.
    Ask {
        /// The prompt text.
        prompt: String,
    },

    /// Index the vault and report what was found.
    Index,

    /// Rank vault notes against a query.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (defaults to `rag.context_window_size`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the context block a prompt would be sent with.
    Context {
        /// The prompt text.
        query: String,
    },

    /// Inspect or delete the persisted conversation.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// List models installed on the Ollama server.
    Models,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print every persisted message.
    Show,
    /// Delete the conversation log.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Chat => commands::run_chat(&config).await?,
        Commands::Ask { prompt } => commands::run_ask(&config, &prompt).await?,
        Commands::Index => commands::run_index(&config).await?,
        Commands::Search { query, limit } => commands::run_search(&config, &query, limit).await?,
        Commands::Context { query } => commands::run_context(&config, &query).await?,
        Commands::History { action } => match action {
            HistoryAction::Show => commands::run_history_show(&config).await?,
            HistoryAction::Clear => commands::run_history_clear(&config).await?,
        },
        Commands::Models => commands::run_models(&config).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
