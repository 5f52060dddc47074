//! Command runners for the `vchat` binary.
//!
//! Each runner wires configuration into the library components, does one
//! job, and prints a human-readable report to stdout. Diagnostics go to
//! stderr through `tracing`.

use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::style::Stylize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use vault_chat::adapter::FsAdapter;
use vault_chat::config::Config;
use vault_chat::context::ContextAssembler;
use vault_chat::history::HistoryStore;
use vault_chat::index::RelevanceIndex;
use vault_chat::models::SegmentKind;
use vault_chat::ollama::{Generator, OllamaClient};
use vault_chat::session::{ConversationSession, Reply, SessionOptions};
use vault_chat::vault::FsVault;
use vault_chat::watch::{ReindexScheduler, VaultReindexer, VaultWatcher};

fn reindexer(config: &Config, index: &Arc<RelevanceIndex>) -> Result<VaultReindexer<FsVault>> {
    let vault = FsVault::new(&config.rag.vault_root)?;
    Ok(VaultReindexer::new(
        Arc::clone(index),
        vault,
        config.rag.folder_path.clone(),
    ))
}

async fn open_session(
    config: &Config,
    index: &Arc<RelevanceIndex>,
) -> Result<ConversationSession<FsAdapter>> {
    if config.rag.enabled {
        reindexer(config, index)?.run().await;
    }
    let client = OllamaClient::new(&config.ollama)?;
    Ok(ConversationSession::restore(
        HistoryStore::from_config(FsAdapter, &config.history),
        ContextAssembler::new(Arc::clone(index)),
        Arc::new(client),
        SessionOptions::from_config(config),
    )
    .await)
}

pub async fn run_index(config: &Config) -> Result<()> {
    let index = Arc::new(RelevanceIndex::new());
    let count = reindexer(config, &index)?.run().await;

    println!("index");
    println!("  vault: {}", config.rag.vault_root.display());
    if !config.rag.folder_path.is_empty() {
        println!("  folder: {}", config.rag.folder_path);
    }
    match count {
        Some(n) => println!("  documents: {}", n),
        None => anyhow::bail!(
            "Failed to index vault: {}",
            config.rag.vault_root.display()
        ),
    }
    println!("ok");
    Ok(())
}

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let index = Arc::new(RelevanceIndex::new());
    reindexer(config, &index)?.run().await;

    let limit = limit.unwrap_or(config.rag.context_window_size);
    let results: Vec<_> = index
        .query(query, limit)
        .into_iter()
        .filter(|r| r.score > 0)
        .collect();

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let doc = &result.document;
        println!("{}. [{}] {}", i + 1, result.score, doc.path);
        if let Some(modified) = doc.metadata.modified {
            println!("    modified: {}", modified.format("%Y-%m-%d"));
        }
        let excerpt: String = doc.content.chars().take(120).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!();
    }
    Ok(())
}

pub async fn run_context(config: &Config, query: &str) -> Result<()> {
    let index = Arc::new(RelevanceIndex::new());
    if config.rag.enabled {
        reindexer(config, &index)?.run().await;
    }

    let context = ContextAssembler::new(index).assemble(
        query,
        config.rag.context_window_size,
        config.rag.enabled,
    );
    if context.is_empty() {
        println!("(no context)");
    } else {
        print!("{}", context);
    }
    Ok(())
}

pub async fn run_history_show(config: &Config) -> Result<()> {
    let store = HistoryStore::from_config(FsAdapter, &config.history);
    let messages = store.load_all().await;

    if messages.is_empty() {
        println!("No history.");
        return Ok(());
    }
    for message in &messages {
        println!(
            "[{}] {}: {}",
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            message.role,
            message.content
        );
    }
    Ok(())
}

pub async fn run_history_clear(config: &Config) -> Result<()> {
    let store = HistoryStore::from_config(FsAdapter, &config.history);
    store.clear().await?;
    println!("history cleared: {}", store.path().display());
    Ok(())
}

pub async fn run_models(config: &Config) -> Result<()> {
    let client = OllamaClient::new(&config.ollama)?;
    print_models(&client.list_models().await, client.base_url());
    Ok(())
}

fn print_models(models: &[String], server_url: &str) {
    if models.is_empty() {
        println!("No models found (is Ollama running at {}?)", server_url);
        return;
    }
    for model in models {
        println!("{}", model);
    }
}

pub async fn run_ask(config: &Config, prompt: &str) -> Result<()> {
    let index = Arc::new(RelevanceIndex::new());
    let mut session = open_session(config, &index).await?;

    if let Some(reply) = session.send(prompt).await {
        render_reply(&reply, config.display.show_reasoning);
    }
    Ok(())
}

pub async fn run_chat(config: &Config) -> Result<()> {
    let index = Arc::new(RelevanceIndex::new());
    let mut session = open_session(config, &index).await?;

    // Held for the lifetime of the chat; dropping it stops re-indexing.
    let _watch = if config.rag.enabled {
        start_watch(config, &index)?
    } else {
        None
    };

    println!("vchat — model: {}", session.options().model);
    if config.rag.enabled {
        println!("  notes indexed: {}", index.len());
    }
    if !session.messages().is_empty() {
        println!("  restored messages: {}", session.messages().len());
    }
    println!("  /clear new chat, /models list models, /quit exit");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear().await;
                println!("Started a new chat.");
            }
            "/models" => {
                let models = session.generator().list_models().await;
                print_models(&models, &config.ollama.server_url);
            }
            input => {
                if let Some(reply) = session.send(input).await {
                    render_reply(&reply, config.display.show_reasoning);
                }
            }
        }
        println!();
    }
    Ok(())
}

fn start_watch(
    config: &Config,
    index: &Arc<RelevanceIndex>,
) -> Result<Option<(Arc<ReindexScheduler>, VaultWatcher)>> {
    let scheduler = Arc::new(ReindexScheduler::new(
        Arc::new(reindexer(config, index)?),
        Duration::from_secs(config.rag.reindex_debounce_secs),
    ));
    match VaultWatcher::start(&config.rag.vault_root, Arc::clone(&scheduler)) {
        Ok(watcher) => Ok(Some((scheduler, watcher))),
        Err(e) => {
            warn!(error = %e, "vault watcher unavailable, index will not refresh");
            Ok(None)
        }
    }
}

fn render_reply(reply: &Reply, show_reasoning: bool) {
    let dim = std::io::stdout().is_terminal();
    for segment in &reply.segments {
        let text = segment.text.trim_matches('\n');
        match segment.kind {
            SegmentKind::Reasoning if show_reasoning && !text.trim().is_empty() => {
                let block = format!("[thinking]\n{}\n[/thinking]", text);
                if dim {
                    println!("{}", block.dim());
                } else {
                    println!("{}", block);
                }
            }
            SegmentKind::Reasoning => {}
            SegmentKind::Plain if !text.is_empty() => println!("{}", text),
            SegmentKind::Plain => {}
        }
    }
}
