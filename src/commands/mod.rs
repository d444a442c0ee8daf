
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::chat::{ChatBackend, ChatSession, GeminiChatClient};
use crate::config::Config;
use crate::credentials::{API_KEY_ENV, CredentialStore};
use crate::database::VectorDatabase;
use crate::database::models::{PassageMatch, StatementResult};
use crate::embeddings::{Embedder, GeminiEmbeddingClient};
use crate::provider::ProviderClient;
use crate::rag::{
    Conversation, ConversationMessage, ERROR_PREFIX, IngestSource, RagOrchestrator,
};
use crate::render::render_markdown;

const TABLES_QUERY: &str =
    "SELECT name, type FROM sqlite_master WHERE type IN ('table', 'view') ORDER BY name";
const PREVIEW_CHARS: usize = 200;

/// Everything a command needs, wired from one configuration and credential store
pub struct App {
    pub config: Config,
    pub credentials: CredentialStore,
    pub database: Arc<VectorDatabase>,
    pub rag: Arc<RagOrchestrator>,
    chat: Arc<GeminiChatClient>,
}

impl App {
    #[inline]
    pub fn new(config: Config, credentials: CredentialStore) -> Result<Self> {
        let provider = ProviderClient::new(&config, credentials.clone())
            .context("Failed to create provider client")?;
        let embedder = Arc::new(GeminiEmbeddingClient::new(&config, provider.clone()));
        let chat = Arc::new(GeminiChatClient::new(&config, provider));
        let database = Arc::new(VectorDatabase::from_config(&config));
        let rag = Arc::new(RagOrchestrator::new(
            embedder as Arc<dyn Embedder>,
            Arc::clone(&database),
            config.retrieval,
        ));

        Ok(Self {
            config,
            credentials,
            database,
            rag,
            chat,
        })
    }

    /// Default configuration directory plus the API key from the environment
    #[inline]
    pub fn load() -> Result<Self> {
        let config = Config::load_default().context("Failed to load configuration")?;
        Self::new(config, CredentialStore::from_env())
    }

    /// A fresh conversation with its own chat session
    #[inline]
    pub fn conversation(&self) -> Conversation {
        let backend = Arc::clone(&self.chat) as Arc<dyn ChatBackend>;
        Conversation::new(Arc::clone(&self.rag), ChatSession::new(backend))
    }

    fn warn_if_no_credential(&self) {
        if !self.credentials.is_configured() {
            warn!("No API key configured");
            eprintln!(
                "{} No API key set. Export {} or enter one with /key in the chat.",
                style("⚠").yellow(),
                style(API_KEY_ENV).cyan()
            );
        }
    }
}

/// A line typed into the chat REPL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Message(String),
    Reset,
    Key,
    Search(String),
    Help,
    Quit,
    Unknown(String),
}

#[inline]
pub fn parse_repl_command(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return ReplCommand::Message(line.trim_end_matches(['\r', '\n']).to_string());
    };

    let (name, argument) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));

    match name {
        "reset" => ReplCommand::Reset,
        "key" => ReplCommand::Key,
        "search" => ReplCommand::Search(argument.to_string()),
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(name.to_string()),
    }
}

/// Interactive conversation with retrieval-augmented answers
#[inline]
pub async fn chat() -> Result<()> {
    let app = App::load()?;
    app.warn_if_no_credential();

    println!("{}", style("💬 rag-chat").bold().cyan());
    println!(
        "Type a message to chat, {} for commands, {} to leave.",
        style("/help").cyan(),
        style("/quit").cyan()
    );

    let mut conversation = app.conversation();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", style("you>").bold().green());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read from stdin")?
        else {
            println!();
            break;
        };

        match parse_repl_command(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => print_repl_help(),
            ReplCommand::Reset => {
                conversation.reset();
                println!("{}", style("Chat session reset.").dim());
            }
            ReplCommand::Key => prompt_for_key(&app.credentials)?,
            ReplCommand::Search(query) => {
                if query.is_empty() {
                    println!("Usage: /search <query>");
                    continue;
                }
                let bar = spinner("Searching...");
                let result = app.rag.search(&query, app.rag.search_limit()).await;
                bar.finish_and_clear();
                match result {
                    Ok(matches) => print_matches(&matches),
                    Err(e) => print_error(&format!("{e:#}")),
                }
            }
            ReplCommand::Unknown(name) => {
                println!(
                    "Unknown command /{name}. Type {} for a list.",
                    style("/help").cyan()
                );
            }
            ReplCommand::Message(text) => {
                let bar = spinner("Thinking...");
                let reply = conversation.send(&text).await;
                bar.finish_and_clear();
                if let Some(message) = reply {
                    print_assistant(message);
                }
            }
        }
    }

    info!(
        "Chat ended after {} messages",
        conversation.messages().len()
    );
    Ok(())
}

/// Answer a single question and exit
#[inline]
pub async fn ask(question: &str) -> Result<()> {
    let app = App::load()?;
    app.warn_if_no_credential();

    let mut conversation = app.conversation();
    let bar = spinner("Thinking...");
    let reply = conversation.send(question).await;
    bar.finish_and_clear();

    match reply {
        Some(message) if message.is_error() => {
            let reason = message.text.strip_prefix(ERROR_PREFIX).unwrap_or(&message.text);
            anyhow::bail!("{reason}")
        }
        Some(message) => print_assistant(message),
        None => println!("Nothing to ask."),
    }
    Ok(())
}

/// Embed and store a passage of text or a text file
#[inline]
pub async fn ingest(source: IngestSource) -> Result<()> {
    let app = App::load()?;
    app.warn_if_no_credential();

    let bar = spinner("Embedding...");
    let result = app.rag.ingest(source).await;
    bar.finish_and_clear();

    let passage = result?;
    println!(
        "{} Stored passage {} ({} characters)",
        style("✓").green(),
        style(passage.id).cyan(),
        passage.content.chars().count()
    );
    Ok(())
}

/// List the passages closest to `query`
#[inline]
pub async fn search(query: &str, limit: Option<u32>) -> Result<()> {
    let app = App::load()?;
    app.warn_if_no_credential();

    let limit = limit.unwrap_or_else(|| app.rag.search_limit());
    let bar = spinner("Searching...");
    let result = app.rag.search(query, limit).await;
    bar.finish_and_clear();

    print_matches(&result?);
    Ok(())
}

/// Run one SQL batch, or start the SQL console when no statement is given
#[inline]
pub async fn sql(statement: Option<String>, json: bool) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let database = VectorDatabase::from_config(&config);
    let database = database.handle().await?;

    if let Some(statement) = statement {
        let results = database.execute_sql(&statement).await?;
        print_statement_results(&results, json)?;
        return Ok(());
    }

    println!("{}", style("🗄️  SQL console").bold().cyan());
    println!(
        "Database: {}",
        style(config.database_path().display()).dim()
    );
    println!(
        "Enter SQL statements, {} to list tables, {} to leave.",
        style(".tables").cyan(),
        style(".quit").cyan()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style("sql>").bold().blue());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read from stdin")?
        else {
            println!();
            break;
        };

        let statement = match line.trim() {
            "" => continue,
            ".quit" | ".exit" | "\\q" => break,
            ".tables" => TABLES_QUERY,
            other => other,
        };

        match database.execute_sql(statement).await {
            Ok(results) => print_statement_results(&results, json)?,
            Err(e) => print_error(&format!("{e:#}")),
        }
    }

    Ok(())
}

/// Show configuration, credential and database state
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default().unwrap_or_default();
    let credentials = CredentialStore::from_env();

    println!("📊 rag-chat Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Provider:");
    match config.provider_url() {
        Ok(url) => println!("   🌐 Endpoint: {url}"),
        Err(e) => println!("   ❌ Endpoint: invalid - {e}"),
    }
    println!("   💬 Chat model: {}", config.provider.chat_model);
    println!(
        "   🔢 Embedding model: {} ({} dimensions)",
        config.provider.embedding_model, config.provider.embedding_dimension
    );
    if credentials.is_configured() {
        println!("   ✅ API key: set from {API_KEY_ENV}");
    } else {
        println!("   ⚠️  API key: not set");
    }

    println!();
    println!("🗄️  Vector Database:");
    let path = config.database_path();
    println!("   📁 Path: {}", path.display());
    if path.exists() {
        let database = VectorDatabase::from_config(&config);
        match database.handle().await {
            Ok(handle) => {
                println!(
                    "   ✅ Opened ({} dimensions, {} distance)",
                    handle.dimension(),
                    handle.metric()
                );
                match handle.count_passages().await {
                    Ok(count) => println!("   📄 Stored passages: {count}"),
                    Err(e) => println!("   ❌ Failed to count passages: {e:#}"),
                }
            }
            Err(e) => println!("   ❌ Failed to open: {e:#}"),
        }
    } else {
        println!("   📭 Not created yet; it is created on first use");
    }

    println!();
    println!("🔍 Retrieval:");
    println!(
        "   💬 Chat context passages: {}",
        config.retrieval.chat_context_limit
    );
    println!("   📋 Search results: {}", config.retrieval.search_limit);

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'rag-chat ingest --text <text>' to store knowledge");
    println!("   • Use 'rag-chat chat' to start a conversation");
    println!("   • Use 'rag-chat sql' to inspect the database");

    Ok(())
}

fn spinner(message: &'static str) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn prompt_for_key(credentials: &CredentialStore) -> Result<()> {
    let value = dialoguer::Password::new()
        .with_prompt("API key")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;

    if credentials.set(value) {
        println!("{}", style("✓ API key set for this session.").green());
    } else {
        println!("{}", style("No key entered; keeping the previous one.").dim());
    }
    Ok(())
}

fn print_repl_help() {
    println!("  {}           clear the conversation", style("/reset").cyan());
    println!("  {}             enter an API key", style("/key").cyan());
    println!("  {} list stored passages close to a query", style("/search <query>").cyan());
    println!("  {}            leave the chat", style("/quit").cyan());
}

fn print_assistant(message: &ConversationMessage) {
    if message.is_error() {
        println!("{}", style(&message.text).red());
    } else {
        println!("{}", render_markdown(&message.text));
    }
    println!();
}

fn print_error(message: &str) {
    println!("{} {message}", style("Error:").red());
}

fn print_matches(matches: &[PassageMatch]) {
    if matches.is_empty() {
        println!("No matching passages.");
        return;
    }

    for (rank, hit) in matches.iter().enumerate() {
        println!(
            "{}. {} {}",
            rank + 1,
            style(format!("#{}", hit.id)).cyan(),
            style(format!("(distance {:.4})", hit.distance)).dim()
        );
        println!("   {}", preview(&hit.content));
    }
}

/// Single-line excerpt of a passage
pub(crate) fn preview(content: &str) -> String {
    let flattened = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= PREVIEW_CHARS {
        return flattened;
    }
    let mut excerpt: String = flattened.chars().take(PREVIEW_CHARS).collect();
    excerpt.push('…');
    excerpt
}

fn print_statement_results(results: &[StatementResult], json: bool) -> Result<()> {
    for result in results {
        if json {
            let rendered = serde_json::to_string_pretty(&statement_json(result))
                .context("Failed to serialize result rows")?;
            println!("{rendered}");
        } else {
            println!("{}", format_statement_result(result));
        }
    }
    Ok(())
}

/// JSON view of one statement: its rows as objects, or the affected-row count when it
/// returns no columns
pub(crate) fn statement_json(result: &StatementResult) -> serde_json::Value {
    if result.columns.is_empty() {
        return serde_json::json!({ "rows_affected": result.rows_affected });
    }
    serde_json::Value::from(
        result
            .row_maps()
            .into_iter()
            .map(serde_json::Value::Object)
            .collect::<Vec<_>>(),
    )
}

/// Plain-text table of one statement's result
pub(crate) fn format_statement_result(result: &StatementResult) -> String {
    if result.columns.is_empty() {
        return format!("{} row(s) affected", result.rows_affected);
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();

    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 3);
    lines.push(format_row(result.columns.iter().map(String::as_str), &widths));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &cells {
        lines.push(format_row(row.iter().map(String::as_str), &widths));
    }
    lines.push(format!("({} row{})", cells.len(), if cells.len() == 1 { "" } else { "s" }));
    lines.join("\n")
}

fn format_row<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(value, width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}
