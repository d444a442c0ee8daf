use clap::{Args, Parser, Subcommand};
use console::style;
use rag_chat::IngestSource;
use rag_chat::commands::{ask, chat, ingest, search, show_status, sql};
use rag_chat::config::{run_interactive_config, show_config};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rag-chat")]
#[command(about = "Chat with a hosted model, grounded in passages from a local vector database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the provider, retrieval limits and database
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start an interactive conversation
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// The question to ask
        question: String,
    },
    /// Embed and store a passage
    Ingest(IngestArgs),
    /// List the stored passages closest to a query
    Search {
        /// Text to search for
        query: String,
        /// Number of passages to list
        #[arg(long, short = 'n')]
        limit: Option<u32>,
    },
    /// Run SQL against the vector database, or open the SQL console
    Sql {
        /// Statements to run; opens the console when omitted
        statement: Option<String>,
        /// Print result rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration and database status
    Status,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct IngestArgs {
    /// Text to store
    #[arg(long)]
    text: Option<String>,
    /// Text file whose full contents are stored
    #[arg(long)]
    file: Option<PathBuf>,
}

impl IngestArgs {
    fn into_source(self) -> Option<IngestSource> {
        match (self.text, self.file) {
            (Some(text), _) => Some(IngestSource::Text(text)),
            (None, Some(file)) => Some(IngestSource::File(file)),
            (None, None) => None,
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Chat => {
            chat().await?;
        }
        Commands::Ask { question } => {
            ask(&question).await?;
        }
        Commands::Ingest(args) => {
            let source = args
                .into_source()
                .ok_or_else(|| anyhow::anyhow!("Either --text or --file is required"))?;
            ingest(source).await?;
        }
        Commands::Search { query, limit } => {
            search(&query, limit).await?;
        }
        Commands::Sql { statement, json } => {
            sql(statement, json).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
