//! papertalk: terminal front end for the research paper assistant
//!
//! Upload a PDF and ask questions about it, or run open research queries whose
//! answers are mined for arXiv citations. Answers stream to stdout as they
//! arrive; logs go to stderr.
//!
//! # Subcommands
//! - `chat [--upload <file>]`: interactive session (`:upload`, `:clear`, `:quit`)
//! - `ask --upload <file> <query>`: upload then ask one question
//! - `research <query> [--json]`: research query with citation listing

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use papertalk_core::{
    ChatError, Citation, Conversation, Message, PapertalkConfig, QueryMode, TurnObserver,
    TurnOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

const THINKING: &str = "AI is thinking...";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "papertalk",
    version,
    about = "Chat with an uploaded paper or search research papers"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "papertalk.toml")]
    config: PathBuf,

    /// Backend base URL (overrides service.base_url)
    #[arg(long, env = "PAPERTALK_SERVER")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive chat about an uploaded document
    Chat {
        /// Upload this document before the first question
        #[arg(long)]
        upload: Option<PathBuf>,
    },

    /// Upload a document and ask a single question about it
    Ask {
        /// Document to upload
        #[arg(long)]
        upload: PathBuf,

        /// Question to ask
        query: String,
    },

    /// Research query without a document; lists cited papers
    Research {
        /// Topic or question
        query: String,

        /// Print the answer and citations as one JSON object
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Terminal rendering
// ============================================================================

/// Streams a turn to the terminal as it progresses.
struct TerminalObserver;

impl TurnObserver for TerminalObserver {
    fn on_turn_started(&mut self, _message_id: &str) {
        eprint!("{THINKING}");
    }

    fn on_first_response(&mut self, _message_id: &str, latency: Duration) {
        eprint!("\r{}\r", " ".repeat(THINKING.len()));
        tracing::debug!(latency_ms = latency.as_millis() as u64, "first chunk");
    }

    fn on_chunk(&mut self, _message_id: &str, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn on_completed(&mut self, message: &Message) {
        println!();
        if let Some(citations) = message.citations() {
            println!("\nRelated Papers ({})", citations.len());
            for citation in citations {
                println!("{}", format_citation(citation));
            }
        }
    }

    fn on_failed(&mut self, _message_id: &str, _error: &ChatError) {
        eprint!("\r{}\r", " ".repeat(THINKING.len()));
        println!("{}", papertalk_core::FAILURE_NOTICE);
    }
}

/// One citation as a short block: identifier, abstract link, PDF link.
pub fn format_citation(citation: &Citation) -> String {
    format!(
        "  [{}] {}\n      PDF: {}",
        citation.source_id, citation.source_url, citation.fetch_url
    )
}

// ============================================================================
// Interactive loop
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Upload(PathBuf),
    Clear,
    Quit,
    Help,
    Query(String),
    Empty,
    Unknown(String),
}

pub fn parse_repl_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix(':') else {
        return ReplCommand::Query(line.to_string());
    };

    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (rest, ""),
    };
    match cmd {
        "upload" if !arg.is_empty() => ReplCommand::Upload(PathBuf::from(arg)),
        "clear" => ReplCommand::Clear,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        "help" | "h" => ReplCommand::Help,
        _ => ReplCommand::Unknown(line.to_string()),
    }
}

fn print_help() {
    eprintln!(":upload <path>  upload a PDF and start a new session");
    eprintln!(":clear          clear the conversation and the session");
    eprintln!(":quit           exit");
    eprintln!("anything else is asked about the uploaded document");
}

async fn upload(conversation: &Conversation, path: &Path) -> bool {
    match conversation.upload_file(path).await {
        Ok(_) => {
            eprintln!("Uploaded {}, ask away.", path.display());
            true
        }
        Err(e) => {
            eprintln!("papertalk: upload of {} failed: {}", path.display(), e);
            false
        }
    }
}

async fn run_chat(mut conversation: Conversation, initial: Option<PathBuf>) -> anyhow::Result<()> {
    conversation.set_observer(Box::new(TerminalObserver));
    if let Some(path) = initial {
        upload(&conversation, &path).await;
    }

    eprintln!("Type a question, or :help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_repl_command(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::Clear => {
                conversation.clear();
                eprintln!("Conversation cleared. Upload a document to continue.");
            }
            ReplCommand::Upload(path) => {
                upload(&conversation, &path).await;
            }
            ReplCommand::Unknown(cmd) => eprintln!("Unknown command: {cmd}"),
            ReplCommand::Query(query) => {
                match conversation.submit(&query, QueryMode::Document).await {
                    Ok(_) => {}
                    Err(ChatError::NoActiveSession) => {
                        eprintln!("Please upload a PDF document first (:upload <path>).");
                    }
                    Err(e) => eprintln!("papertalk: {e}"),
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// One-shot commands
// ============================================================================

async fn run_ask(mut conversation: Conversation, path: PathBuf, query: String) -> anyhow::Result<bool> {
    conversation
        .upload_file(&path)
        .await
        .with_context(|| format!("upload of {} failed", path.display()))?;
    conversation.set_observer(Box::new(TerminalObserver));
    let outcome = conversation.submit(&query, QueryMode::Document).await?;
    Ok(outcome.is_complete())
}

async fn run_research(mut conversation: Conversation, query: String, json: bool) -> anyhow::Result<bool> {
    if !json {
        conversation.set_observer(Box::new(TerminalObserver));
        let outcome = conversation.submit(&query, QueryMode::Research).await?;
        return Ok(outcome.is_complete());
    }

    let outcome = conversation.submit(&query, QueryMode::Research).await?;
    println!("{}", serde_json::to_string_pretty(&research_json(&conversation, &outcome))?);
    Ok(outcome.is_complete())
}

/// `{ "state", "answer", "citations" }` for the finished research turn.
fn research_json(conversation: &Conversation, outcome: &TurnOutcome) -> serde_json::Value {
    let message = conversation.log().get(&outcome.message_id);
    serde_json::json!({
        "state": outcome.state,
        "answer": message.map(|m| m.content.as_str()).unwrap_or(""),
        "citations": message.and_then(|m| m.citations()).unwrap_or(&[]),
    })
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match PapertalkConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", cli.config.display(), e);
            std::process::exit(1);
        }
    };
    if let Some(server) = cli.server {
        config = config.with_base_url(server);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    tracing::debug!(base_url = %config.base_url(), "Configuration loaded");
    let conversation = Conversation::new(config)?;

    let succeeded = match cli.command {
        Commands::Chat { upload } => {
            run_chat(conversation, upload).await?;
            true
        }
        Commands::Ask { upload, query } => run_ask(conversation, upload, query).await?,
        Commands::Research { query, json } => run_research(conversation, query, json).await?,
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
