use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chatwire_core::{
    config::Config,
    decoder::ChunkDecoder,
    model::{Role, Turn},
    reducer::{ReducerConfig, TurnObserver, TurnReducer},
    session::{ChatSession, TurnOutcome},
    transcript::TranscriptStore,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Streaming chat client", long_about = None)]
struct Cli {
    /// JSON or TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Chat endpoint; overrides the config file
    #[arg(long, global = true)]
    url: Option<String>,
    /// Do not print tool start/end notices
    #[arg(long, global = true)]
    hide_tools: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and stream the reply
    Send {
        #[arg(short, long, help = "Message from the user")]
        message: String,
    },
    /// Interactive chat; /reset, /history and /quit are understood
    Repl,
    /// Decode a captured event-stream body without touching the network
    Replay {
        file: PathBuf,
        #[arg(long, default_value_t = 64, help = "Bytes per simulated fragment")]
        chunk_size: usize,
    },
}

/// Prints the assistant text as it grows; notices go to stderr.
#[derive(Default)]
struct Terminal {
    shown: String,
}

impl TurnObserver for Terminal {
    fn render(&mut self, text: &str) {
        match text.strip_prefix(self.shown.as_str()) {
            Some(rest) => print!("{rest}"),
            None => print!("\n{text}"),
        }
        io::stdout().flush().ok();
        self.shown = text.to_string();
    }

    fn notify(&mut self, notice: &str) {
        eprintln!("\n[tool] {notice}");
    }

    fn committed(&mut self, _turn: &Turn) {
        println!();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = match (&cli.config, &cli.url) {
        (Some(path), _) => Config::from_path(path).with_context(|| format!("loading {}", path.display()))?,
        (None, Some(url)) => Config::for_url(url.clone()),
        (None, None) => anyhow::bail!("either --url or --config is required"),
    };
    if let Some(url) = &cli.url {
        cfg.endpoint.url = url.clone();
    }
    if cli.hide_tools {
        cfg.display.show_tool_notices = false;
    }
    Ok(cfg)
}

async fn send_one(session: &mut ChatSession, message: &str) -> anyhow::Result<()> {
    let mut term = Terminal::default();
    match session.send(message, &mut term).await? {
        TurnOutcome::Committed(_) => {}
        TurnOutcome::Failed { kind, reason } => {
            println!();
            tracing::warn!(%kind, %reason, "turn failed");
        }
    }
    Ok(())
}

async fn repl(session: &mut ChatSession) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let Some(line) = lines.next_line().await? else { break };
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/reset" => {
                session.reset();
                println!("(transcript cleared)");
            }
            "/history" => {
                for turn in session.transcript().snapshot() {
                    let who = match turn.role {
                        Role::Human => "you",
                        Role::Assistant => "assistant",
                        Role::System => "system",
                    };
                    println!("{who}: {}", turn.content);
                }
            }
            message => send_one(session, message).await?,
        }
    }
    Ok(())
}

fn replay(file: &Path, chunk_size: usize, reducer_cfg: ReducerConfig) -> anyhow::Result<()> {
    let body = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let mut decoder = ChunkDecoder::new();
    let mut reducer = TurnReducer::new(reducer_cfg);
    let mut store = TranscriptStore::new();
    let mut term = Terminal::default();

    let mut events = Vec::new();
    for fragment in body.chunks(chunk_size.max(1)) {
        events.extend(decoder.push(fragment));
    }
    events.extend(decoder.finish());
    for event in events {
        if let Some(effect) = reducer.apply(event, &mut store) {
            effect.dispatch(&mut term);
        }
    }
    eprintln!("[{}; {} tool notices]", reducer.phase().as_str(), reducer.tool_notices().len());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Send { message } => {
            let cfg = load_config(&cli)?;
            let mut session = ChatSession::from_config(&cfg)?;
            send_one(&mut session, message).await?;
        }
        Commands::Repl => {
            let cfg = load_config(&cli)?;
            let mut session = ChatSession::from_config(&cfg)?;
            repl(&mut session).await?;
        }
        Commands::Replay { file, chunk_size } => {
            let display = match &cli.config {
                Some(path) => Config::from_path(path)?.display,
                None => Default::default(),
            };
            let mut reducer_cfg = ReducerConfig::from(&display);
            if cli.hide_tools {
                reducer_cfg.show_tool_notices = false;
            }
            replay(file, *chunk_size, reducer_cfg)?;
        }
    }

    Ok(())
}
