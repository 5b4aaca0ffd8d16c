//! Agent700 command-line client.
//!
//! Main entry point for the a700 CLI.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use console::Style;

mod client;
mod commands;
mod render;

use commands::{ask, auth, chat, history};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Agent700 - chat with your agents from the terminal
#[derive(Parser)]
#[command(name = "a700")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use the streaming transport (falls back to HTTP if it cannot connect)
    #[arg(long, global = true)]
    pub streaming: bool,

    /// API base URL (default: https://api.agent700.ai)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Agent UUID to talk to
    #[arg(long, global = true, value_name = "UUID")]
    pub agent: Option<String>,

    /// Response timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a one-shot question
    Ask(ask::AskArgs),

    /// Enter interactive chat mode (REPL)
    Chat(chat::ChatArgs),

    /// Authentication management
    Auth(auth::AuthArgs),

    /// Local conversation history
    History(history::HistoryArgs),
}

impl Cli {
    fn overrides(&self) -> a700_config::Overrides {
        a700_config::Overrides {
            api_base_url: self.api_url.clone(),
            agent_uuid: self.agent.clone(),
            streaming: self.streaming.then_some(true),
            timeout: self.timeout,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "a700=debug,a700_client=debug,a700_config=debug,a700_session=debug,info"
    } else {
        "a700=info,a700_client=warn,a700_config=warn,a700_session=warn,warn"
    };

    let log_dir = a700_config::log_dir().unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "a700.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(cli.verbose)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "a700=trace,a700_client=debug,a700_config=debug,a700_session=debug,info",
                )),
        )
        .init();

    let loaded = a700_config::load_config(&a700_config::LoadOptions {
        overrides: cli.overrides(),
        ..Default::default()
    })
    .context("Failed to load configuration")?;

    let yellow = Style::new().yellow();
    for warning in &loaded.warnings {
        eprintln!("{} {}", yellow.apply_to("Warning:"), warning);
    }

    let ctx = commands::Context {
        config: loaded.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Chat(args) => chat::run(args, &ctx).await,
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::History(args) => history::run(args, &ctx).await,
    }
}
