//! Ask command - one-shot question to the agent.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use a700_session::ConversationStore;
use anyhow::{Context as _, Result, anyhow};
use clap::Args;
use console::Style;

use super::Context;
use crate::client;
use crate::render::{self, ConsoleObserver};

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question or prompt to send (read from stdin when omitted)
    pub prompt: Option<String>,

    /// Read the prompt from a file
    #[arg(short, long, value_name = "FILE", conflicts_with = "prompt")]
    pub file: Option<PathBuf>,

    /// Also write the reply to a file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print only the reply
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let prompt = read_prompt(&args)?;
    let mut conn = client::connect(&ctx.config).await?;
    let dim = Style::new().dim();

    if ctx.verbose && !args.quiet {
        eprintln!(
            "{}",
            dim.apply_to(format!(
                "Agent: {} ({})",
                conn.agent.agent_name, conn.agent.model
            ))
        );
    }

    let mut conversation = ConversationStore::open(&ctx.config.data_dir, &conn.agent_id);
    let mut selector = ctx.selector(&conn, ctx.config.streaming);
    let observer = ConsoleObserver::new(args.quiet);

    let reply = super::send_message(
        ctx,
        &mut conn,
        &mut selector,
        &mut conversation,
        &prompt,
        &observer,
    )
    .await?;

    render::print_reply(&reply, &observer, args.quiet);

    if let Some(path) = &args.output {
        std::fs::write(path, &reply.content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !args.quiet {
            eprintln!("{}", dim.apply_to(format!("Saved to {}", path.display())));
        }
    }

    Ok(())
}

/// Prompt from the argument, the file, or piped stdin, in that order.
fn read_prompt(args: &AskArgs) -> Result<String> {
    let prompt = if let Some(prompt) = &args.prompt {
        prompt.clone()
    } else if let Some(path) = &args.file {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    } else if !std::io::stdin().is_terminal() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read stdin")?;
        input
    } else {
        return Err(anyhow!(
            "No prompt given. Pass it as an argument, with --file, or on stdin."
        ));
    };

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(anyhow!("Prompt is empty"));
    }
    Ok(prompt.to_string())
}
