//! Chat command - interactive REPL mode.

use a700_session::ConversationStore;
use anyhow::{Context as _, Result};
use clap::Args;

use super::Context;
use super::repl::Repl;
use crate::client;

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Start with an empty conversation
    #[arg(short, long)]
    pub new: bool,
}

/// Run the chat command (REPL).
pub async fn run(args: ChatArgs, ctx: &Context) -> Result<()> {
    let conn = client::connect(&ctx.config).await?;

    let mut conversation = ConversationStore::open(&ctx.config.data_dir, &conn.agent_id);
    if args.new {
        conversation
            .clear()
            .context("Failed to clear conversation history")?;
    }

    let mut repl = Repl::new(ctx.clone(), conn, conversation)?;
    repl.run().await
}
