//! History command - local conversation log.

use a700_session::{ConversationStore, Speaker};
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::{Style, style};

use super::Context;

/// Arguments for the history command.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Show stored messages for the configured agent
    Show {
        /// Show only the last N messages
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Delete stored messages for the configured agent
    Clear,
}

/// Run the history command.
pub async fn run(args: HistoryArgs, ctx: &Context) -> Result<()> {
    let agent_id = ctx.config.require_agent()?;
    let mut conversation = ConversationStore::open(&ctx.config.data_dir, agent_id);

    match args.command {
        HistoryCommand::Show { limit } => {
            show(&conversation, limit);
            Ok(())
        }
        HistoryCommand::Clear => {
            conversation
                .clear()
                .context("Failed to clear conversation history")?;
            println!("Conversation history cleared.");
            Ok(())
        }
    }
}

fn show(conversation: &ConversationStore, limit: Option<usize>) {
    let dim = Style::new().dim();
    let entries = conversation.entries();
    if entries.is_empty() {
        println!("{}", dim.apply_to("No conversation history."));
        return;
    }

    let start = limit.map_or(0, |n| entries.len().saturating_sub(n));
    for entry in &entries[start..] {
        let who = match entry.role {
            Speaker::User => style("You").green().bold(),
            Speaker::Agent => style("Agent").cyan().bold(),
        };
        println!(
            "{} {}",
            who,
            dim.apply_to(entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
        );
        println!("{}", entry.content);
        println!();
    }

    let summary = conversation.summary();
    println!(
        "{}",
        dim.apply_to(format!(
            "{} messages ({} from you, {} from the agent), {} characters",
            summary.messages, summary.user_messages, summary.agent_messages, summary.characters
        ))
    );
}
