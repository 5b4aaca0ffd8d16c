//! REPL (Read-Eval-Print Loop) implementation for interactive chat.

use a700_client::{ExchangeError, STREAMING_AVAILABLE, TransportSelector};
use a700_session::{ConversationStore, Speaker};
use anyhow::Result;
use console::{Style, style};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

use super::{Context, send_message};
use crate::client::Connection;
use crate::render::{self, ConsoleObserver};

/// Entries shown by `/history`.
const HISTORY_PREVIEW: usize = 10;

/// REPL state and configuration.
pub struct Repl {
    ctx: Context,
    conn: Connection,
    conversation: ConversationStore,
    selector: TransportSelector,
    streaming: bool,
    editor: Editor<(), DefaultHistory>,
}

impl Repl {
    /// Create a new REPL instance.
    pub fn new(ctx: Context, conn: Connection, conversation: ConversationStore) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::with_config(config)?;
        let streaming = ctx.config.streaming;
        let selector = ctx.selector(&conn, streaming);

        Ok(Self {
            ctx,
            conn,
            conversation,
            selector,
            streaming,
            editor,
        })
    }

    /// Run the REPL loop.
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            let prompt = self.format_prompt();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    if let Some(command) = SlashCommand::parse(line) {
                        match self.handle_slash_command(command) {
                            Ok(ControlFlow::Continue) => continue,
                            Ok(ControlFlow::Exit) => break,
                            Err(e) => {
                                render::print_error(&format!("Command error: {}", e));
                                continue;
                            }
                        }
                    }

                    self.send(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!();
                    self.print_dim("(Interrupted - type /quit to exit)");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => {
                    render::print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        self.print_dim("Goodbye!");
        Ok(())
    }

    /// Send a message and print the reply. Failures are reported, not fatal.
    async fn send(&mut self, message: &str) {
        let observer = ConsoleObserver::new(false);
        let result = send_message(
            &self.ctx,
            &mut self.conn,
            &mut self.selector,
            &mut self.conversation,
            message,
            &observer,
        )
        .await;

        match result {
            Ok(reply) => {
                render::print_reply(&reply, &observer, false);
                println!();
            }
            Err(ExchangeError::Cancelled) => {
                println!();
                self.print_dim("(Cancelled)");
            }
            Err(ExchangeError::Auth) => {
                render::print_error(&ExchangeError::Auth.to_string());
                self.print_dim("Run 'a700 auth login' to sign in again.");
            }
            Err(e) => render::print_error(&e.to_string()),
        }
    }

    fn handle_slash_command(&mut self, command: SlashCommand) -> Result<ControlFlow> {
        match command {
            SlashCommand::Quit => return Ok(ControlFlow::Exit),
            SlashCommand::Help => self.print_help(),
            SlashCommand::Clear => {
                self.conversation.clear()?;
                self.print_dim("Conversation history cleared");
            }
            SlashCommand::History => self.print_history(),
            SlashCommand::Stream => self.toggle_streaming(),
            SlashCommand::Unknown(cmd) => {
                render::print_error(&format!("Unknown command: /{}", cmd));
                self.print_dim("Type /help for available commands");
            }
        }
        Ok(ControlFlow::Continue)
    }

    fn toggle_streaming(&mut self) {
        if !STREAMING_AVAILABLE {
            self.print_dim("Streaming is not available in this build");
            return;
        }
        self.streaming = !self.streaming;
        self.selector = self.ctx.selector(&self.conn, self.streaming);
        let mode = if self.streaming { "streaming" } else { "HTTP" };
        self.print_dim(&format!("Switched to {} mode", mode));
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!();
        println!(
            "{} {}",
            style("Agent700 Chat").bold().cyan(),
            dim.apply_to(format!("- {}", self.conn.agent.agent_name))
        );
        println!("{}", dim.apply_to("─".repeat(40)));
        println!(
            "{}",
            dim.apply_to("Type your message and press Enter to chat.")
        );
        println!(
            "{}",
            dim.apply_to("Use /help for commands, Ctrl+D to exit.")
        );
        if !self.conversation.is_empty() {
            let summary = self.conversation.summary();
            println!(
                "{}",
                dim.apply_to(format!(
                    "Continuing conversation ({} messages)",
                    summary.messages
                ))
            );
        }
        println!();
    }

    fn print_help(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Available Commands").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {}  - Exit the REPL", style("/quit, /exit, /q").cyan());
        println!("  {}  - Show this help", style("/help").cyan());
        println!("  {}  - Clear conversation history", style("/clear").cyan());
        println!("  {}  - Show recent messages", style("/history").cyan());
        println!("  {}  - Toggle streaming mode", style("/stream").cyan());
        println!();
        println!("{}", dim.apply_to("Keyboard shortcuts:"));
        println!("  {} - Cancel the current reply", dim.apply_to("Ctrl+C"));
        println!("  {} - Exit the REPL", dim.apply_to("Ctrl+D"));
        println!();
    }

    fn print_history(&self) {
        let entries = self.conversation.entries();
        if entries.is_empty() {
            self.print_dim("No messages yet");
            return;
        }

        let dim = Style::new().dim();
        let start = entries.len().saturating_sub(HISTORY_PREVIEW);
        println!();
        for entry in &entries[start..] {
            let who = match entry.role {
                Speaker::User => style("You").green().bold(),
                Speaker::Agent => style("Agent").cyan().bold(),
            };
            println!(
                "{} {}",
                who,
                dim.apply_to(entry.timestamp.format("%H:%M:%S").to_string())
            );
            println!("{}", entry.content);
            println!();
        }

        let summary = self.conversation.summary();
        self.print_dim(&format!(
            "{} messages, {} characters",
            summary.messages, summary.characters
        ));
    }

    fn format_prompt(&self) -> String {
        format!("{} ", style("a700>").cyan().bold())
    }

    fn print_dim(&self, msg: &str) {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(msg));
    }
}

/// Control flow for the REPL.
pub enum ControlFlow {
    Continue,
    Exit,
}

/// A line starting with `/`.
#[derive(Debug, PartialEq, Eq)]
enum SlashCommand {
    Quit,
    Help,
    Clear,
    History,
    Stream,
    Unknown(String),
}

impl SlashCommand {
    fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('/')?;
        let cmd = rest.split_whitespace().next().unwrap_or("");
        Some(match cmd.to_lowercase().as_str() {
            "quit" | "exit" | "q" => SlashCommand::Quit,
            "help" | "h" | "?" => SlashCommand::Help,
            "clear" => SlashCommand::Clear,
            "history" => SlashCommand::History,
            "stream" => SlashCommand::Stream,
            _ => SlashCommand::Unknown(cmd.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(SlashCommand::parse("/quit"), Some(SlashCommand::Quit));
        assert_eq!(SlashCommand::parse("/exit"), Some(SlashCommand::Quit));
        assert_eq!(SlashCommand::parse("/Q"), Some(SlashCommand::Quit));
        assert_eq!(SlashCommand::parse("/clear"), Some(SlashCommand::Clear));
        assert_eq!(SlashCommand::parse("/history"), Some(SlashCommand::History));
        assert_eq!(SlashCommand::parse("/stream now"), Some(SlashCommand::Stream));
        assert_eq!(SlashCommand::parse("/help"), Some(SlashCommand::Help));
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(SlashCommand::parse("hello /quit"), None);
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            SlashCommand::parse("/frobnicate"),
            Some(SlashCommand::Unknown("frobnicate".to_string()))
        );
        assert_eq!(
            SlashCommand::parse("/"),
            Some(SlashCommand::Unknown(String::new()))
        );
    }
}
