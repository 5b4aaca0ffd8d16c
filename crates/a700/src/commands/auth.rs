//! Auth command - authentication management.

use a700_session::SessionStore;
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use super::Context;
use crate::client;

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Log in with email and password
    Login,

    /// Show authentication status
    Status,

    /// Remove the stored session
    Logout,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login => cmd_login(ctx).await,
        AuthCommand::Status => cmd_status(ctx),
        AuthCommand::Logout => cmd_logout(ctx),
    }
}

async fn cmd_login(ctx: &Context) -> Result<()> {
    let base = client::base_client(&ctx.config)?;
    let store = SessionStore::new(&ctx.config.data_dir);

    let session = client::login(&ctx.config, &base, &store).await?;

    println!("Authentication successful!");
    if !session.cookies.is_empty() {
        println!("Refresh cookie stored; expired tokens renew automatically.");
    }
    if ctx.verbose {
        println!("Session file: {}", store.path().display());
    }
    Ok(())
}

fn cmd_status(ctx: &Context) -> Result<()> {
    let store = SessionStore::new(&ctx.config.data_dir);
    let session = store.load().context("Failed to read session")?;

    println!("Authentication Status");
    println!("---------------------");
    println!("API: {}", ctx.config.api_base_url);

    match session.access_token.as_deref() {
        Some(token) if !token.is_empty() => {
            println!("Session: authenticated");
            println!("  Token: {}", mask(token));
            println!(
                "  Refresh cookie: {}",
                if session.cookies.is_empty() {
                    "none"
                } else {
                    "stored"
                }
            );
            if let Some(saved_at) = session.saved_at {
                println!("  Saved: {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        _ => {
            println!("Session: not authenticated");
            println!("  Run 'a700 auth login' to sign in");
        }
    }

    match ctx.config.agent_uuid.as_deref() {
        Some(agent) => println!("Agent: {}", agent),
        None => println!("Agent: not set (AGENT_UUID or --agent)"),
    }

    Ok(())
}

fn cmd_logout(ctx: &Context) -> Result<()> {
    let store = SessionStore::new(&ctx.config.data_dir);
    if store.path().exists() {
        store.clear().context("Failed to remove session")?;
        println!("Session removed.");
    } else {
        println!("No stored session found.");
    }
    Ok(())
}

/// Show only the ends of a secret.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "****".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("abcdefghijkl"), "abcd...ijkl");
        assert_eq!(mask("short"), "****");
    }
}
