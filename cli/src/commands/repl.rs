use anyhow::Result;
use clap::Args;
use colored::Colorize;
use gateway::Gateway;
use gw_core::UserId;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{GlobalArgs, build_gateway};
use crate::output;
use crate::ux_error::UxError;

#[derive(Args)]
pub struct ReplArgs {
    #[arg(long, env = "GW_USER", default_value = "local", help = "User the session belongs to")]
    pub user: String
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Prompt(&'a str),
    Stats,
    History,
    Help,
    Quit,
    Skip
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Skip,
        "/quit" | "/exit" => Input::Quit,
        "/stats" => Input::Stats,
        "/history" => Input::History,
        "/help" => Input::Help,
        prompt => Input::Prompt(prompt)
    }
}

pub async fn run(global: &GlobalArgs, args: ReplArgs) -> Result<()> {
    let user: UserId = args.user.parse()?;
    let gateway = build_gateway(global)?;

    output::header("llm-gateway");
    output::hint("/stats, /history, /help, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you>".green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Skip => {}
            Input::Quit => break,
            Input::Help => output::hint("Type a prompt, or /stats, /history, /quit"),
            Input::Stats => print_stats(&gateway, &user).await,
            Input::History => print_history(&gateway, &user).await,
            Input::Prompt(prompt) => match gateway.chat(&user, prompt).await {
                Ok(text) => output::assistant(&text),
                Err(err) => UxError::from(&err).display()
            }
        }
    }

    Ok(())
}

async fn print_stats(gateway: &Gateway, user: &UserId) {
    output::subheader("Session");
    match gateway.session_snapshot(user).await {
        Some(snapshot) => {
            let max = gateway.config().accounting.max_session_tokens;
            output::field("tokens", &format!("{} / {max}", snapshot.token_usage));
            output::field("messages", &snapshot.history.len().to_string());
            output::field("compactions", &snapshot.compactions.to_string());
            output::field("requests in window", &snapshot.requests_in_window.to_string());
        }
        None => output::field("tokens", "0")
    }

    output::subheader("Gateway");
    let cache = gateway.cache_stats();
    output::field("circuit", &gateway.circuit_phase().to_string());
    output::field(
        "cache",
        &format!("{} entries, {} hits, {} misses", cache.entries, cache.hits, cache.misses)
    );
}

async fn print_history(gateway: &Gateway, user: &UserId) {
    let Some(snapshot) = gateway.session_snapshot(user).await else {
        output::info("No conversation yet");
        return;
    };
    for message in &snapshot.history {
        output::field(&message.role.to_string(), &message.content);
    }
}
