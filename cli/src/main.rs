use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;
pub mod ux_error;

use commands::{Cli, Commands};

/// `RUST_LOG` wins; otherwise `LOG_LEVEL`, otherwise `info`.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat(args) => commands::chat::run(&cli.global, args).await,
        Commands::Repl(args) => commands::repl::run(&cli.global, args).await,
        Commands::Config(args) => commands::settings::run(&cli.global, args)
    }
}
