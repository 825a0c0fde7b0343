pub mod chat;
pub mod repl;
pub mod settings;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::GatewayConfig;
use gateway::Gateway;
use gateway::llm::MockCompletionService;
use gw_core::CompletionService;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "llm-gateway",
    author,
    version,
    about = "Rate-limited, cached, circuit-broken front end for an LLM completion API",
    long_about = "Every prompt passes a per-user rate limit, a response cache, conversation \
                  memory with compaction, and a circuit breaker with retry and model \
                  fallback.\n\nSettings come from defaults, an optional TOML file and \
                  GW_* / GENAI_* environment variables, in that order."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    #[arg(long, global = true, env = "GW_CONFIG", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Answer from a local mock instead of the upstream API"
    )]
    pub mock: bool
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Send one prompt and print the answer")]
    Chat(chat::ChatArgs),

    #[command(about = "Interactive conversation with memory")]
    Repl(repl::ReplArgs),

    #[command(about = "Show the effective configuration")]
    Config(settings::ConfigArgs)
}

pub fn load_config(global: &GlobalArgs) -> Result<GatewayConfig> {
    config::load(global.config.as_deref()).context("Failed to load gateway configuration")
}

pub fn build_gateway(global: &GlobalArgs) -> Result<Gateway> {
    let config = load_config(global)?;
    let service = completion_service(global, &config)?;
    Ok(Gateway::new(config, service)?)
}

#[cfg(feature = "gemini")]
fn completion_service(
    global: &GlobalArgs,
    config: &GatewayConfig
) -> Result<Arc<dyn CompletionService>> {
    if global.mock {
        return Ok(Arc::new(MockCompletionService::new()));
    }
    let service = gateway::llm::GeminiCompletionService::from_config(&config.provider)?;
    Ok(Arc::new(service))
}

#[cfg(not(feature = "gemini"))]
fn completion_service(
    _global: &GlobalArgs,
    _config: &GatewayConfig
) -> Result<Arc<dyn CompletionService>> {
    Ok(Arc::new(MockCompletionService::new()))
}
