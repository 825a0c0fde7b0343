use anyhow::Result;
use clap::Args;
use config::GatewayConfig;

use super::{GlobalArgs, load_config};
use crate::output;

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub fn run(global: &GlobalArgs, args: ConfigArgs) -> Result<()> {
    let config = load_config(global)?;

    if args.json {
        println!("{}", render_json(&config)?);
        return Ok(());
    }

    output::header("Effective configuration");
    if let Some(path) = &global.config {
        output::info(&format!("file: {}", path.display()));
    }
    println!("{}", toml::to_string_pretty(&config)?);
    output::field("api_key", api_key_state(&config));
    Ok(())
}

fn api_key_state(config: &GatewayConfig) -> &'static str {
    if config.provider.api_key.is_some() {
        "set"
    } else {
        "not set"
    }
}

fn render_json(config: &GatewayConfig) -> Result<String> {
    let mut value = serde_json::to_value(config)?;
    value["provider"]["api_key"] = serde_json::Value::String(api_key_state(config).to_string());
    Ok(serde_json::to_string_pretty(&value)?)
}
