use anyhow::Result;
use clap::Args;
use gw_core::UserId;

use super::{GlobalArgs, build_gateway};
use crate::output;
use crate::ux_error::UxError;

#[derive(Args)]
pub struct ChatArgs {
    #[arg(help = "Prompt to send")]
    pub prompt: String,

    #[arg(long, env = "GW_USER", default_value = "local", help = "User the session belongs to")]
    pub user: String,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub async fn run(global: &GlobalArgs, args: ChatArgs) -> Result<()> {
    let user: UserId = args.user.parse()?;
    let gateway = build_gateway(global)?;

    match gateway.chat(&user, &args.prompt).await {
        Ok(text) => {
            if args.json {
                let out = serde_json::json!({
                    "user_id": user.as_str(),
                    "response": text
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                output::assistant(&text);
            }
            Ok(())
        }
        Err(err) => {
            if args.json {
                let out = serde_json::json!({
                    "user_id": user.as_str(),
                    "error": err.kind(),
                    "message": err.to_string()
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                UxError::from(&err).display();
            }
            // Already reported; anyhow would print it a second time.
            std::process::exit(1)
        }
    }
}
