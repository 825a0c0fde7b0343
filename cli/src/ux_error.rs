use colored::Colorize;
use errors::GatewayError;

#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl From<&GatewayError> for UxError {
    fn from(err: &GatewayError) -> Self {
        let base = UxError::new(err.to_string());
        match err {
            GatewayError::RateLimited { retry_after_secs } => base
                .why("Too many requests for this user in the last minute")
                .fix(format!("Wait {retry_after_secs}s before sending again"))
                .fix("Raise GW_MAX_REQUESTS_PER_MINUTE"),
            GatewayError::InputTooLarge { max, .. } => base
                .why(format!("Prompts are limited to about {max} tokens (4 characters each)"))
                .fix("Shorten the prompt or split it into several turns")
                .fix("Raise GW_MAX_INPUT_TOKENS"),
            GatewayError::ContextExceeded { .. } => base
                .why("The conversation no longer fits in the context window")
                .fix("Start a new session with a different --user")
                .fix("Lower GW_MAX_MEMORY_TOKENS so compaction runs earlier"),
            GatewayError::Unavailable { retry_after_secs } => base
                .why("Recent upstream calls kept failing, so calls are paused")
                .fix(format!("Retry in {retry_after_secs}s")),
            GatewayError::Upstream { .. } => base
                .why("The completion service rejected or did not answer the request")
                .fix("Check GENAI_API_KEY and GENAI_MODEL_NAME")
                .suggest("llm-gateway config"),
            GatewayError::EmptyResponse { .. } => base
                .why("The model returned no text")
                .fix("Rephrase the prompt"),
            GatewayError::SessionQuotaExceeded { .. } => base
                .why("This session has used its token budget")
                .fix("Start a new session with a different --user")
                .fix("Raise GW_MAX_SESSION_TOKENS"),
            GatewayError::Configuration { .. } => base
                .fix("Check GW_* and GENAI_* environment variables")
                .suggest("llm-gateway config"),
            GatewayError::InvalidUserId { .. } => {
                base.fix("Pass a non-empty --user of at most 128 characters")
            }
        }
    }
}
