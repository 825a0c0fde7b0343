//! Core traits for the completion gateway

use async_trait::async_trait;
use errors::{CompletionError, GatewayError};

use crate::types::Message;

/// Remote text-completion capability the gateway mediates calls to.
///
/// Implementations classify failures so the retry policy can tell a
/// transient rate limit apart from everything else.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Completes `prompt` with `model`, producing at most `max_output_tokens`.
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        max_output_tokens: usize
    ) -> Result<String, CompletionError>;
}

/// Produces a summary of older conversation turns during compaction.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, older: &[Message]) -> Result<String, GatewayError>;
}
