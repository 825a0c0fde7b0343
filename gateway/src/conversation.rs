//! # Conversation Memory
//!
//! Per-session message log, transcript rendering and size-triggered
//! compaction.
//!
//! Compaction runs in three steps so the session lock is never held while
//! the summarizer talks to the upstream service:
//! 1. [`plan_compaction`] under the lock copies the older messages out
//! 2. the summarizer runs unlocked
//! 3. [`apply_compaction`] under the lock swaps the older messages for the
//!    summary, provided they are still the head of the history

use crate::session::UserSession;
use crate::tokens::estimate_tokens;
use errors::GatewayError;
use gw_core::{Message, Role, Summarizer};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Appended after the transcript so the model answers as the assistant.
pub const ASSISTANT_MARKER: &str = "assistant:";

/// Messages kept verbatim at the tail of the history after compaction.
pub const RECENT_MESSAGES_KEPT: usize = 2;

const SUMMARY_INSTRUCTION: &str = "Summarize the following conversation in a few sentences. \
                                   Keep every fact, name, number and decision needed to \
                                   continue it.";

pub fn append(session: &mut UserSession, role: Role, content: impl Into<String>) {
    session.history.push(Message::new(role, content));
}

/// `role: content` lines without the trailing assistant marker.
pub fn render_transcript(history: &[Message]) -> String {
    let mut rendered = String::new();
    for message in history {
        rendered.push_str(&format!("{}: {}\n", message.role, message.content));
    }
    rendered
}

/// The prompt actually sent upstream for the next assistant turn.
pub fn render_prompt(history: &[Message]) -> String {
    let mut rendered = render_transcript(history);
    rendered.push_str(ASSISTANT_MARKER);
    rendered
}

pub fn prompt_tokens(history: &[Message]) -> usize {
    estimate_tokens(&render_prompt(history))
}

/// Prompt sent to the summarizer for the given older messages.
pub fn summarization_prompt(older: &[Message]) -> String {
    format!("{SUMMARY_INSTRUCTION}\n\n{}", render_transcript(older))
}

/// Older messages selected for summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionPlan {
    pub older: Vec<Message>,
    pub tokens_before: usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    NotNeeded,
    Compacted {
        tokens_before: usize,
        tokens_after: usize
    },
    /// The history changed underneath the summarizer; nothing was replaced.
    Superseded
}

/// Selects everything but the last two messages when the rendered prompt is
/// over `max_memory_tokens`. Returns `None` when under the limit or when
/// there is nothing older than the recent turns.
pub fn plan_compaction(session: &UserSession, max_memory_tokens: usize) -> Option<CompactionPlan> {
    let tokens_before = prompt_tokens(&session.history);
    if tokens_before <= max_memory_tokens {
        return None;
    }

    let split = session.history.len().saturating_sub(RECENT_MESSAGES_KEPT);
    if split == 0 {
        debug!(
            tokens = tokens_before,
            "Memory over limit but nothing older than the recent turns to compact"
        );
        return None;
    }

    Some(CompactionPlan {
        older: session.history[..split].to_vec(),
        tokens_before
    })
}

/// Replaces the planned older messages with one system summary message.
/// Messages appended after planning are kept in order behind the summary.
pub fn apply_compaction(session: &mut UserSession, plan: &CompactionPlan, summary: String) -> bool {
    let prefix_len = plan.older.len();
    if session.history.len() < prefix_len || session.history[..prefix_len] != plan.older[..] {
        warn!("Conversation changed during summarization, compaction discarded");
        return false;
    }

    session
        .history
        .splice(..prefix_len, std::iter::once(Message::system(summary)));
    session.compactions += 1;
    true
}

/// Compacts `session` if its rendered prompt exceeds `max_memory_tokens`.
pub async fn compact_if_needed(
    session: &Mutex<UserSession>,
    max_memory_tokens: usize,
    summarizer: &dyn Summarizer
) -> Result<CompactionOutcome, GatewayError> {
    let plan = {
        let guard = session.lock().await;
        plan_compaction(&guard, max_memory_tokens)
    };
    let Some(plan) = plan else {
        return Ok(CompactionOutcome::NotNeeded);
    };

    info!(
        tokens = plan.tokens_before,
        max_memory_tokens,
        older_messages = plan.older.len(),
        "Memory limit exceeded, compacting conversation"
    );
    let summary = summarizer.summarize(&plan.older).await?;

    let mut guard = session.lock().await;
    if !apply_compaction(&mut guard, &plan, summary) {
        return Ok(CompactionOutcome::Superseded);
    }

    let tokens_after = prompt_tokens(&guard.history);
    info!(
        tokens_before = plan.tokens_before,
        tokens_after, "Conversation compacted"
    );
    Ok(CompactionOutcome::Compacted {
        tokens_before: plan.tokens_before,
        tokens_after
    })
}

/// Removes the most recent user message with exactly `content`. Returns
/// `false` if it is no longer in the history (e.g. already summarized).
pub fn rollback_user_message(session: &mut UserSession, content: &str) -> bool {
    let position = session
        .history
        .iter()
        .rposition(|m| m.role == Role::User && m.content == content);

    match position {
        Some(index) => {
            session.history.remove(index);
            true
        }
        None => false
    }
}
