//! # Gateway Core
//!
//! Shared types and traits for the completion gateway.
//!
//! This crate provides:
//! - Conversation types (`Role`, `Message`) and the validated `UserId`
//! - The `CompletionService` capability the gateway mediates calls to
//! - The `Summarizer` seam used by conversation compaction

pub mod traits;
pub mod types;

pub use traits::{CompletionService, Summarizer};
pub use types::{Message, Role, UserId};
