//! # Completion Gateway
//!
//! Multi-user request gateway in front of a text-completion service.
//!
//! A chat turn passes, in order, through:
//! - a per-user sliding-window rate limit and session token budget
//! - an input size check
//! - a TTL response cache keyed on (model, prompt)
//! - conversation memory with size-triggered compaction
//! - a context ceiling
//! - a circuit breaker and a retry-then-fallback policy under a deadline
//!
//! See [`Gateway::chat`].

pub mod cache;
pub mod circuit_breaker;
pub mod conversation;
pub mod llm;
pub mod orchestrator;
pub mod rate_limit;
pub mod retry;
pub mod session;
pub mod telemetry;
pub mod tokens;

pub use cache::{CacheEntry, CacheStats, ResponseCache};
pub use circuit_breaker::{CircuitBreaker, CircuitPhase, CircuitState};
pub use orchestrator::Gateway;
pub use rate_limit::RateLimiter;
pub use retry::{Attempt, AttemptPlan, Completion};
pub use session::{SessionRegistry, SessionSnapshot, UserSession};
pub use telemetry::GatewayTelemetry;
pub use tokens::{estimate_cost, estimate_tokens};

pub use config::GatewayConfig;
pub use errors::{CompletionError, GatewayError};
pub use gw_core::{CompletionService, Message, Role, UserId};
