//! # Retry / Fallback Policy
//!
//! An ordered list of attempt descriptors consumed by one loop:
//!
//! | # | model    | before the call |
//! |---|----------|-----------------|
//! | 1 | primary  | -               |
//! | 2 | primary  | fixed backoff   |
//! | 3 | fallback | -               |
//!
//! Only rate-limit class failures advance to the next attempt. Any other
//! failure ends the chain immediately.

use crate::telemetry::GatewayTelemetry;
use errors::CompletionError;
use gw_core::CompletionService;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub model: String,
    pub backoff: Option<Duration>,
    pub is_fallback: bool
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptPlan {
    attempts: Vec<Attempt>
}

impl AttemptPlan {
    pub fn new(primary: &str, fallback: Option<&str>, backoff: Duration) -> Self {
        let mut attempts = vec![
            Attempt {
                model: primary.to_string(),
                backoff: None,
                is_fallback: false
            },
            Attempt {
                model: primary.to_string(),
                backoff: Some(backoff),
                is_fallback: false
            },
        ];
        if let Some(fallback) = fallback {
            attempts.push(Attempt {
                model: fallback.to_string(),
                backoff: None,
                is_fallback: true
            });
        }
        Self { attempts }
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn primary_model(&self) -> &str {
        &self.attempts[0].model
    }
}

/// Text returned by the attempt that succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub attempts: usize,
    pub degraded: bool
}

/// Error of the last attempt made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub model: String,
    pub error: CompletionError,
    pub attempts: usize
}

pub async fn run_attempts(
    plan: &AttemptPlan,
    service: &dyn CompletionService,
    prompt: &str,
    max_output_tokens: usize,
    telemetry: &GatewayTelemetry
) -> Result<Completion, AttemptFailure> {
    let mut last_failure = None;

    for (index, attempt) in plan.attempts().iter().enumerate() {
        if let Some(backoff) = attempt.backoff {
            info!(
                model = %attempt.model,
                backoff_ms = backoff.as_millis() as u64,
                "Upstream rate limited, retrying after backoff"
            );
            telemetry.record_retry(&attempt.model);
            tokio::time::sleep(backoff).await;
        }
        if attempt.is_fallback {
            warn!(model = %attempt.model, "Primary model exhausted, trying fallback model");
            telemetry.record_fallback(&attempt.model);
        }

        let started = Instant::now();
        let result = service
            .complete(&attempt.model, prompt, max_output_tokens)
            .await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        telemetry.record_upstream_call(&attempt.model, result.is_ok(), elapsed_ms);

        match result {
            Ok(text) => {
                if attempt.is_fallback {
                    warn!(model = %attempt.model, "Served by fallback model (degraded)");
                }
                return Ok(Completion {
                    text,
                    model: attempt.model.clone(),
                    attempts: index + 1,
                    degraded: attempt.is_fallback
                });
            }
            Err(error) if error.is_rate_limited() => {
                warn!(model = %attempt.model, error = %error, "Rate-limit class upstream failure");
                last_failure = Some(AttemptFailure {
                    model: attempt.model.clone(),
                    error,
                    attempts: index + 1
                });
            }
            Err(error) => {
                warn!(model = %attempt.model, error = %error, "Upstream failure, not retrying");
                return Err(AttemptFailure {
                    model: attempt.model.clone(),
                    error,
                    attempts: index + 1
                });
            }
        }
    }

    Err(last_failure.unwrap_or_else(|| AttemptFailure {
        model: plan.primary_model().to_string(),
        error: CompletionError::Other {
            reason: "no attempts configured".to_string()
        },
        attempts: 0
    }))
}
