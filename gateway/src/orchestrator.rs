//! # Completion Orchestrator
//!
//! `Gateway::chat` composes the rate limiter, cache, conversation memory,
//! circuit breaker and retry policy around a single upstream completion.
//!
//! Locking rules:
//! - a session's mutex is taken for each read-modify-write of that session
//!   and released before any upstream call (chat or summarization)
//! - the cache and the breaker guard themselves
//! - nothing is held across `CompletionService::complete`

use crate::cache::{CacheStats, ResponseCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitPhase};
use crate::conversation::{self, CompactionOutcome};
use crate::rate_limit::{RateLimiter, ceil_secs};
use crate::retry::{AttemptPlan, run_attempts};
use crate::session::{SessionRegistry, SessionSnapshot, SharedSession};
use crate::telemetry::GatewayTelemetry;
use crate::tokens::{estimate_cost, estimate_tokens};
use async_trait::async_trait;
use config::{GatewayConfig, QuotaPolicy, validate_config};
use errors::GatewayError;
use gw_core::{CompletionService, Message, Role, Summarizer, UserId};
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

pub struct Gateway {
    config: Arc<GatewayConfig>,
    service: Arc<dyn CompletionService>,
    sessions: Arc<SessionRegistry>,
    cache: Arc<ResponseCache>,
    breaker: Arc<CircuitBreaker>,
    rate_limiter: RateLimiter,
    plan: AttemptPlan,
    telemetry: Arc<GatewayTelemetry>
}

impl Gateway {
    /// Builds a gateway with fresh, empty state.
    pub fn new(
        config: GatewayConfig,
        service: Arc<dyn CompletionService>
    ) -> Result<Self, GatewayError> {
        let telemetry = Arc::new(GatewayTelemetry::new());
        let cache = Arc::new(ResponseCache::new(config.cache.ttl(), Arc::clone(&telemetry)));
        let breaker = Arc::new(CircuitBreaker::new(
            config.circuit.max_failures,
            config.circuit.cooldown(),
            Arc::clone(&telemetry)
        ));
        Self::with_components(
            config,
            service,
            Arc::new(SessionRegistry::new()),
            cache,
            breaker,
            telemetry
        )
    }

    /// Builds a gateway around externally owned state, e.g. to share one
    /// cache between instances or to inspect components in tests.
    pub fn with_components(
        config: GatewayConfig,
        service: Arc<dyn CompletionService>,
        sessions: Arc<SessionRegistry>,
        cache: Arc<ResponseCache>,
        breaker: Arc<CircuitBreaker>,
        telemetry: Arc<GatewayTelemetry>
    ) -> Result<Self, GatewayError> {
        validate_config(&config)?;

        let rate_limiter = RateLimiter::per_minute(config.limits.max_requests_per_minute);
        let plan = AttemptPlan::new(
            &config.provider.primary_model,
            config.provider.fallback_model.as_deref(),
            config.retry.backoff()
        );

        info!(
            primary_model = %config.provider.primary_model,
            fallback_model = ?config.provider.fallback_model,
            max_requests_per_minute = config.limits.max_requests_per_minute,
            max_session_tokens = config.accounting.max_session_tokens,
            cost_per_1k_tokens = config.accounting.cost_per_1k_tokens,
            quota_policy = %config.accounting.quota_policy,
            "Gateway initialised"
        );

        Ok(Self {
            config: Arc::new(config),
            service,
            sessions,
            cache,
            breaker,
            rate_limiter,
            plan,
            telemetry
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Parses `user_id` and forwards to [`Gateway::chat`].
    pub async fn chat_as(&self, user_id: &str, prompt: &str) -> Result<String, GatewayError> {
        let user_id = UserId::from_str(user_id)?;
        self.chat(&user_id, prompt).await
    }

    /// Answers one user turn. Every failure is returned as a `GatewayError`.
    pub async fn chat(&self, user_id: &UserId, prompt: &str) -> Result<String, GatewayError> {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("chat", %request_id, user_id = %user_id);
        let started = Instant::now();

        let result = self.chat_inner(user_id, prompt).instrument(span).await;

        match &result {
            Ok(_) => self
                .telemetry
                .record_chat_success(started.elapsed().as_secs_f64() * 1000.0),
            Err(err) => {
                debug!(%request_id, error = %err, kind = err.kind(), "Chat request failed");
                self.telemetry.record_chat_failure(err.kind());
            }
        }
        result
    }

    async fn chat_inner(&self, user_id: &UserId, prompt: &str) -> Result<String, GatewayError> {
        let session = self.sessions.get_or_create(user_id);
        self.telemetry.record_session_count(self.sessions.len());

        self.admit(&session).await?;

        let input_tokens = estimate_tokens(prompt);
        if input_tokens > self.config.limits.max_input_tokens {
            warn!(
                input_tokens,
                max_input_tokens = self.config.limits.max_input_tokens,
                "Prompt too large"
            );
            return Err(GatewayError::InputTooLarge {
                tokens: input_tokens,
                max: self.config.limits.max_input_tokens
            });
        }

        self.check_session_budget(&session).await?;

        let model = self.plan.primary_model();
        if let Some(entry) = self.cache.get(model, prompt, Instant::now()) {
            info!(model, "Cache hit, skipping upstream call");
            return Ok(entry.response);
        }
        info!(model, "Cache miss");

        conversation::append(&mut *session.lock().await, Role::User, prompt);

        let (rendered, response) = match self.converse(&session).await {
            Ok(exchange) => exchange,
            Err(err) => {
                if conversation::rollback_user_message(&mut *session.lock().await, prompt) {
                    debug!("Pending user message rolled back");
                }
                return Err(err);
            }
        };

        self.cache.put(model, prompt, &response, Instant::now());
        self.settle(&session, &rendered, &response).await
    }

    /// Sliding-window admission for the session's user.
    async fn admit(&self, session: &SharedSession) -> Result<(), GatewayError> {
        let mut guard = session.lock().await;
        let now = Instant::now();

        if !self.rate_limiter.admit(guard.request_timestamps_mut(), now) {
            let retry_after_secs =
                ceil_secs(self.rate_limiter.retry_after(guard.request_timestamps(), now));
            warn!(
                max_requests_per_minute = self.rate_limiter.max_requests(),
                retry_after_secs, "Rate limit exceeded"
            );
            self.telemetry.record_rate_limited();
            return Err(GatewayError::RateLimited { retry_after_secs });
        }
        Ok(())
    }

    /// Rejects a session whose budget is already spent, before the cache.
    async fn check_session_budget(&self, session: &SharedSession) -> Result<(), GatewayError> {
        let used = session.lock().await.token_usage();
        let max = self.config.accounting.max_session_tokens;
        if used > max {
            warn!(used, max, "Session token budget already exhausted");
            self.telemetry.record_session_quota_exceeded();
            return Err(GatewayError::SessionQuotaExceeded { used, max });
        }
        Ok(())
    }

    /// Compacts memory, enforces the context ceiling and calls upstream.
    /// Returns the rendered prompt that was sent and the completion.
    async fn converse(&self, session: &SharedSession) -> Result<(String, String), GatewayError> {
        let summarizer = UpstreamSummarizer { gateway: self };
        let outcome = conversation::compact_if_needed(
            session,
            self.config.limits.max_memory_tokens,
            &summarizer
        )
        .await?;
        if let CompactionOutcome::Compacted {
            tokens_before,
            tokens_after
        } = outcome
        {
            self.telemetry.record_compaction(tokens_before, tokens_after);
        }

        let (rendered, usage) = {
            let guard = session.lock().await;
            (conversation::render_prompt(guard.history()), guard.token_usage())
        };

        let context_tokens = estimate_tokens(&rendered);
        let max_context = self.config.limits.max_context_tokens;
        if context_tokens > max_context {
            warn!(context_tokens, max_context, "Context window exceeded");
            return Err(GatewayError::ContextExceeded {
                tokens: context_tokens,
                max: max_context
            });
        }

        let accounting = &self.config.accounting;
        if accounting.quota_policy == QuotaPolicy::CheckBeforeCall
            && usage + context_tokens > accounting.max_session_tokens
        {
            warn!(
                used = usage,
                prompt_tokens = context_tokens,
                max = accounting.max_session_tokens,
                "Call would exceed session token budget"
            );
            self.telemetry.record_session_quota_exceeded();
            return Err(GatewayError::SessionQuotaExceeded {
                used: usage,
                max: accounting.max_session_tokens
            });
        }

        let response = self
            .invoke_upstream(&rendered, self.config.limits.max_output_tokens)
            .await?;
        Ok((rendered, response))
    }

    /// Records the assistant turn and debits the session budget.
    async fn settle(
        &self,
        session: &SharedSession,
        rendered: &str,
        response: &str
    ) -> Result<String, GatewayError> {
        let prompt_tokens = estimate_tokens(rendered);
        let response_tokens = estimate_tokens(response);
        let total = prompt_tokens + response_tokens;

        let used = {
            let mut guard = session.lock().await;
            conversation::append(&mut guard, Role::Assistant, response);
            guard.add_token_usage(total)
        };

        let accounting = &self.config.accounting;
        let cost = estimate_cost(total, accounting.cost_per_1k_tokens);
        self.telemetry.record_token_usage(total, cost);
        info!(
            prompt_tokens,
            response_tokens,
            total_tokens = total,
            session_tokens = used,
            estimated_cost = cost,
            "Token usage recorded"
        );

        if accounting.quota_policy == QuotaPolicy::DebitThenDeny
            && used > accounting.max_session_tokens
        {
            warn!(
                used,
                max = accounting.max_session_tokens,
                "Session token budget exceeded"
            );
            self.telemetry.record_session_quota_exceeded();
            return Err(GatewayError::SessionQuotaExceeded {
                used,
                max: accounting.max_session_tokens
            });
        }

        Ok(response.to_string())
    }

    /// Breaker check, then the attempt plan under the request deadline.
    async fn invoke_upstream(
        &self,
        prompt: &str,
        max_output_tokens: usize
    ) -> Result<String, GatewayError> {
        if let Err(err) = self.breaker.check(Instant::now()) {
            warn!(error = %err, "Circuit open, upstream call rejected");
            return Err(err);
        }

        let deadline = self.config.retry.request_deadline();
        let attempts = run_attempts(
            &self.plan,
            self.service.as_ref(),
            prompt,
            max_output_tokens,
            &self.telemetry
        );

        match tokio::time::timeout(deadline, attempts).await {
            Err(_) => {
                let reason = format!("deadline of {}s exceeded", deadline.as_secs());
                self.telemetry.record_upstream_timeout();
                self.breaker.record_failure(Instant::now(), &reason);
                Err(GatewayError::Upstream {
                    model: self.plan.primary_model().to_string(),
                    reason
                })
            }
            Ok(Err(failure)) => {
                self.breaker
                    .record_failure(Instant::now(), failure.error.reason());
                Err(GatewayError::upstream(&failure.model, &failure.error))
            }
            Ok(Ok(completion)) => {
                self.breaker.record_success();
                if completion.text.trim().is_empty() {
                    warn!(model = %completion.model, "Empty response from upstream");
                    return Err(GatewayError::EmptyResponse {
                        model: completion.model
                    });
                }
                debug!(
                    model = %completion.model,
                    attempts = completion.attempts,
                    degraded = completion.degraded,
                    "Upstream call succeeded"
                );
                Ok(completion.text)
            }
        }
    }

    pub async fn session_snapshot(&self, user_id: &UserId) -> Option<SessionSnapshot> {
        self.sessions.snapshot(user_id).await
    }

    pub fn circuit_phase(&self) -> CircuitPhase {
        self.breaker.phase()
    }

    pub fn circuit_failures(&self) -> u32 {
        self.breaker.consecutive_failures()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Summarizes older turns with the primary model through the same breaker
/// and retry policy as chat calls.
struct UpstreamSummarizer<'a> {
    gateway: &'a Gateway
}

#[async_trait]
impl Summarizer for UpstreamSummarizer<'_> {
    async fn summarize(&self, older: &[Message]) -> Result<String, GatewayError> {
        if older.is_empty() {
            return Ok(String::new());
        }
        let prompt = conversation::summarization_prompt(older);
        self.gateway
            .invoke_upstream(&prompt, self.gateway.config.limits.summary_max_output_tokens)
            .await
    }
}
