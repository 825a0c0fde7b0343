use metrics::{counter, gauge, histogram};

/// Metrics facade for gateway decision points.
///
/// Only emits through the `metrics` macros; installing an exporter is left
/// to the embedding process.
#[derive(Debug)]
pub struct GatewayTelemetry {
    _phantom: std::marker::PhantomData<()>
}

impl Default for GatewayTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayTelemetry {
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData
        }
    }

    pub fn record_chat_success(&self, duration_ms: f64) {
        counter!("gateway_chat_requests_total", "status" => "success").increment(1);
        histogram!("gateway_chat_duration_seconds").record(duration_ms / 1000.0);
    }

    pub fn record_chat_failure(&self, kind: &str) {
        let labels = [("status", "failure".to_string()), ("error", kind.to_string())];
        counter!("gateway_chat_requests_total", &labels).increment(1);
    }

    pub fn record_rate_limited(&self) {
        counter!("gateway_rate_limit_rejections_total").increment(1);
    }

    pub fn record_session_quota_exceeded(&self) {
        counter!("gateway_session_quota_rejections_total").increment(1);
    }

    pub fn record_cache_hit(&self) {
        counter!("gateway_cache_hits_total").increment(1);
    }

    pub fn record_cache_miss(&self) {
        counter!("gateway_cache_misses_total").increment(1);
    }

    pub fn record_cache_expiration(&self) {
        counter!("gateway_cache_expirations_total").increment(1);
    }

    pub fn record_cache_size(&self, entries: usize) {
        gauge!("gateway_cache_entries").set(entries as f64);
    }

    pub fn record_compaction(&self, tokens_before: usize, tokens_after: usize) {
        counter!("gateway_compactions_total").increment(1);
        histogram!("gateway_compaction_tokens_saved")
            .record(tokens_before.saturating_sub(tokens_after) as f64);
    }

    pub fn record_retry(&self, model: &str) {
        counter!("gateway_upstream_retries_total", "model" => model.to_string()).increment(1);
    }

    pub fn record_fallback(&self, model: &str) {
        counter!("gateway_upstream_fallbacks_total", "model" => model.to_string()).increment(1);
    }

    pub fn record_upstream_call(&self, model: &str, success: bool, duration_ms: f64) {
        let status = if success { "success" } else { "failure" };
        let labels = [("model", model.to_string()), ("status", status.to_string())];
        counter!("gateway_upstream_calls_total", &labels).increment(1);
        histogram!("gateway_upstream_duration_seconds", "model" => model.to_string())
            .record(duration_ms / 1000.0);
    }

    pub fn record_upstream_timeout(&self) {
        counter!("gateway_upstream_timeouts_total").increment(1);
    }

    pub fn record_circuit_opened(&self, consecutive_failures: u32) {
        counter!("gateway_circuit_opened_total").increment(1);
        gauge!("gateway_circuit_open").set(1.0);
        gauge!("gateway_circuit_failures_at_open").set(f64::from(consecutive_failures));
    }

    pub fn record_circuit_half_open(&self) {
        counter!("gateway_circuit_half_open_total").increment(1);
        gauge!("gateway_circuit_open").set(0.0);
    }

    pub fn record_circuit_closed(&self) {
        counter!("gateway_circuit_closed_total").increment(1);
        gauge!("gateway_circuit_open").set(0.0);
    }

    pub fn record_circuit_rejection(&self) {
        counter!("gateway_circuit_rejections_total").increment(1);
    }

    pub fn record_token_usage(&self, tokens: usize, estimated_cost: f64) {
        counter!("gateway_tokens_total").increment(tokens as u64);
        histogram!("gateway_request_cost_estimate").record(estimated_cost);
    }

    pub fn record_session_count(&self, sessions: usize) {
        gauge!("gateway_sessions").set(sessions as f64);
    }
}
