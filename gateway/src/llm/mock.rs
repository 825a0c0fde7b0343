use async_trait::async_trait;
use errors::CompletionError;
use gw_core::CompletionService;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// One recorded call to the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub model: String,
    pub prompt: String,
    pub max_output_tokens: usize
}

/// Scripted completion service for tests and local runs.
///
/// Resolution order for each call: the first rule whose needle occurs in the
/// prompt, then the next queued outcome, then the default response.
pub struct MockCompletionService {
    rules: Mutex<Vec<(String, String)>>,
    queue: Mutex<VecDeque<Result<String, CompletionError>>>,
    default_response: Mutex<Option<String>>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<Vec<MockCall>>
}

impl Default for MockCompletionService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            default_response: Mutex::new(None),
            latency: Mutex::new(None),
            calls: Mutex::new(Vec::new())
        }
    }

    pub fn with_default_response(response: &str) -> Self {
        let mock = Self::new();
        mock.set_default_response(response);
        mock
    }

    pub fn set_default_response(&self, response: &str) {
        *self.default_response.lock() = Some(response.to_string());
    }

    /// Answers `response` whenever the prompt contains `needle`.
    pub fn respond_when(&self, needle: &str, response: &str) {
        self.rules
            .lock()
            .push((needle.to_string(), response.to_string()));
    }

    pub fn push_response(&self, response: &str) {
        self.queue.lock().push_back(Ok(response.to_string()));
    }

    pub fn push_error(&self, error: CompletionError) {
        self.queue.lock().push_back(Err(error));
    }

    pub fn push_rate_limited(&self) {
        self.push_error(CompletionError::RateLimited {
            reason: "429 RESOURCE_EXHAUSTED".to_string()
        });
    }

    pub fn push_failure(&self, reason: &str) {
        self.push_error(CompletionError::Other {
            reason: reason.to_string()
        });
    }

    /// Delay applied before every answer.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn resolve(&self, prompt: &str) -> Result<String, CompletionError> {
        if let Some((_, response)) = self
            .rules
            .lock()
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
        {
            return Ok(response.clone());
        }

        if let Some(outcome) = self.queue.lock().pop_front() {
            return outcome;
        }

        Ok(self
            .default_response
            .lock()
            .clone()
            .unwrap_or_else(|| format!("Mock response for: {prompt}")))
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        max_output_tokens: usize
    ) -> Result<String, CompletionError> {
        self.calls.lock().push(MockCall {
            model: model.to_string(),
            prompt: prompt.to_string(),
            max_output_tokens
        });

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.resolve(prompt)
    }
}
