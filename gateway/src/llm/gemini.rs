//! Google Generative Language API adapter.

use async_trait::async_trait;
use config::ProviderConfig;
use errors::{CompletionError, ConfigError};
use gw_core::CompletionService;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: usize
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>
}

pub struct GeminiCompletionService {
    client: reqwest::Client,
    api_key: String,
    base_url: String
}

impl GeminiCompletionService {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, ConfigError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::Missing {
                key: "GENAI_API_KEY".to_string()
            });
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "http_client".to_string(),
                reason: e.to_string()
            })?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string()
        })
    }

    /// Fails with `ConfigError::Missing` when no API key is configured.
    pub fn from_config(provider: &ProviderConfig) -> Result<Self, ConfigError> {
        let api_key = provider.api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            key: "GENAI_API_KEY".to_string()
        })?;
        Self::new(api_key, &provider.base_url)
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl CompletionService for GeminiCompletionService {
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        max_output_tokens: usize
    ) -> Result<String, CompletionError> {
        info!(
            model,
            prompt_chars = prompt.chars().count(),
            "Sending prompt to Gemini"
        );

        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }]
            }],
            generation_config: GenerationConfig { max_output_tokens }
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Other {
                reason: format!("request failed: {e}")
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::RateLimited {
                reason: format!("HTTP 429: {detail}")
            });
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::classify(format!("HTTP {status}: {detail}")));
        }

        let parsed: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| CompletionError::Other {
                    reason: format!("invalid response body: {e}")
                })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        debug!(model, response_chars = text.chars().count(), "Response received from Gemini");
        Ok(text)
    }
}
