use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::BackendError;
use crate::metrics::BACKEND_LATENCY;

// Text generation service seen by the dispatcher
pub trait TextGenerator: Send + Sync + 'static {
    fn generate(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}

// Completion settings sent with every request
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

// OpenAI completions request format
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

// OpenAI completions response format
#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    text: String,
}

// OpenAI error body: {"error": {"message": "..."}}
#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    settings: CompletionSettings,
}

impl OpenAiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: String,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            settings,
        }
    }

    // One completion call with an explicit key, no timeout applied
    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, BackendError> {
        let body = CompletionRequest {
            model: &self.settings.model,
            prompt,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let res = self
            .client
            .post(format!("{}/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            // Quota, auth and model errors all come back in the same shape
            let message = match res.json::<ErrorResponse>().await {
                Ok(err) => err.error.message,
                Err(_) => format!("status {status}"),
            };
            return Err(BackendError::QuotaOrUpstream(message));
        }

        let parsed: CompletionResponse = res.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| BackendError::QuotaOrUpstream("empty completion".to_string()))
    }

    /// Submit `prompt` with `api_key`; gives up with `Timeout` after `timeout`.
    pub async fn generate_with_key(
        &self,
        api_key: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, self.complete(api_key, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(timeout)),
        };
        BACKEND_LATENCY.observe(start.elapsed().as_secs_f64());
        debug!(elapsed = ?start.elapsed(), ok = result.is_ok(), "completion finished");
        result
    }
}

impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, BackendError> {
        self.generate_with_key(&self.api_key, prompt, timeout).await
    }
}
