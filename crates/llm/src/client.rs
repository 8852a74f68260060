//! Chat-completion client for the configured provider.

use std::time::Duration;

use async_trait::async_trait;

use crate::ai_types::{ChatRequest, ChatResponse, Message, ResponseFormat};
use crate::error::LlmError;

const MAX_TRANSIENT_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 250;

/// Stage-agnostic completion port; the pipeline depends on this, not on a
/// concrete provider.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion with a system and a user prompt.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;

    /// Model identifier recorded in interaction transcripts.
    fn model_name(&self) -> &str;
}

/// OpenAI-style chat-completions client.
#[derive(Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f64>,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            temperature: None,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    /// Execute one chat completion, retrying transient failures.
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=MAX_TRANSIENT_RETRIES {
            if attempt > 0 {
                let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.send_once(&url, request).await {
                Ok(content) => return Ok(content),
                Err(error) if error.is_transient() && attempt < MAX_TRANSIENT_RETRIES => {
                    tracing::warn!(attempt, error = %error, "transient LLM failure, retrying");
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error.unwrap_or(LlmError::EmptyResponse))
    }

    async fn send_once(&self, url: &str, request: &ChatRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus { code: status.as_u16(), body });
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::JsonParse {
                context: format!("chat completion (body: {})", body.get(..300).unwrap_or(&body)),
                source: e,
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message { role: "system".to_owned(), content: system_prompt.to_owned() },
                Message { role: "user".to_owned(), content: user_prompt.to_owned() },
            ],
            response_format: ResponseFormat::json_object(),
            temperature: self.temperature,
        };
        self.chat_completion(&request).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
