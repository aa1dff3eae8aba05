//! OpenAI-compatible HTTP backend
//!
//! Speaks the `/chat/completions` protocol shared by OpenAI, OpenRouter, Mistral
//! and most hosted gateways.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::LlmError;
use crate::http_client::HttpClient;
use crate::types::{Message, ProviderAdapter, ProviderIdentity, ProviderReply, Role};

/// Default chat completions endpoint
pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default environment variable holding the API key
pub(crate) const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// HTTP request parameters
#[derive(Debug, Clone)]
pub(crate) struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.0,
        }
    }
}

pub(crate) struct OpenAiCompatibleBackend {
    identity: ProviderIdentity,
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    model: String,
    params: HttpParams,
    system_prompt: Option<String>,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        identity: ProviderIdentity,
        client: Arc<HttpClient>,
        base_url: Option<String>,
        api_key: Option<String>,
        model: String,
        params: HttpParams,
    ) -> Self {
        Self {
            identity,
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model,
            params,
            system_prompt: None,
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    fn build_messages(&self, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));
        messages
    }

    /// Convert messages to OpenAI-compatible format
    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: match msg.role {
                    Role::System => "system".to_string(),
                    Role::User => "user".to_string(),
                },
                content: msg.content.clone(),
            })
            .collect()
    }

    fn extract_text(raw: &serde_json::Value, provider: &str) -> Result<String, LlmError> {
        let response: ChatCompletionResponse = serde_json::from_value(raw.clone())
            .map_err(|e| {
                LlmError::MalformedResponse(format!("{provider}: unexpected response shape: {e}"))
            })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            LlmError::MalformedResponse(format!("{provider}: response missing choices[0]"))
        })?;

        choice
            .message
            .content
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                LlmError::MalformedResponse(format!(
                    "{provider}: response missing content in choices[0]"
                ))
            })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleBackend {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    async fn call(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProviderReply, LlmError> {
        let provider = self.identity.id.as_str();
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LlmError::Misconfiguration(format!("{provider}: no API key available"))
        })?;

        debug!(
            provider = provider,
            model = %self.model,
            max_tokens = self.params.max_tokens,
            timeout_ms = timeout.as_millis() as u64,
            "Invoking OpenAI-compatible backend"
        );

        let request_body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: Self::convert_messages(&self.build_messages(prompt)),
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            stream: false,
        };

        let request = self
            .client
            .client()
            .post(&self.base_url)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .json(&request_body);

        let raw = self
            .client
            .execute_json(request, timeout, provider, cancel)
            .await?;

        let text = Self::extract_text(&raw, provider)?;

        debug!(
            provider = provider,
            response_chars = text.len(),
            "OpenAI-compatible invocation completed"
        );

        Ok(ProviderReply::new(text, raw))
    }
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
