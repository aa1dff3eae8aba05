//! Anthropic Messages API backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::LlmError;
use crate::http_client::HttpClient;
use crate::openai_backend::HttpParams;
use crate::types::{Message, ProviderAdapter, ProviderIdentity, ProviderReply, Role};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

pub(crate) const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub(crate) struct AnthropicBackend {
    identity: ProviderIdentity,
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    model: String,
    params: HttpParams,
    system_prompt: Option<String>,
}

impl AnthropicBackend {
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

    /// Split messages into Anthropic's top-level `system` field and the
    /// conversation array. Multiple system messages are concatenated.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_prompt: Option<String> = None;
        let mut anthropic_messages = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    if let Some(existing) = system_prompt.as_mut() {
                        existing.push_str("\n\n");
                        existing.push_str(&msg.content);
                    } else {
                        system_prompt = Some(msg.content.clone());
                    }
                }
                Role::User => anthropic_messages.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        (system_prompt, anthropic_messages)
    }

    fn extract_text(raw: &serde_json::Value, provider: &str) -> Result<String, LlmError> {
        let response: AnthropicResponse = serde_json::from_value(raw.clone()).map_err(|e| {
            LlmError::MalformedResponse(format!("{provider}: unexpected response shape: {e}"))
        })?;

        let content: String = response
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(LlmError::MalformedResponse(format!(
                "{provider}: response missing text content"
            )));
        }
        Ok(content)
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicBackend {
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
            "Invoking Anthropic backend"
        );

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));
        let (system, anthropic_messages) = Self::convert_messages(&messages);

        let request_body = AnthropicRequest {
            model: self.model.clone(),
            messages: anthropic_messages,
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            system,
        };

        let request = self
            .client
            .client()
            .post(&self.base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body);

        let raw = self
            .client
            .execute_json(request, timeout, provider, cancel)
            .await?;

        let text = Self::extract_text(&raw, provider)?;

        debug!(
            provider = provider,
            response_chars = text.len(),
            "Anthropic invocation completed"
        );

        Ok(ProviderReply::new(text, raw))
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}
