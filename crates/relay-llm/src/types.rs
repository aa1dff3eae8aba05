//! Core types for the provider adapter abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use relay_utils::error::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions
    System,
    /// User input
    User,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Stable identity of a configured provider.
///
/// `enabled` is resolved once at construction: the provider is enabled in
/// configuration and its credentials are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub id: String,
    pub enabled: bool,
    /// Per-call timeout enforced by the adapter
    pub timeout: Duration,
}

impl ProviderIdentity {
    #[must_use]
    pub fn new(id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            timeout,
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Successful reply from a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    /// Generated text, expected to contain the JSON payload
    pub text: String,
    /// Provider response envelope as received
    pub raw: serde_json::Value,
}

impl ProviderReply {
    #[must_use]
    pub fn new(text: impl Into<String>, raw: serde_json::Value) -> Self {
        Self {
            text: text.into(),
            raw,
        }
    }
}

/// A text-generation service reachable by the orchestrator.
///
/// Adapters perform exactly one network call per [`call`](Self::call) and never
/// retry on their own. They must return `LlmError::Cancelled` promptly once
/// `cancel` fires.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn identity(&self) -> &ProviderIdentity;

    /// Send `prompt` and return the generated text.
    async fn call(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProviderReply, LlmError>;

    fn id(&self) -> &str {
        &self.identity().id
    }
}
