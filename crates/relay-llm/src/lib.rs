//! Provider adapters for relay
//!
//! Every text-generation service sits behind the [`ProviderAdapter`] trait, so the
//! orchestrator can race, retry and fail over without knowing which protocol a
//! provider speaks.

mod anthropic_backend;
pub(crate) mod http_client;
mod openai_backend;
mod types;

#[cfg(any(test, feature = "test-utils"))]
mod scripted;

pub use relay_config as config;

pub use relay_utils::error::LlmError;
pub use types::{Message, ProviderAdapter, ProviderIdentity, ProviderReply, Role};

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::ScriptedAdapter;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::anthropic_backend::AnthropicBackend;
use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::http_client::HttpClient;
use crate::openai_backend::{HttpParams, OpenAiCompatibleBackend};

/// Construct the adapter for one configured provider.
///
/// A provider whose API key variable is unset (or empty) is still constructed,
/// with `enabled = false`.
///
/// # Errors
///
/// Returns `LlmError::Misconfiguration` if the kind is unknown or no model is set.
fn construct_adapter<F>(
    id: &str,
    provider: &ProviderConfig,
    client: &Arc<HttpClient>,
    env: &F,
) -> Result<Arc<dyn ProviderAdapter>, LlmError>
where
    F: Fn(&str) -> Option<String>,
{
    let kind = provider.provider_kind().ok_or_else(|| {
        LlmError::Misconfiguration(format!(
            "Unknown provider kind '{}' for '{id}'. Supported kinds: {}.",
            provider.kind,
            ProviderKind::SUPPORTED.join(", ")
        ))
    })?;

    let model = provider
        .model
        .clone()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            LlmError::Misconfiguration(format!(
                "Model not specified for provider '{id}'. \
                 Please set [providers.{id}] model = \"model-name\"."
            ))
        })?;

    let api_key_env = provider
        .api_key_env
        .as_deref()
        .unwrap_or(match kind {
            ProviderKind::OpenAiCompatible => openai_backend::DEFAULT_API_KEY_ENV,
            ProviderKind::Anthropic => anthropic_backend::DEFAULT_API_KEY_ENV,
        });
    let api_key = env(api_key_env).filter(|key| !key.trim().is_empty());

    let enabled = provider.is_enabled() && api_key.is_some();
    if provider.is_enabled() && api_key.is_none() {
        warn!(
            provider = id,
            api_key_env = api_key_env,
            "API key not set, provider disabled"
        );
    }

    let identity = ProviderIdentity::new(id, provider.timeout()).with_enabled(enabled);
    let params = HttpParams {
        max_tokens: provider.max_tokens.unwrap_or(2048),
        temperature: provider.temperature.unwrap_or(0.0),
    };

    debug!(
        provider = id,
        kind = kind.as_str(),
        model = %model,
        enabled = enabled,
        timeout_secs = identity.timeout.as_secs(),
        "Constructed provider adapter"
    );

    let adapter: Arc<dyn ProviderAdapter> = match kind {
        ProviderKind::OpenAiCompatible => Arc::new(
            OpenAiCompatibleBackend::new(
                identity,
                Arc::clone(client),
                provider.base_url.clone(),
                api_key,
                model,
                params,
            )
            .with_system_prompt(provider.system_prompt.clone()),
        ),
        ProviderKind::Anthropic => Arc::new(
            AnthropicBackend::new(
                identity,
                Arc::clone(client),
                provider.base_url.clone(),
                api_key,
                model,
                params,
            )
            .with_system_prompt(provider.system_prompt.clone()),
        ),
    };
    Ok(adapter)
}

/// Construct adapters for every configured provider, in candidate order.
///
/// API keys are read from the process environment.
///
/// # Errors
///
/// Returns `LlmError::Misconfiguration` if a provider definition is unusable or
/// the HTTP client cannot be built.
pub fn adapters_from_config(config: &Config) -> Result<Vec<Arc<dyn ProviderAdapter>>, LlmError> {
    adapters_from_config_with_env(config, |key| std::env::var(key).ok())
}

/// Same as [`adapters_from_config`] with an explicit environment lookup.
///
/// # Errors
///
/// See [`adapters_from_config`].
pub fn adapters_from_config_with_env<F>(
    config: &Config,
    env: F,
) -> Result<Vec<Arc<dyn ProviderAdapter>>, LlmError>
where
    F: Fn(&str) -> Option<String>,
{
    let client = Arc::new(HttpClient::new()?);

    let mut adapters = Vec::with_capacity(config.providers.len());
    for id in config.provider_ids() {
        let Some(provider) = config.providers.get(&id) else {
            continue;
        };
        adapters.push(construct_adapter(&id, provider, &client, &env)?);
    }
    Ok(adapters)
}
