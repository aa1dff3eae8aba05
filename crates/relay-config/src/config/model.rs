use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use relay_utils::types::ConfigSource;

/// Default total time budget for one run in milliseconds
pub const DEFAULT_BUDGET_MS: u64 = 35_000;

/// Default number of providers raced in the hedge round
pub const DEFAULT_HEDGE_WIDTH: usize = 2;

/// Minimum remaining budget required to start a new attempt
pub const DEFAULT_START_BUFFER_MS: u64 = 2_000;

/// Time an open circuit rejects calls before admitting a probe
pub const DEFAULT_COOLDOWN_SECS: u64 = 15;

/// Consecutive failures tolerated before a circuit opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Number of latency samples kept per provider
pub const DEFAULT_LATENCY_WINDOW: usize = 100;

/// Per-provider call timeout in seconds
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 20;

/// How strictly the time budget is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetEnforcement {
    /// The budget only prevents new attempts from starting (default)
    #[default]
    Advisory,
    /// Per-call timeouts are also clipped to the remaining budget
    Strict,
}

impl fmt::Display for BudgetEnforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advisory => write!(f, "advisory"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Where telemetry events are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetrySinkKind {
    /// Emit each event as a structured `tracing` event (default)
    #[default]
    Tracing,
    /// Append events as JSON lines to `[telemetry] path`
    Jsonl,
    /// Discard events
    None,
}

impl fmt::Display for TelemetrySinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tracing => write!(f, "tracing"),
            Self::Jsonl => write!(f, "jsonl"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Wire protocol spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI-style `/chat/completions` (OpenAI, OpenRouter, Mistral, ...)
    OpenAiCompatible,
    /// Anthropic Messages API
    Anthropic,
}

impl ProviderKind {
    pub const SUPPORTED: &'static [&'static str] = &["openai-compatible", "anthropic"];

    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "openai-compatible" => Some(Self::OpenAiCompatible),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "openai-compatible",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Configuration for relay.
///
/// # Configuration File Format
///
/// ```toml
/// [orchestrator]
/// budget_ms = 35000
/// hedge_width = 2
/// budget_enforcement = "advisory"
/// providers = ["openai", "claude"]
///
/// [health]
/// cooldown_secs = 15
///
/// [telemetry]
/// sink = "jsonl"
/// path = "relay-telemetry.jsonl"
///
/// [prompts]
/// dir = "prompts"
///
/// [providers.openai]
/// kind = "openai-compatible"
/// model = "gpt-4o-mini"
/// api_key_env = "OPENAI_API_KEY"
///
/// [providers.claude]
/// kind = "anthropic"
/// model = "claude-3-5-haiku-latest"
/// timeout_secs = 25
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub health: HealthConfig,
    pub telemetry: TelemetryConfig,
    pub prompts: PromptsConfig,
    /// Provider definitions keyed by provider id
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Source attribution for each setting (for `relay config`).
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// `[orchestrator]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    pub budget_ms: Option<u64>,
    pub hedge_width: Option<usize>,
    pub start_buffer_ms: Option<u64>,
    pub budget_enforcement: Option<BudgetEnforcement>,
    /// Preferred provider order. Providers not listed follow in id order.
    pub providers: Option<Vec<String>>,
}

/// `[health]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    pub cooldown_secs: Option<u64>,
    pub failure_threshold: Option<u32>,
    pub latency_window: Option<usize>,
}

/// `[telemetry]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    pub sink: Option<TelemetrySinkKind>,
    pub path: Option<PathBuf>,
}

/// `[prompts]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptsConfig {
    pub dir: Option<PathBuf>,
}

/// `[providers.<id>]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// `"openai-compatible"` or `"anthropic"`
    pub kind: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Set to false to keep the provider configured but out of rotation
    pub enabled: Option<bool>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            model: None,
            base_url: None,
            api_key_env: None,
            timeout_secs: None,
            enabled: None,
            max_tokens: None,
            temperature: None,
            system_prompt: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn provider_kind(&self) -> Option<ProviderKind> {
        ProviderKind::parse(&self.kind)
    }

    /// Per-call timeout, falling back to the built-in default
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            budget_ms: Some(DEFAULT_BUDGET_MS),
            hedge_width: Some(DEFAULT_HEDGE_WIDTH),
            start_buffer_ms: Some(DEFAULT_START_BUFFER_MS),
            budget_enforcement: Some(BudgetEnforcement::Advisory),
            providers: None,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: Some(DEFAULT_COOLDOWN_SECS),
            failure_threshold: Some(DEFAULT_FAILURE_THRESHOLD),
            latency_window: Some(DEFAULT_LATENCY_WINDOW),
        }
    }
}
