//! Small value types shared across crates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error kind.
///
/// Serializes to kebab-case strings (`"all-providers-failed"`, `"rate-limited"`, ...).
/// These strings are part of the telemetry and CLI JSON contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// No provider is enabled; nothing can be attempted.
    NoProviderConfigured,
    /// The time budget ran out before any attempt could start.
    BudgetExceeded,
    /// The provider's circuit rejected the call.
    CircuitOpen,
    Timeout,
    Unauthorized,
    RateLimited,
    ModelNotFound,
    /// The reply was not parseable JSON, even after repair.
    MalformedResponse,
    /// The reply was valid JSON with the wrong shape.
    SchemaInvalid,
    Internal,
    /// The call was cancelled because another hedge candidate won.
    Cancelled,
    AllProvidersFailed,
    PromptUnavailable,
}

impl ErrorKind {
    /// Stable wire name for this kind
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoProviderConfigured => "no-provider-configured",
            Self::BudgetExceeded => "budget-exceeded",
            Self::CircuitOpen => "circuit-open",
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate-limited",
            Self::ModelNotFound => "model-not-found",
            Self::MalformedResponse => "malformed-response",
            Self::SchemaInvalid => "schema-invalid",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
            Self::AllProvidersFailed => "all-providers-failed",
            Self::PromptUnavailable => "prompt-unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker state of a single provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation, calls are admitted
    #[default]
    Closed,
    /// Calls are rejected until the cooldown elapses
    Open,
    /// One probe call is admitted to test recovery
    HalfOpen,
}

impl CircuitState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of a configuration value.
///
/// Precedence (highest first): CLI arguments > environment > config file >
/// programmatic builder > built-in defaults.
///
/// Serializes to lowercase strings: `"cli"`, `"env"`, `"config"`, `"programmatic"`, `"default"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument
    Cli,
    /// Value provided via `RELAY_*` environment variable
    Env,
    /// Value loaded from a config file
    Config,
    /// Value set through `ConfigBuilder`
    Programmatic,
    /// Built-in default
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cli => "cli",
            Self::Env => "env",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        };
        f.write_str(label)
    }
}
