//! Error types for relay
//!
//! Every error surfaced to an operator implements [`UserFriendlyError`], which adds
//! context and suggested actions on top of the `Display` message.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::types::ErrorKind;

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;

    /// Message, context and suggestions formatted for a terminal
    fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ProviderIntegration,
    ResponseValidation,
    ResourceLimits,
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::ProviderIntegration => write!(f, "Provider Integration"),
            Self::ResponseValidation => write!(f, "Response Validation"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Concurrency => write!(f, "Concurrency"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::MissingRequired(key) => {
                format!("Required configuration '{key}' is missing")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => {
                format!("Configuration file not found: {path}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [orchestrator], [health], \
                 [telemetry], [prompts] and [providers.<id>] sections."
                    .to_string(),
            ),
            Self::MissingRequired(_) => {
                Some("Some settings have no default and must be configured.".to_string())
            }
            Self::InvalidValue { .. } => {
                Some("The value is outside the accepted range for this setting.".to_string())
            }
            Self::NotFound { .. } => Some(
                "An explicit --config path or RELAY_CONFIG was given but does not exist."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .relay/config.toml".to_string(),
                "Run 'relay config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(key) => vec![format!("Add '{key}' to .relay/config.toml")],
            Self::InvalidValue { key, .. } => vec![
                format!("Fix the value of '{key}'"),
                "Remove the setting to fall back to the built-in default".to_string(),
            ],
            Self::NotFound { .. } => vec![
                "Check the path passed with --config".to_string(),
                "Unset RELAY_CONFIG to use upward discovery of .relay/config.toml".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Failure of a single provider call.
///
/// Adapters return these; the orchestrator records them and never surfaces them to
/// the caller individually.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The call did not complete within the per-provider timeout
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Provider authentication failure (401, 403)
    #[error("Provider authentication error: {0}")]
    Unauthorized(String),

    /// Provider rate limit exceeded (429)
    #[error("Provider rate limit exceeded: {0}")]
    RateLimited(String),

    /// Configured model does not exist on the provider (404)
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The provider answered but the envelope could not be understood
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Provider outage (5xx) or transport failure
    #[error("Provider internal error: {0}")]
    Internal(String),

    /// The call was abandoned because another hedge candidate already won
    #[error("Call cancelled")]
    Cancelled,

    /// The adapter could not be constructed from configuration
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl LlmError {
    /// Machine-readable kind for telemetry and reports
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::ModelNotFound(_) => ErrorKind::ModelNotFound,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::Internal(_) | Self::Misconfiguration(_) => ErrorKind::Internal,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Timeout { duration } => format!("Provider call timed out after {duration:?}"),
            Self::Unauthorized(msg) => format!("Provider authentication failed: {msg}"),
            Self::RateLimited(msg) => format!("Provider rate limit exceeded: {msg}"),
            Self::ModelNotFound(msg) => format!("Provider model not found: {msg}"),
            Self::MalformedResponse(msg) => format!("Provider returned a malformed response: {msg}"),
            Self::Internal(msg) => format!("Provider failure: {msg}"),
            Self::Cancelled => "Provider call was cancelled".to_string(),
            Self::Misconfiguration(msg) => format!("Provider configuration error: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Timeout { .. } => Some(
                "Each provider has its own call timeout ([providers.<id>] timeout_secs)."
                    .to_string(),
            ),
            Self::Unauthorized(_) => Some(
                "Authentication errors indicate missing or invalid API keys.".to_string(),
            ),
            Self::RateLimited(_) => Some(
                "Rate limits are enforced by the provider and usually reset within minutes."
                    .to_string(),
            ),
            Self::ModelNotFound(_) => Some(
                "The configured model name is not served by this provider.".to_string(),
            ),
            Self::MalformedResponse(_) => None,
            Self::Internal(_) => {
                Some("Provider outages are usually temporary service disruptions.".to_string())
            }
            Self::Cancelled => None,
            Self::Misconfiguration(_) => Some(
                "Configuration errors indicate missing or invalid provider settings."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Timeout { .. } => vec![
                "Increase timeout_secs for the provider".to_string(),
                "Check network connectivity to the provider".to_string(),
            ],
            Self::Unauthorized(_) => vec![
                "Check that the provider's api_key_env variable is set".to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::RateLimited(_) | Self::Internal(_) => vec![
                "Wait a few minutes and try again".to_string(),
                "Configure additional providers so relay can fail over".to_string(),
            ],
            Self::ModelNotFound(_) => {
                vec!["Check the model name in [providers.<id>] model".to_string()]
            }
            Self::MalformedResponse(_) | Self::Cancelled => Vec::new(),
            Self::Misconfiguration(_) => vec![
                "Check the provider configuration in .relay/config.toml".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized(_) | Self::Misconfiguration(_) | Self::ModelNotFound(_) => {
                ErrorCategory::Configuration
            }
            Self::RateLimited(_) | Self::Timeout { .. } => ErrorCategory::ResourceLimits,
            Self::MalformedResponse(_) => ErrorCategory::ResponseValidation,
            Self::Cancelled => ErrorCategory::Concurrency,
            Self::Internal(_) => ErrorCategory::ProviderIntegration,
        }
    }
}
