//! Terminal outcome of a run

use relay_utils::{ErrorCategory, ErrorKind, ExitCode, UserFriendlyError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// A validated reply
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub provider: String,
    pub parsed_data: Value,
    pub raw_text: String,
    /// Providers abandoned before the win, plus one if the guard prompt won
    pub retries: u32,
    pub elapsed_ms: u64,
    /// The reply needed the bounded JSON repair
    pub repaired: bool,
}

impl Extraction {
    /// Deserialize the validated value into a domain type
    ///
    /// # Errors
    ///
    /// Returns the serde error if the value does not fit `T`.
    pub fn parse_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.parsed_data)
    }
}

/// Why a run produced no extraction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("No enabled provider is configured")]
    NoProviderConfigured,

    #[error("Time budget exhausted after {elapsed_ms} ms before any provider could be called")]
    BudgetExceeded { elapsed_ms: u64 },

    #[error("All providers failed{}", .last_provider.as_ref().map(|p| format!(" (last: {p})")).unwrap_or_default())]
    AllProvidersFailed {
        last_provider: Option<String>,
        last_raw_text: Option<String>,
        last_error: Option<ErrorKind>,
    },

    #[error("Prompt template '{template}' is unavailable: {reason}")]
    PromptUnavailable { template: String, reason: String },
}

impl OrchestrationError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoProviderConfigured => ErrorKind::NoProviderConfigured,
            Self::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            Self::AllProvidersFailed { .. } => ErrorKind::AllProvidersFailed,
            Self::PromptUnavailable { .. } => ErrorKind::PromptUnavailable,
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.kind())
    }

    /// Whether repeating the same run later may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AllProvidersFailed { .. } | Self::BudgetExceeded { .. }
        )
    }
}

impl UserFriendlyError for OrchestrationError {
    fn user_message(&self) -> String {
        match self {
            Self::NoProviderConfigured => {
                "No provider is available to handle this request".to_string()
            }
            Self::BudgetExceeded { .. } => {
                "The request ran out of time before a provider could be called".to_string()
            }
            Self::AllProvidersFailed { .. } => {
                "Every provider failed to produce a usable reply".to_string()
            }
            Self::PromptUnavailable { template, .. } => {
                format!("Prompt template '{template}' could not be loaded")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NoProviderConfigured => Some(
                "Providers are disabled when their API key variable is unset or when \
                 enabled = false."
                    .to_string(),
            ),
            Self::BudgetExceeded { elapsed_ms } => Some(format!(
                "{elapsed_ms} ms elapsed; a new attempt needs more than the start buffer left."
            )),
            Self::AllProvidersFailed {
                last_provider,
                last_error,
                ..
            } => Some(format!(
                "Last provider: {}; last error: {}",
                last_provider.as_deref().unwrap_or("none"),
                last_error.map_or("none", |k| k.as_str())
            )),
            Self::PromptUnavailable { reason, .. } => Some(reason.clone()),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NoProviderConfigured => vec![
                "Add a [providers.<id>] section to .relay/config.toml".to_string(),
                "Export the API key variable named by api_key_env".to_string(),
                "Run 'relay providers' to see which providers are enabled".to_string(),
            ],
            Self::BudgetExceeded { .. } => vec![
                "Increase [orchestrator] budget_ms or pass --budget-ms".to_string(),
            ],
            Self::AllProvidersFailed { .. } => vec![
                "Try again in a few moments".to_string(),
                "Run with --verbose to see each attempt".to_string(),
            ],
            Self::PromptUnavailable { .. } => vec![
                "Check [prompts] dir and the template name".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::NoProviderConfigured | Self::PromptUnavailable { .. } => {
                ErrorCategory::Configuration
            }
            Self::BudgetExceeded { .. } => ErrorCategory::ResourceLimits,
            Self::AllProvidersFailed { .. } => ErrorCategory::ProviderIntegration,
        }
    }
}

/// Exactly one per run
pub type OrchestrationResult = Result<Extraction, OrchestrationError>;

/// Serializable form of an [`OrchestrationResult`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunReport {
    Success(SuccessReport),
    Failure(FailureReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessReport {
    pub ok: bool,
    pub task: String,
    pub provider: String,
    pub retries: u32,
    pub elapsed_ms: u64,
    pub repaired: bool,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub ok: bool,
    pub task: String,
    pub error_kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl RunReport {
    #[must_use]
    pub fn new(task_id: &str, result: &OrchestrationResult) -> Self {
        match result {
            Ok(extraction) => Self::Success(SuccessReport {
                ok: true,
                task: task_id.to_string(),
                provider: extraction.provider.clone(),
                retries: extraction.retries,
                elapsed_ms: extraction.elapsed_ms,
                repaired: extraction.repaired,
                data: extraction.parsed_data.clone(),
            }),
            Err(error) => {
                let (last_provider, last_raw_text, last_error) = match error {
                    OrchestrationError::AllProvidersFailed {
                        last_provider,
                        last_raw_text,
                        last_error,
                    } => (last_provider.clone(), last_raw_text.clone(), *last_error),
                    _ => (None, None, None),
                };
                Self::Failure(FailureReport {
                    ok: false,
                    task: task_id.to_string(),
                    error_kind: error.kind(),
                    message: error.user_message(),
                    last_provider,
                    last_raw_text,
                    last_error,
                    suggestions: error.suggestions(),
                })
            }
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
