//! Response validation for provider replies
//!
//! Two explicit stages, each returning a value rather than panicking:
//!
//! 1. Syntax: parse the reply as JSON. If that fails, make exactly one repair
//!    attempt on the substring between the first `{` and the last `}`.
//! 2. Shape: check the parsed value against the task's [`ResponseSchema`].

mod schema;

pub use schema::{AnySchema, FnSchema, JsonSchema, ResponseSchema, SchemaError};

use relay_utils::{ErrorCategory, ErrorKind, UserFriendlyError};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// A reply that passed both stages
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub value: Value,
    /// True when the value came from the repaired substring
    pub repaired: bool,
}

/// Why a reply was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("Reply is not valid JSON: {reason}")]
    MalformedJson { reason: String },

    #[error("Reply does not match the response schema: {}", .errors.join("; "))]
    SchemaInvalid { errors: Vec<String> },
}

impl ValidationFailure {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedJson { .. } => ErrorKind::MalformedResponse,
            Self::SchemaInvalid { .. } => ErrorKind::SchemaInvalid,
        }
    }
}

impl UserFriendlyError for ValidationFailure {
    fn user_message(&self) -> String {
        match self {
            Self::MalformedJson { .. } => "The provider reply could not be parsed as JSON".to_string(),
            Self::SchemaInvalid { errors } => format!(
                "The provider reply did not match the expected shape ({} violation(s))",
                errors.len()
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::MalformedJson { reason } => Some(reason.clone()),
            Self::SchemaInvalid { errors } => Some(errors.join("\n")),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        vec![
            "Tighten the prompt template so it asks for JSON only".to_string(),
            "Check that the response schema matches what the template requests".to_string(),
        ]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::ResponseValidation
    }
}

/// Substring between the first `{` and the last `}`, if that is a non-empty span
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Stage 1: parse with at most one repair attempt.
///
/// # Errors
///
/// Returns [`ValidationFailure::MalformedJson`] if neither the reply nor its
/// repaired form parses.
pub fn parse_json(text: &str) -> Result<Validated, ValidationFailure> {
    let direct_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            return Ok(Validated {
                value,
                repaired: false,
            });
        }
        Err(e) => e,
    };

    let Some(candidate) = extract_json_object(text) else {
        return Err(ValidationFailure::MalformedJson {
            reason: direct_err.to_string(),
        });
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => {
            debug!(
                trimmed_chars = text.len() - candidate.len(),
                "Repaired reply by extracting the JSON object"
            );
            Ok(Validated {
                value,
                repaired: true,
            })
        }
        Err(repair_err) => Err(ValidationFailure::MalformedJson {
            reason: format!("{direct_err}; after repair: {repair_err}"),
        }),
    }
}

/// Run both stages on a raw reply.
///
/// # Errors
///
/// Returns [`ValidationFailure::MalformedJson`] for syntax failures and
/// [`ValidationFailure::SchemaInvalid`] for shape mismatches.
pub fn validate_response(
    text: &str,
    schema: &dyn ResponseSchema,
) -> Result<Validated, ValidationFailure> {
    let parsed = parse_json(text)?;
    schema
        .validate(&parsed.value)
        .map_err(|errors| ValidationFailure::SchemaInvalid { errors })?;
    Ok(parsed)
}
