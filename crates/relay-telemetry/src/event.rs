use chrono::{DateTime, Utc};
use relay_utils::{CircuitState, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which phase of a run an attempt belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Round {
    Hedge,
    Sequential,
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hedge => write!(f, "hedge"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

/// Base prompt or the stricter guard retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptKind {
    Base,
    Guard,
}

impl fmt::Display for AttemptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Guard => write!(f, "guard"),
        }
    }
}

/// One record per provider attempt.
///
/// Serialized as camelCase JSON:
/// `{ts, task, provider, round, attempt, success, retries, latencyMs, jsonOk?,
/// circuitBefore, circuitAfter, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptEvent {
    pub ts: DateTime<Utc>,
    pub task: String,
    pub provider: String,
    pub round: Round,
    pub attempt: AttemptKind,
    /// The provider produced a reply
    pub success: bool,
    /// Retries spent in this run before the attempt started
    pub retries: u32,
    pub latency_ms: u64,
    /// Whether the reply passed validation; absent when there was no reply
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub json_ok: Option<bool>,
    pub circuit_before: CircuitState,
    pub circuit_after: CircuitState,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ErrorKind>,
}
