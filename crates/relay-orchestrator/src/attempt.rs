//! A single provider attempt and the base-then-guard sequence around it

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relay_health::{CircuitState, HealthRegistry};
use relay_llm::{LlmError, ProviderAdapter};
use relay_telemetry::{AttemptEvent, AttemptKind, Round, TelemetrySink};
use relay_utils::ErrorKind;
use relay_validation::{ResponseSchema, Validated, validate_response};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::budget::Budget;

/// Everything an attempt needs, shared by every task of one run
pub(crate) struct RunContext {
    pub task_id: String,
    pub base_prompt: String,
    pub guard_prompt: String,
    pub schema: Arc<dyn ResponseSchema>,
    pub registry: Arc<HealthRegistry>,
    pub sink: Arc<dyn TelemetrySink>,
    pub budget: Budget,
}

pub(crate) enum AttemptOutcome {
    Accepted { validated: Validated, raw_text: String },
    Failed { error: ErrorKind, raw_text: Option<String> },
    /// Rejected by the circuit breaker; no call was made
    CircuitOpen,
    Cancelled,
}

/// Reply that won a provider its place
pub(crate) struct Win {
    pub provider: String,
    pub validated: Validated,
    pub raw_text: String,
    pub via_guard: bool,
}

/// Last failure seen for a provider
#[derive(Debug, Clone)]
pub(crate) struct Failure {
    pub provider: String,
    pub error: ErrorKind,
    pub raw_text: Option<String>,
}

pub(crate) enum ProviderOutcome {
    Won(Win),
    /// `attempted` is false when no call was made (circuit or budget)
    Lost { failure: Failure, attempted: bool },
    Cancelled { attempted: bool },
}

struct EventFields {
    success: bool,
    json_ok: Option<bool>,
    circuit_before: CircuitState,
    circuit_after: CircuitState,
    error: Option<ErrorKind>,
}

impl RunContext {
    fn emit(
        &self,
        provider: &str,
        round: Round,
        attempt: AttemptKind,
        retries: u32,
        latency: Duration,
        fields: EventFields,
    ) {
        self.sink.record(AttemptEvent {
            ts: Utc::now(),
            task: self.task_id.clone(),
            provider: provider.to_string(),
            round,
            attempt,
            success: fields.success,
            retries,
            latency_ms: latency.as_millis() as u64,
            json_ok: fields.json_ok,
            circuit_before: fields.circuit_before,
            circuit_after: fields.circuit_after,
            error: fields.error,
        });
    }

    /// Make one call and record it with the registry and the telemetry sink
    pub(crate) async fn attempt(
        &self,
        provider: &dyn ProviderAdapter,
        kind: AttemptKind,
        round: Round,
        retries: u32,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        let id = provider.id();
        let prompt = match kind {
            AttemptKind::Base => &self.base_prompt,
            AttemptKind::Guard => &self.guard_prompt,
        };

        let permit = match self.registry.before_call(id) {
            Ok(permit) => permit,
            Err(rejection) => {
                debug!(provider = %id, state = %rejection.state, %round, %kind, "Circuit rejected attempt");
                self.emit(
                    id,
                    round,
                    kind,
                    retries,
                    Duration::ZERO,
                    EventFields {
                        success: false,
                        json_ok: None,
                        circuit_before: rejection.state,
                        circuit_after: rejection.state,
                        error: Some(ErrorKind::CircuitOpen),
                    },
                );
                return AttemptOutcome::CircuitOpen;
            }
        };
        let circuit_before = permit.state_before();
        let timeout = self.budget.call_timeout(provider.identity().timeout);

        debug!(
            provider = %id,
            %round,
            attempt = %kind,
            timeout_ms = timeout.as_millis() as u64,
            "Calling provider"
        );

        let started = Instant::now();
        let result = provider.call(prompt, timeout, cancel).await;
        let latency = started.elapsed();

        match result {
            Ok(reply) => {
                let validation = validate_response(&reply.text, self.schema.as_ref());
                let json_ok = validation.is_ok();
                let circuit_after = self.registry.after_call(permit, latency, true, json_ok);
                let error = validation.as_ref().err().map(|f| f.kind());
                self.emit(
                    id,
                    round,
                    kind,
                    retries,
                    latency,
                    EventFields {
                        success: true,
                        json_ok: Some(json_ok),
                        circuit_before,
                        circuit_after,
                        error,
                    },
                );
                match validation {
                    Ok(validated) => AttemptOutcome::Accepted {
                        validated,
                        raw_text: reply.text,
                    },
                    Err(failure) => {
                        debug!(provider = %id, attempt = %kind, error = %failure, "Reply rejected");
                        AttemptOutcome::Failed {
                            error: failure.kind(),
                            raw_text: Some(reply.text),
                        }
                    }
                }
            }
            Err(LlmError::Cancelled) => {
                drop(permit);
                self.emit(
                    id,
                    round,
                    kind,
                    retries,
                    latency,
                    EventFields {
                        success: false,
                        json_ok: None,
                        circuit_before,
                        circuit_after: self.registry.state(id),
                        error: Some(ErrorKind::Cancelled),
                    },
                );
                debug!(provider = %id, attempt = %kind, "Attempt cancelled");
                AttemptOutcome::Cancelled
            }
            Err(e) => {
                let circuit_after = self.registry.after_call(permit, latency, false, false);
                self.emit(
                    id,
                    round,
                    kind,
                    retries,
                    latency,
                    EventFields {
                        success: false,
                        json_ok: None,
                        circuit_before,
                        circuit_after,
                        error: Some(e.kind()),
                    },
                );
                debug!(provider = %id, attempt = %kind, error = %e, "Provider call failed");
                AttemptOutcome::Failed {
                    error: e.kind(),
                    raw_text: None,
                }
            }
        }
    }

    /// Base prompt, then on failure one guard retry, each gated by the budget.
    ///
    /// `retries` is the run's retry count before this provider started.
    pub(crate) async fn run_provider(
        &self,
        provider: &dyn ProviderAdapter,
        round: Round,
        retries: u32,
        cancel: &CancellationToken,
    ) -> ProviderOutcome {
        let id = provider.id().to_string();
        let lost = |error: ErrorKind, raw_text: Option<String>, attempted: bool| {
            ProviderOutcome::Lost {
                failure: Failure {
                    provider: id.clone(),
                    error,
                    raw_text,
                },
                attempted,
            }
        };

        if !self.budget.can_start() {
            return lost(ErrorKind::BudgetExceeded, None, false);
        }

        let (base_error, base_raw) = match self
            .attempt(provider, AttemptKind::Base, round, retries, cancel)
            .await
        {
            AttemptOutcome::Accepted {
                validated,
                raw_text,
            } => {
                return ProviderOutcome::Won(Win {
                    provider: id.clone(),
                    validated,
                    raw_text,
                    via_guard: false,
                });
            }
            AttemptOutcome::CircuitOpen => return lost(ErrorKind::CircuitOpen, None, false),
            AttemptOutcome::Cancelled => return ProviderOutcome::Cancelled { attempted: true },
            AttemptOutcome::Failed { error, raw_text } => (error, raw_text),
        };

        if cancel.is_cancelled() {
            return ProviderOutcome::Cancelled { attempted: true };
        }
        if !self.budget.can_start() {
            debug!(provider = %id, "No budget left for guard retry");
            return lost(base_error, base_raw, true);
        }

        match self
            .attempt(provider, AttemptKind::Guard, round, retries + 1, cancel)
            .await
        {
            AttemptOutcome::Accepted {
                validated,
                raw_text,
            } => ProviderOutcome::Won(Win {
                provider: id.clone(),
                validated,
                raw_text,
                via_guard: true,
            }),
            AttemptOutcome::Failed { error, raw_text } => {
                lost(error, raw_text.or(base_raw), true)
            }
            AttemptOutcome::CircuitOpen => lost(base_error, base_raw, true),
            AttemptOutcome::Cancelled => ProviderOutcome::Cancelled { attempted: true },
        }
    }
}
