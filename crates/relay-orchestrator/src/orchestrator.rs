//! The multi-provider orchestrator
//!
//! One [`Orchestrator::run`] call turns a task into exactly one
//! [`OrchestrationResult`]:
//!
//! 1. Resolve candidates (per-run selection, then enabled providers only).
//! 2. Render the prompt and derive the guard prompt.
//! 3. Rank admissible candidates by health score.
//! 4. Race the top `hedge_width` candidates; the first valid reply wins.
//! 5. Otherwise walk the remaining candidates one at a time.
//!
//! Every provider gets one base attempt and, if that fails, one guard attempt.
//! No attempt starts once the start buffer would be violated.

use std::sync::Arc;
use std::time::Duration;

use relay_config::{
    BudgetEnforcement, Config, DEFAULT_BUDGET_MS, DEFAULT_HEDGE_WIDTH, DEFAULT_START_BUFFER_MS,
};
use relay_health::HealthRegistry;
use relay_llm::{LlmError, ProviderAdapter};
use relay_prompt_template::{PromptSource, Vars};
use relay_telemetry::{TelemetrySink, TracingSink, sink_from_config};
use relay_utils::{ConfigError, ErrorKind};
use relay_utils::logging::{log_run_complete, log_run_failure, log_run_start, run_span};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{Instrument, debug, warn};

use crate::attempt::{Failure, RunContext, Win};
use crate::budget::Budget;
use crate::guard::guard_prompt;
use crate::hedge::hedge_round;
use crate::result::{Extraction, OrchestrationError, OrchestrationResult};
use crate::sequential::sequential_round;
use crate::task::{RunOptions, Task};

/// Run-level settings, resolved from `[orchestrator]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub budget: Duration,
    pub hedge_width: usize,
    pub start_buffer: Duration,
    pub enforcement: BudgetEnforcement,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            budget: Duration::from_millis(DEFAULT_BUDGET_MS),
            hedge_width: DEFAULT_HEDGE_WIDTH,
            start_buffer: Duration::from_millis(DEFAULT_START_BUFFER_MS),
            enforcement: BudgetEnforcement::default(),
        }
    }
}

impl OrchestratorSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            budget: config.budget(),
            hedge_width: config.hedge_width(),
            start_buffer: config.start_buffer(),
            enforcement: config.budget_enforcement(),
        }
    }
}

/// Failure to assemble an orchestrator from configuration
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Provider(#[from] LlmError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct Orchestrator {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    registry: Arc<HealthRegistry>,
    prompts: Arc<dyn PromptSource>,
    sink: Arc<dyn TelemetrySink>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    #[must_use]
    pub fn builder(prompts: Arc<dyn PromptSource>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(prompts)
    }

    /// Build adapters, health registry and telemetry sink from configuration.
    ///
    /// Must run inside a tokio runtime when the JSONL sink is selected.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] if a provider is misconfigured or the telemetry
    /// sink cannot be built.
    pub fn from_config(config: &Config, prompts: Arc<dyn PromptSource>) -> Result<Self, SetupError> {
        let providers = relay_llm::adapters_from_config(config)?;
        Self::from_config_with_providers(config, prompts, providers)
    }

    /// Like [`Orchestrator::from_config`] but with adapters supplied by the caller
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Config`] if the telemetry sink cannot be built.
    pub fn from_config_with_providers(
        config: &Config,
        prompts: Arc<dyn PromptSource>,
        providers: Vec<Arc<dyn ProviderAdapter>>,
    ) -> Result<Self, SetupError> {
        Ok(Self::builder(prompts)
            .providers(providers)
            .registry(Arc::new(HealthRegistry::from_config(config)))
            .sink(sink_from_config(config)?)
            .settings(OrchestratorSettings::from_config(config))
            .build())
    }

    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.providers
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<HealthRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Flush the telemetry sink. Attempts still draining from a hedge round may
    /// record after this and are dropped.
    pub async fn close(&self) {
        self.sink.close().await;
    }

    /// Run one task to a terminal result.
    ///
    /// Never panics on provider misbehaviour; every failure path ends in an
    /// [`OrchestrationError`].
    pub async fn run(&self, task: &Task, vars: &Vars, options: RunOptions) -> OrchestrationResult {
        let span = run_span(&task.id);
        async {
            let started = Instant::now();
            let result = self.execute(task, vars, options, started).await;
            let elapsed_ms = started.elapsed().as_millis();
            match &result {
                Ok(extraction) => {
                    log_run_complete(&task.id, &extraction.provider, extraction.retries, elapsed_ms);
                }
                Err(error) => log_run_failure(&task.id, error.kind(), elapsed_ms),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Enabled adapters for this run, honouring a per-run selection
    fn candidates(&self, options: &RunOptions) -> Vec<Arc<dyn ProviderAdapter>> {
        let selected: Vec<Arc<dyn ProviderAdapter>> = match &options.providers {
            Some(ids) => {
                let mut picked: Vec<Arc<dyn ProviderAdapter>> = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.providers.iter().find(|p| p.id() == id) {
                        Some(p) if !picked.iter().any(|q| q.id() == id) => {
                            picked.push(Arc::clone(p));
                        }
                        Some(_) => {}
                        None => warn!(provider = %id, "Requested provider is not configured"),
                    }
                }
                picked
            }
            None => self.providers.clone(),
        };

        selected
            .into_iter()
            .filter(|p| {
                let enabled = p.identity().enabled;
                if !enabled {
                    debug!(provider = %p.id(), "Skipping disabled provider");
                }
                enabled
            })
            .collect()
    }

    async fn execute(
        &self,
        task: &Task,
        vars: &Vars,
        options: RunOptions,
        started: Instant,
    ) -> OrchestrationResult {
        let candidates = self.candidates(&options);
        if candidates.is_empty() {
            return Err(OrchestrationError::NoProviderConfigured);
        }

        let template = self.prompts.load(&task.template).map_err(|e| {
            OrchestrationError::PromptUnavailable {
                template: task.template.clone(),
                reason: e.to_string(),
            }
        })?;
        let base_prompt = self.prompts.render(&template, vars);
        let guard = guard_prompt(&base_prompt);

        let deadline = options
            .deadline
            .unwrap_or_else(|| started + options.budget.unwrap_or(self.settings.budget));
        let budget = Budget::new(
            started,
            deadline,
            self.settings.start_buffer,
            self.settings.enforcement,
        );
        if !budget.can_start() {
            return Err(OrchestrationError::BudgetExceeded {
                elapsed_ms: budget.elapsed().as_millis() as u64,
            });
        }

        let ordered = self.registry.best_order(&candidates);
        log_run_start(&task.id, ordered.len(), budget.remaining().as_millis());
        if ordered.is_empty() {
            warn!(candidates = candidates.len(), "Every candidate circuit is open");
            return Err(OrchestrationError::AllProvidersFailed {
                last_provider: None,
                last_raw_text: None,
                last_error: Some(ErrorKind::CircuitOpen),
            });
        }

        let ctx = Arc::new(RunContext {
            task_id: task.id.clone(),
            base_prompt,
            guard_prompt: guard,
            schema: Arc::clone(&task.schema),
            registry: Arc::clone(&self.registry),
            sink: Arc::clone(&self.sink),
            budget,
        });

        let width = self.settings.hedge_width.clamp(1, ordered.len());
        let hedge = hedge_round(Arc::clone(&ctx), &ordered[..width]).await;
        if let Some(win) = hedge.win {
            return Ok(extraction(win, hedge.abandoned, &budget));
        }

        if ordered.len() > width {
            debug!(
                abandoned = hedge.abandoned,
                remaining = ordered.len() - width,
                "Hedge round found no valid reply, continuing sequentially"
            );
        }
        let seq = sequential_round(&ctx, &ordered, &hedge.attempted, hedge.abandoned).await;
        if let Some(win) = seq.win {
            return Ok(extraction(win, hedge.abandoned + seq.abandoned, &budget));
        }

        let attempted_any = !hedge.attempted.is_empty() || seq.attempted_any;
        if !attempted_any && (seq.budget_exhausted || !budget.can_start()) {
            return Err(OrchestrationError::BudgetExceeded {
                elapsed_ms: budget.elapsed().as_millis() as u64,
            });
        }

        let last: Option<Failure> = seq
            .last_failure
            .or(hedge.last_failure)
            .or(seq.last_rejection)
            .or(hedge.last_rejection);
        warn!(
            last_provider = last.as_ref().map_or("none", |f| f.provider.as_str()),
            "All providers exhausted"
        );
        Err(match last {
            Some(failure) => OrchestrationError::AllProvidersFailed {
                last_provider: Some(failure.provider),
                last_raw_text: failure.raw_text,
                last_error: Some(failure.error),
            },
            None => OrchestrationError::AllProvidersFailed {
                last_provider: None,
                last_raw_text: None,
                last_error: None,
            },
        })
    }
}

fn extraction(win: Win, abandoned: u32, budget: &Budget) -> Extraction {
    Extraction {
        provider: win.provider,
        parsed_data: win.validated.value,
        raw_text: win.raw_text,
        retries: abandoned + u32::from(win.via_guard),
        elapsed_ms: budget.elapsed().as_millis() as u64,
        repaired: win.validated.repaired,
    }
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    prompts: Arc<dyn PromptSource>,
    providers: Vec<Arc<dyn ProviderAdapter>>,
    registry: Option<Arc<HealthRegistry>>,
    sink: Option<Arc<dyn TelemetrySink>>,
    settings: OrchestratorSettings,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn new(prompts: Arc<dyn PromptSource>) -> Self {
        Self {
            prompts,
            providers: Vec::new(),
            registry: None,
            sink: None,
            settings: OrchestratorSettings::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn providers(mut self, providers: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Share a registry across orchestrators (or keep one across runs in tests)
    #[must_use]
    pub fn registry(mut self, registry: Arc<HealthRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn budget(mut self, budget: Duration) -> Self {
        self.settings.budget = budget;
        self
    }

    #[must_use]
    pub fn hedge_width(mut self, width: usize) -> Self {
        self.settings.hedge_width = width.max(1);
        self
    }

    #[must_use]
    pub fn start_buffer(mut self, buffer: Duration) -> Self {
        self.settings.start_buffer = buffer;
        self
    }

    #[must_use]
    pub fn enforcement(mut self, enforcement: BudgetEnforcement) -> Self {
        self.settings.enforcement = enforcement;
        self
    }

    #[must_use]
    pub fn build(self) -> Orchestrator {
        Orchestrator {
            providers: self.providers,
            registry: self.registry.unwrap_or_default(),
            prompts: self.prompts,
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            settings: self.settings,
        }
    }
}
