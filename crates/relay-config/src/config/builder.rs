use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use relay_utils::error::ConfigError;

use super::{
    BudgetEnforcement, Config, ConfigSource, HealthConfig, OrchestratorConfig, PromptsConfig,
    ProviderConfig, TelemetryConfig, TelemetrySinkKind,
};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding relay and deterministic behavior independent of
    /// the environment and config files is required.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use relay_config::{Config, ProviderConfig};
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .budget(Duration::from_secs(20))
    ///     .hedge_width(2)
    ///     .provider("openai", ProviderConfig::new("openai-compatible").with_model("gpt-4o-mini"))
    ///     .build()
    ///     .expect("Failed to build config");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration of relay.
///
/// All values set via the builder are attributed to `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    budget: Option<Duration>,
    hedge_width: Option<usize>,
    start_buffer: Option<Duration>,
    budget_enforcement: Option<BudgetEnforcement>,
    provider_order: Option<Vec<String>>,
    cooldown: Option<Duration>,
    failure_threshold: Option<u32>,
    latency_window: Option<usize>,
    telemetry_sink: Option<TelemetrySinkKind>,
    telemetry_path: Option<PathBuf>,
    prompts_dir: Option<PathBuf>,
    providers: BTreeMap<String, ProviderConfig>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total time budget for each run
    #[must_use]
    pub fn budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    #[must_use]
    pub fn hedge_width(mut self, width: usize) -> Self {
        self.hedge_width = Some(width);
        self
    }

    /// Minimum remaining budget needed to start an attempt
    #[must_use]
    pub fn start_buffer(mut self, buffer: Duration) -> Self {
        self.start_buffer = Some(buffer);
        self
    }

    #[must_use]
    pub fn budget_enforcement(mut self, mode: BudgetEnforcement) -> Self {
        self.budget_enforcement = Some(mode);
        self
    }

    #[must_use]
    pub fn provider_order<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provider_order = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn latency_window(mut self, samples: usize) -> Self {
        self.latency_window = Some(samples);
        self
    }

    #[must_use]
    pub fn telemetry_sink(mut self, sink: TelemetrySinkKind) -> Self {
        self.telemetry_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn telemetry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.telemetry_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn prompts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompts_dir = Some(dir.into());
        self
    }

    /// Add (or replace) a provider definition
    #[must_use]
    pub fn provider(mut self, id: impl Into<String>, provider: ProviderConfig) -> Self {
        self.providers.insert(id.into(), provider);
        self
    }

    /// Build the configuration, applying defaults for unset values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value fails validation.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut source_attribution = HashMap::new();
        let mut orchestrator = OrchestratorConfig::default();
        let mut health = HealthConfig::default();
        let mut telemetry = TelemetryConfig::default();
        let mut prompts = PromptsConfig::default();

        let mut mark = |key: &str, set: bool| {
            let source = if set {
                ConfigSource::Programmatic
            } else {
                ConfigSource::Default
            };
            source_attribution.insert(key.to_string(), source);
        };

        mark("budget_ms", self.budget.is_some());
        if let Some(budget) = self.budget {
            orchestrator.budget_ms = Some(duration_ms(budget));
        }
        mark("hedge_width", self.hedge_width.is_some());
        if self.hedge_width.is_some() {
            orchestrator.hedge_width = self.hedge_width;
        }
        mark("start_buffer_ms", self.start_buffer.is_some());
        if let Some(buffer) = self.start_buffer {
            orchestrator.start_buffer_ms = Some(duration_ms(buffer));
        }
        mark("budget_enforcement", self.budget_enforcement.is_some());
        if self.budget_enforcement.is_some() {
            orchestrator.budget_enforcement = self.budget_enforcement;
        }
        if self.provider_order.is_some() {
            mark("provider_order", true);
            orchestrator.providers = self.provider_order;
        }
        mark("cooldown_secs", self.cooldown.is_some());
        if let Some(cooldown) = self.cooldown {
            health.cooldown_secs = Some(cooldown.as_secs());
        }
        mark("failure_threshold", self.failure_threshold.is_some());
        if self.failure_threshold.is_some() {
            health.failure_threshold = self.failure_threshold;
        }
        mark("latency_window", self.latency_window.is_some());
        if self.latency_window.is_some() {
            health.latency_window = self.latency_window;
        }
        mark("telemetry_sink", self.telemetry_sink.is_some());
        telemetry.sink = self.telemetry_sink;
        if self.telemetry_path.is_some() {
            mark("telemetry_path", true);
            telemetry.path = self.telemetry_path;
        }
        if self.prompts_dir.is_some() {
            mark("prompts_dir", true);
            prompts.dir = self.prompts_dir;
        }
        for id in self.providers.keys() {
            mark(&format!("providers.{id}"), true);
        }

        let config = Config {
            orchestrator,
            health,
            telemetry,
            prompts,
            providers: self.providers,
            source_attribution,
        };
        config.validate()?;
        Ok(config)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
