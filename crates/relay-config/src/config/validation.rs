use relay_utils::error::ConfigError;

use super::{Config, ProviderKind, TelemetrySinkKind};

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Some(budget_ms) = self.orchestrator.budget_ms {
            if budget_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "budget_ms".to_string(),
                    value: "must be greater than 0".to_string(),
                });
            }
            if budget_ms > 600_000 {
                return Err(ConfigError::InvalidValue {
                    key: "budget_ms".to_string(),
                    value: "exceeds maximum limit of 600000 ms (10 minutes)".to_string(),
                });
            }
        }

        if let Some(width) = self.orchestrator.hedge_width {
            if width == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "hedge_width".to_string(),
                    value: "must be at least 1".to_string(),
                });
            }
            if width > 8 {
                return Err(ConfigError::InvalidValue {
                    key: "hedge_width".to_string(),
                    value: "exceeds maximum limit of 8".to_string(),
                });
            }
        }

        if let (Some(buffer), Some(budget)) = (
            self.orchestrator.start_buffer_ms,
            self.orchestrator.budget_ms,
        ) && buffer >= budget
        {
            return Err(ConfigError::InvalidValue {
                key: "start_buffer_ms".to_string(),
                value: format!("must be smaller than budget_ms ({budget})"),
            });
        }

        if let Some(cooldown) = self.health.cooldown_secs
            && !(1..=3600).contains(&cooldown)
        {
            return Err(ConfigError::InvalidValue {
                key: "cooldown_secs".to_string(),
                value: "must be between 1 and 3600 seconds".to_string(),
            });
        }

        if let Some(threshold) = self.health.failure_threshold
            && !(1..=100).contains(&threshold)
        {
            return Err(ConfigError::InvalidValue {
                key: "failure_threshold".to_string(),
                value: "must be between 1 and 100".to_string(),
            });
        }

        if let Some(window) = self.health.latency_window
            && !(1..=10_000).contains(&window)
        {
            return Err(ConfigError::InvalidValue {
                key: "latency_window".to_string(),
                value: "must be between 1 and 10000 samples".to_string(),
            });
        }

        if self.telemetry.sink == Some(TelemetrySinkKind::Jsonl) && self.telemetry.path.is_none()
        {
            return Err(ConfigError::MissingRequired(
                "telemetry.path (required when telemetry.sink = \"jsonl\")".to_string(),
            ));
        }

        if let Some(order) = &self.orchestrator.providers {
            for id in order {
                if !self.providers.contains_key(id) {
                    return Err(ConfigError::InvalidValue {
                        key: "orchestrator.providers".to_string(),
                        value: format!("'{id}' has no [providers.{id}] section"),
                    });
                }
            }
        }

        for (id, provider) in &self.providers {
            if id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "providers".to_string(),
                    value: "provider id must not be empty".to_string(),
                });
            }

            if provider.provider_kind().is_none() {
                return Err(ConfigError::InvalidValue {
                    key: format!("providers.{id}.kind"),
                    value: format!(
                        "'{}' is not supported. Supported kinds: {}",
                        provider.kind,
                        ProviderKind::SUPPORTED.join(", ")
                    ),
                });
            }

            if let Some(timeout) = provider.timeout_secs {
                if timeout == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: format!("providers.{id}.timeout_secs"),
                        value: "must be greater than 0".to_string(),
                    });
                }
                if timeout > 600 {
                    return Err(ConfigError::InvalidValue {
                        key: format!("providers.{id}.timeout_secs"),
                        value: "exceeds maximum limit of 600 seconds".to_string(),
                    });
                }
            }

            if let Some(temperature) = provider.temperature
                && !(0.0..=2.0).contains(&temperature)
            {
                return Err(ConfigError::InvalidValue {
                    key: format!("providers.{id}.temperature"),
                    value: "must be between 0.0 and 2.0".to_string(),
                });
            }

            if let Some(base_url) = &provider.base_url
                && !(base_url.starts_with("https://") || base_url.starts_with("http://"))
            {
                return Err(ConfigError::InvalidValue {
                    key: format!("providers.{id}.base_url"),
                    value: format!("'{base_url}' must start with http:// or https://"),
                });
            }

            if provider.model.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::InvalidValue {
                    key: format!("providers.{id}.model"),
                    value: "must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}
