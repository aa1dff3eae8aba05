use std::collections::HashMap;

use super::{Config, ConfigSource};

fn source_label(source: Option<&ConfigSource>) -> String {
    source.unwrap_or(&ConfigSource::Default).to_string()
}

impl Config {
    /// Get effective configuration as key-value pairs with source attribution
    #[must_use]
    pub fn effective_config(&self) -> HashMap<String, (String, String)> {
        let mut config = HashMap::new();

        let mut add_config = |key: &str, value: Option<String>| {
            if let Some(val) = value {
                let source = source_label(self.source_attribution.get(key));
                config.insert(key.to_string(), (val, source));
            }
        };

        add_config(
            "budget_ms",
            self.orchestrator.budget_ms.map(|v| v.to_string()),
        );
        add_config(
            "hedge_width",
            self.orchestrator.hedge_width.map(|v| v.to_string()),
        );
        add_config(
            "start_buffer_ms",
            self.orchestrator.start_buffer_ms.map(|v| v.to_string()),
        );
        add_config(
            "budget_enforcement",
            self.orchestrator.budget_enforcement.map(|v| v.to_string()),
        );
        add_config(
            "provider_order",
            self.orchestrator.providers.as_ref().map(|p| p.join(", ")),
        );
        add_config(
            "cooldown_secs",
            self.health.cooldown_secs.map(|v| v.to_string()),
        );
        add_config(
            "failure_threshold",
            self.health.failure_threshold.map(|v| v.to_string()),
        );
        add_config(
            "latency_window",
            self.health.latency_window.map(|v| v.to_string()),
        );
        add_config("telemetry_sink", Some(self.telemetry_sink().to_string()));
        add_config(
            "telemetry_path",
            self.telemetry.path.as_ref().map(|p| p.display().to_string()),
        );
        add_config(
            "prompts_dir",
            self.prompts.dir.as_ref().map(|p| p.display().to_string()),
        );

        for (id, provider) in &self.providers {
            let summary = format!(
                "{} model={} timeout={}s enabled={}",
                provider.kind,
                provider.model.as_deref().unwrap_or("-"),
                provider.timeout().as_secs(),
                provider.is_enabled()
            );
            add_config(&format!("providers.{id}"), Some(summary));
        }

        config
    }
}
