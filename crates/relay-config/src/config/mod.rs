//! Configuration management for relay
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > environment > file > defaults. TOML files carry `[orchestrator]`, `[health]`,
//! `[telemetry]`, `[prompts]` and `[providers.<id>]` sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{BUDGET_ENV, CONFIG_ENV, HEDGE_WIDTH_ENV};
pub use model::*;
pub use relay_utils::types::ConfigSource;

use std::time::Duration;

impl Config {
    #[must_use]
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.orchestrator.budget_ms.unwrap_or(DEFAULT_BUDGET_MS))
    }

    #[must_use]
    pub fn hedge_width(&self) -> usize {
        self.orchestrator.hedge_width.unwrap_or(DEFAULT_HEDGE_WIDTH)
    }

    #[must_use]
    pub fn start_buffer(&self) -> Duration {
        Duration::from_millis(
            self.orchestrator
                .start_buffer_ms
                .unwrap_or(DEFAULT_START_BUFFER_MS),
        )
    }

    #[must_use]
    pub fn budget_enforcement(&self) -> BudgetEnforcement {
        self.orchestrator.budget_enforcement.unwrap_or_default()
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.health.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS))
    }

    #[must_use]
    pub fn failure_threshold(&self) -> u32 {
        self.health
            .failure_threshold
            .unwrap_or(DEFAULT_FAILURE_THRESHOLD)
    }

    #[must_use]
    pub fn latency_window(&self) -> usize {
        self.health.latency_window.unwrap_or(DEFAULT_LATENCY_WINDOW)
    }

    #[must_use]
    pub fn telemetry_sink(&self) -> TelemetrySinkKind {
        self.telemetry.sink.unwrap_or_default()
    }

    /// Provider ids in candidate order.
    ///
    /// Ids listed in `[orchestrator] providers` come first, in the listed order;
    /// any remaining configured providers follow sorted by id.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.providers.len());
        if let Some(order) = &self.orchestrator.providers {
            for id in order {
                if self.providers.contains_key(id) && !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
        for id in self.providers.keys() {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Config {
    /// Create a minimal Config for testing purposes
    pub fn minimal_for_testing() -> Self {
        Config {
            orchestrator: OrchestratorConfig::default(),
            health: HealthConfig::default(),
            telemetry: TelemetryConfig::default(),
            prompts: PromptsConfig::default(),
            providers: std::collections::BTreeMap::new(),
            source_attribution: std::collections::HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_utils::error::ConfigError;
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn create_test_config_file(dir: &Path, content: &str) -> PathBuf {
        let relay_dir = dir.join(".relay");
        fs::create_dir_all(&relay_dir).unwrap();

        let config_path = relay_dir.join("config.toml");
        fs::write(&config_path, content).unwrap();

        config_path
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let orchestrator = OrchestratorConfig::default();
        assert_eq!(orchestrator.budget_ms, Some(35_000));
        assert_eq!(orchestrator.hedge_width, Some(2));
        assert_eq!(orchestrator.start_buffer_ms, Some(2_000));

        let health = HealthConfig::default();
        assert_eq!(health.cooldown_secs, Some(15));
        assert_eq!(health.failure_threshold, Some(3));
        assert_eq!(health.latency_window, Some(100));
    }

    #[test]
    fn test_discovery_without_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join(".git")).unwrap();

        let config =
            Config::discover_from_with_env(temp_dir.path(), &CliArgs::default(), no_env).unwrap();

        assert_eq!(config.budget(), Duration::from_millis(35_000));
        assert!(config.providers.is_empty());
        assert_eq!(
            config.source_attribution.get("hedge_width"),
            Some(&ConfigSource::Default)
        );
    }

    #[test]
    fn test_discovery_parses_all_sections() {
        let temp_dir = TempDir::new().unwrap();
        create_test_config_file(
            temp_dir.path(),
            r#"
[orchestrator]
budget_ms = 20000
hedge_width = 3
budget_enforcement = "strict"
providers = ["claude", "openai"]

[health]
cooldown_secs = 30

[telemetry]
sink = "jsonl"
path = "/tmp/relay-events.jsonl"

[prompts]
dir = "prompts"

[providers.openai]
kind = "openai-compatible"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"

[providers.claude]
kind = "anthropic"
model = "claude-3-5-haiku-latest"
timeout_secs = 25

[providers.mistral]
kind = "openai-compatible"
base_url = "https://api.mistral.ai/v1"
enabled = false
"#,
        );

        let config =
            Config::discover_from_with_env(temp_dir.path(), &CliArgs::default(), no_env).unwrap();

        assert_eq!(config.budget(), Duration::from_millis(20_000));
        assert_eq!(config.hedge_width(), 3);
        assert_eq!(config.budget_enforcement(), BudgetEnforcement::Strict);
        assert_eq!(config.cooldown(), Duration::from_secs(30));
        assert_eq!(config.failure_threshold(), 3);
        assert_eq!(config.telemetry_sink(), TelemetrySinkKind::Jsonl);
        assert_eq!(config.prompts.dir, Some(temp_dir.path().join("prompts")));
        assert_eq!(config.providers["claude"].timeout(), Duration::from_secs(25));
        assert_eq!(config.providers["openai"].timeout(), Duration::from_secs(20));
        assert!(!config.providers["mistral"].is_enabled());
        assert_eq!(config.provider_ids(), vec!["claude", "openai", "mistral"]);
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let temp_dir = TempDir::new().unwrap();
        create_test_config_file(
            temp_dir.path(),
            r#"
[orchestrator]
budget_ms = 20000
hedge_width = 3
"#,
        );

        let env = env_from(&[(BUDGET_ENV, "25000"), (HEDGE_WIDTH_ENV, "1")]);
        let cli_args = CliArgs {
            budget_ms: Some(30_000),
            ..Default::default()
        };

        let config = Config::discover_from_with_env(temp_dir.path(), &cli_args, env).unwrap();

        assert_eq!(config.budget(), Duration::from_millis(30_000));
        assert_eq!(config.hedge_width(), 1);
        assert_eq!(
            config.source_attribution.get("budget_ms"),
            Some(&ConfigSource::Cli)
        );
        assert_eq!(
            config.source_attribution.get("hedge_width"),
            Some(&ConfigSource::Env)
        );
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let env = env_from(&[(BUDGET_ENV, "soon")]);

        let err =
            Config::discover_from_with_env(temp_dir.path(), &CliArgs::default(), env).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, BUDGET_ENV),
            other => panic!("Expected InvalidValue for {BUDGET_ENV}, got {other:?}"),
        }
    }

    #[test]
    fn test_config_env_names_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(&path, "[orchestrator]\nhedge_width = 4\n").unwrap();

        let path_str = path.display().to_string();
        let env = env_from(&[(CONFIG_ENV, path_str.as_str())]);
        let config =
            Config::discover_from_with_env(temp_dir.path(), &CliArgs::default(), env).unwrap();

        assert_eq!(config.hedge_width(), 4);
    }

    #[test]
    fn test_missing_explicit_config_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let cli_args = CliArgs {
            config_path: Some(temp_dir.path().join("nope.toml")),
            ..Default::default()
        };

        let err = Config::discover_from_with_env(temp_dir.path(), &cli_args, no_env).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        create_test_config_file(temp_dir.path(), "invalid toml content [[[");

        let result = Config::discover_from_with_env(temp_dir.path(), &CliArgs::default(), no_env);
        assert!(result.is_err());
        let error_msg = format!("{:#}", result.unwrap_err());
        assert!(error_msg.contains("Invalid configuration file"));
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        create_test_config_file(temp_dir.path(), "[defaults]\nmodel = \"x\"\n");

        let result = Config::discover_from_with_env(temp_dir.path(), &CliArgs::default(), no_env);
        assert!(result.is_err());
    }

    #[test]
    fn test_misspelled_keys_in_sections_are_rejected() {
        for content in [
            "[orchestrator]\nbudgett_ms = 5\n",
            "[health]\ncooldown = 30\n",
            "[telemetry]\nsinks = \"none\"\n",
            "[prompts]\ndirectory = \"p\"\n",
            "[providers.openai]\nkind = \"openai-compatible\"\nmodle = \"gpt-4o-mini\"\n",
        ] {
            let temp_dir = TempDir::new().unwrap();
            fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
            create_test_config_file(temp_dir.path(), content);

            let err = Config::discover_from_with_env(temp_dir.path(), &CliArgs::default(), no_env)
                .unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<ConfigError>(),
                    Some(ConfigError::InvalidFile(_))
                ),
                "Expected InvalidFile for {content:?}, got {err:#}"
            );
        }
    }

    #[test]
    fn test_zero_provider_timeout_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        create_test_config_file(
            temp_dir.path(),
            r#"
[providers.openai]
kind = "openai-compatible"
timeout_secs = 0
"#,
        );

        let err = Config::discover_from_with_env(temp_dir.path(), &CliArgs::default(), no_env)
            .unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "providers.openai.timeout_secs");
            }
            other => panic!("Expected InvalidValue for timeout_secs, got {other:?}"),
        }
    }

    #[test]
    fn test_provider_order_must_reference_known_providers() {
        let temp_dir = TempDir::new().unwrap();
        create_test_config_file(
            temp_dir.path(),
            r#"
[orchestrator]
providers = ["ghost"]
"#,
        );

        let result = Config::discover_from_with_env(temp_dir.path(), &CliArgs::default(), no_env);
        assert!(result.is_err());
    }

    #[test]
    fn test_upward_discovery_stops_at_repo_root() {
        let temp_dir = TempDir::new().unwrap();
        create_test_config_file(temp_dir.path(), "[orchestrator]\nhedge_width = 5\n");

        // Nested repository without its own config: search stops at its .git
        let repo = temp_dir.path().join("repo");
        let nested = repo.join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();
        assert_eq!(Config::discover_config_file_from(&nested).unwrap(), None);

        // Without the marker the parent's config is found
        fs::remove_dir_all(repo.join(".git")).unwrap();
        let found = Config::discover_config_file_from(&nested).unwrap();
        assert_eq!(found, Some(temp_dir.path().join(".relay").join("config.toml")));
    }

    #[test]
    fn test_effective_config() {
        let temp_dir = TempDir::new().unwrap();
        create_test_config_file(
            temp_dir.path(),
            r#"
[orchestrator]
budget_ms = 12000

[providers.openai]
kind = "openai-compatible"
model = "gpt-4o-mini"
"#,
        );

        let cli_args = CliArgs {
            hedge_width: Some(1),
            ..Default::default()
        };
        let config = Config::discover_from_with_env(temp_dir.path(), &cli_args, no_env).unwrap();
        let effective = config.effective_config();

        assert_eq!(effective["budget_ms"], ("12000".to_string(), "config".to_string()));
        assert_eq!(effective["hedge_width"], ("1".to_string(), "cli".to_string()));
        assert_eq!(effective["cooldown_secs"].1, "default");
        assert!(effective["providers.openai"].0.contains("gpt-4o-mini"));
    }
}
