use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

use relay_utils::error::ConfigError;

use super::{
    CliArgs, Config, ConfigSource, HealthConfig, OrchestratorConfig, PromptsConfig,
    ProviderConfig, TelemetryConfig,
};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "RELAY_CONFIG";
/// Environment override for `[orchestrator] budget_ms`
pub const BUDGET_ENV: &str = "RELAY_BUDGET_MS";
/// Environment override for `[orchestrator] hedge_width`
pub const HEDGE_WIDTH_ENV: &str = "RELAY_HEDGE_WIDTH";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    orchestrator: Option<OrchestratorConfig>,
    health: Option<HealthConfig>,
    telemetry: Option<TelemetryConfig>,
    prompts: Option<PromptsConfig>,
    providers: Option<BTreeMap<String, ProviderConfig>>,
}

/// Keys whose built-in default is recorded in the attribution map
const DEFAULTED_KEYS: &[&str] = &[
    "budget_ms",
    "hedge_width",
    "start_buffer_ms",
    "budget_enforcement",
    "cooldown_secs",
    "failure_threshold",
    "latency_window",
    "telemetry_sink",
];

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no explicit
    /// path is provided.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover configuration starting from a specific directory, reading the
    /// process environment.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        Self::discover_from_with_env(start_dir, cli_args, |key| std::env::var(key).ok())
    }

    /// Path-and-environment driven discovery.
    ///
    /// `env` looks up environment variables, which lets tests avoid mutating
    /// process-global state.
    pub fn discover_from_with_env<F>(start_dir: &Path, cli_args: &CliArgs, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut source_attribution = HashMap::new();

        let mut orchestrator = OrchestratorConfig::default();
        let mut health = HealthConfig::default();
        let mut telemetry = TelemetryConfig::default();
        let mut prompts = PromptsConfig::default();
        let mut providers = BTreeMap::new();

        for key in DEFAULTED_KEYS {
            source_attribution.insert((*key).to_string(), ConfigSource::Default);
        }

        // Explicit path: --config, then RELAY_CONFIG. Both must exist.
        let explicit_path = cli_args
            .config_path
            .clone()
            .or_else(|| env(CONFIG_ENV).filter(|p| !p.is_empty()).map(PathBuf::from));

        let config_path = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.display().to_string(),
                    }
                    .into());
                }
                Some(path)
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        if let Some(path) = &config_path {
            debug!(path = %path.display(), "Loading config file");
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;

            let src = ConfigSource::Config;

            if let Some(file_orch) = file_config.orchestrator {
                if file_orch.budget_ms.is_some() {
                    orchestrator.budget_ms = file_orch.budget_ms;
                    source_attribution.insert("budget_ms".to_string(), src.clone());
                }
                if file_orch.hedge_width.is_some() {
                    orchestrator.hedge_width = file_orch.hedge_width;
                    source_attribution.insert("hedge_width".to_string(), src.clone());
                }
                if file_orch.start_buffer_ms.is_some() {
                    orchestrator.start_buffer_ms = file_orch.start_buffer_ms;
                    source_attribution.insert("start_buffer_ms".to_string(), src.clone());
                }
                if file_orch.budget_enforcement.is_some() {
                    orchestrator.budget_enforcement = file_orch.budget_enforcement;
                    source_attribution.insert("budget_enforcement".to_string(), src.clone());
                }
                if file_orch.providers.is_some() {
                    orchestrator.providers = file_orch.providers;
                    source_attribution.insert("provider_order".to_string(), src.clone());
                }
            }

            if let Some(file_health) = file_config.health {
                if file_health.cooldown_secs.is_some() {
                    health.cooldown_secs = file_health.cooldown_secs;
                    source_attribution.insert("cooldown_secs".to_string(), src.clone());
                }
                if file_health.failure_threshold.is_some() {
                    health.failure_threshold = file_health.failure_threshold;
                    source_attribution.insert("failure_threshold".to_string(), src.clone());
                }
                if file_health.latency_window.is_some() {
                    health.latency_window = file_health.latency_window;
                    source_attribution.insert("latency_window".to_string(), src.clone());
                }
            }

            if let Some(file_telemetry) = file_config.telemetry {
                if file_telemetry.sink.is_some() {
                    telemetry.sink = file_telemetry.sink;
                    source_attribution.insert("telemetry_sink".to_string(), src.clone());
                }
                if file_telemetry.path.is_some() {
                    telemetry.path = file_telemetry.path;
                    source_attribution.insert("telemetry_path".to_string(), src.clone());
                }
            }

            if let Some(file_prompts) = file_config.prompts
                && file_prompts.dir.is_some()
            {
                // Relative prompt dirs resolve against the project root (parent of `.relay/`)
                prompts.dir = file_prompts.dir.map(|dir| resolve_relative(path, dir));
                source_attribution.insert("prompts_dir".to_string(), src.clone());
            }

            if let Some(file_providers) = file_config.providers {
                for id in file_providers.keys() {
                    source_attribution.insert(format!("providers.{id}"), src.clone());
                }
                providers = file_providers;
            }
        }

        // Environment overrides
        if let Some(raw) = env(BUDGET_ENV) {
            let budget_ms = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: BUDGET_ENV.to_string(),
                value: format!("'{raw}' is not a whole number of milliseconds"),
            })?;
            orchestrator.budget_ms = Some(budget_ms);
            source_attribution.insert("budget_ms".to_string(), ConfigSource::Env);
        }
        if let Some(raw) = env(HEDGE_WIDTH_ENV) {
            let width = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: HEDGE_WIDTH_ENV.to_string(),
                    value: format!("'{raw}' is not a whole number"),
                })?;
            orchestrator.hedge_width = Some(width);
            source_attribution.insert("hedge_width".to_string(), ConfigSource::Env);
        }

        // CLI overrides
        if let Some(budget_ms) = cli_args.budget_ms {
            orchestrator.budget_ms = Some(budget_ms);
            source_attribution.insert("budget_ms".to_string(), ConfigSource::Cli);
        }
        if let Some(width) = cli_args.hedge_width {
            orchestrator.hedge_width = Some(width);
            source_attribution.insert("hedge_width".to_string(), ConfigSource::Cli);
        }
        if let Some(dir) = &cli_args.prompts_dir {
            prompts.dir = Some(dir.clone());
            source_attribution.insert("prompts_dir".to_string(), ConfigSource::Cli);
        }

        let config = Self {
            orchestrator,
            health,
            telemetry,
            prompts,
            providers,
            source_attribution,
        };

        config.validate()?;

        Ok(config)
    }

    /// Discover a config file by searching upward from a given directory
    ///
    /// Walks up the directory tree looking for `.relay/config.toml`, stopping
    /// at repository root markers (.git, .hg, .svn) or the filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(".relay").join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(e.to_string()))?;
        Ok(config)
    }
}

fn resolve_relative(config_path: &Path, dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        return dir;
    }
    let base = config_path
        .parent()
        .and_then(|relay_dir| {
            if relay_dir.file_name().is_some_and(|name| name == ".relay") {
                relay_dir.parent()
            } else {
                Some(relay_dir)
            }
        })
        .unwrap_or_else(|| Path::new("."));
    base.join(dir)
}
