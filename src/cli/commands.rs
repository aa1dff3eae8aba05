//! CLI command implementations
//!
//! Each `execute_*` function prints its own output and returns the exit code to
//! use on failure.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    Config, DirectoryPromptSource, ExitCode, JsonSchema, Orchestrator, RunOptions, RunReport,
    SetupError, Task, UserFriendlyError, Vars,
};

/// Prompt directory used when neither `[prompts] dir` nor `--prompts-dir` is set
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

// ============================================================================
// Run Command
// ============================================================================

pub struct RunRequest {
    pub task_id: String,
    pub template: String,
    pub schema: PathBuf,
    pub vars: Vec<(String, String)>,
    pub providers: Vec<String>,
    pub json: bool,
}

/// Execute one extraction task
pub async fn execute_run_command(config: &Config, request: RunRequest) -> Result<(), ExitCode> {
    let schema = JsonSchema::from_file(&request.schema).map_err(|e| {
        eprintln!("Error: {e}");
        ExitCode::CLI_ARGS
    })?;

    let prompts_dir = config
        .prompts
        .dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPTS_DIR));
    debug!(dir = %prompts_dir.display(), "Using prompt directory");
    let prompts = Arc::new(DirectoryPromptSource::new(prompts_dir));

    let orchestrator = Orchestrator::from_config(config, prompts).map_err(|e| {
        report_setup_error(&e);
        ExitCode::CLI_ARGS
    })?;

    let task = Task::new(request.task_id, request.template, schema);
    let vars: Vars = request
        .vars
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    let mut options = RunOptions::new();
    if !request.providers.is_empty() {
        options = options.with_providers(request.providers);
    }

    let result = orchestrator.run(&task, &vars, options).await;
    orchestrator.close().await;

    if request.json {
        print_json(&RunReport::new(&task.id, &result))?;
        return result.map(|_| ()).map_err(|e| e.exit_code());
    }

    match result {
        Ok(extraction) => {
            eprintln!(
                "✓ {} answered (retries: {}, {} ms{})",
                extraction.provider,
                extraction.retries,
                extraction.elapsed_ms,
                if extraction.repaired { ", repaired" } else { "" }
            );
            print_json(&extraction.parsed_data)
        }
        Err(error) => {
            eprint!("{}", error.display_for_user());
            Err(error.exit_code())
        }
    }
}

fn report_setup_error(error: &SetupError) {
    match error {
        SetupError::Provider(e) => eprint!("{}", e.display_for_user()),
        SetupError::Config(e) => eprint!("{}", e.display_for_user()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ExitCode> {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: failed to serialize output: {e}");
            Err(ExitCode::INTERNAL)
        }
    }
}

// ============================================================================
// Providers Command
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderListing {
    id: String,
    kind: String,
    model: Option<String>,
    enabled: bool,
    timeout_ms: u64,
}

/// List configured providers with their enabled state and timeout
pub fn execute_providers_command(config: &Config, json: bool) -> Result<(), ExitCode> {
    let adapters = relay_llm::adapters_from_config(config).map_err(|e| {
        eprint!("{}", e.display_for_user());
        ExitCode::CLI_ARGS
    })?;

    let listings: Vec<ProviderListing> = adapters
        .iter()
        .map(|adapter| {
            let provider = config.providers.get(adapter.id());
            ProviderListing {
                id: adapter.id().to_string(),
                kind: provider.map(|p| p.kind.clone()).unwrap_or_default(),
                model: provider.and_then(|p| p.model.clone()),
                enabled: adapter.identity().enabled,
                timeout_ms: adapter.identity().timeout.as_millis() as u64,
            }
        })
        .collect();

    if json {
        return print_json(&listings);
    }

    if listings.is_empty() {
        println!("No providers configured.");
        println!("Add a [providers.<id>] section to .relay/config.toml");
        return Ok(());
    }

    println!("Providers (in candidate order):");
    for listing in &listings {
        let marker = if listing.enabled { "✓" } else { "✗" };
        println!(
            "  {marker} {:<16} {:<18} {:<28} timeout {} ms",
            listing.id,
            listing.kind,
            listing.model.as_deref().unwrap_or("-"),
            listing.timeout_ms
        );
    }
    Ok(())
}

// ============================================================================
// Config Command
// ============================================================================

/// Print the effective configuration with the source of each value
pub fn execute_config_command(config: &Config) -> Result<(), ExitCode> {
    let effective = config.effective_config();
    let mut keys: Vec<&String> = effective.keys().collect();
    keys.sort();

    println!("Effective configuration:");
    for key in keys {
        if let Some((value, source)) = effective.get(key) {
            println!("  {key} = {value}  ({source})");
        }
    }

    let ids = config.provider_ids();
    if ids.is_empty() {
        println!("\nNo providers configured.");
    } else {
        println!("\nProviders: {}", ids.join(", "));
    }
    Ok(())
}
