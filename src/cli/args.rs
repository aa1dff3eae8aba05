//! CLI argument definitions and parsing structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// relay - resilient multi-provider structured extraction
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Ask several LLM providers for structured JSON and keep the first valid reply")]
#[command(long_about = r#"
relay renders a prompt template, races the healthiest configured providers,
retries each once with a stricter JSON-only prompt, validates every reply
against a JSON Schema and returns the first one that passes, all within a
wall-clock budget.

EXAMPLES:
  # Extract an invoice with the template prompts/invoice.txt
  relay run invoice-42 --template invoice --schema schemas/invoice.json \
      --var document="$(cat invoice.txt)"

  # Restrict the run to two providers and a 10 second budget
  relay run invoice-42 --template invoice --schema schemas/invoice.json \
      --provider openai --provider claude --budget-ms 10000

  # Show which providers are enabled
  relay providers

  # Show the effective configuration and where each value came from
  relay config

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > environment > config file > defaults
  The config file is discovered by searching upward from CWD for .relay/config.toml
  Use --config or RELAY_CONFIG to specify an explicit config file path
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Wall-clock budget for a run in milliseconds
    #[arg(long, global = true)]
    pub budget_ms: Option<u64>,

    /// Number of providers raced concurrently in the hedge round
    #[arg(long, global = true)]
    pub hedge_width: Option<usize>,

    /// Directory holding prompt templates
    #[arg(long, global = true)]
    pub prompts_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one extraction task
    Run {
        /// Task identifier, used in logs, telemetry and the report
        task_id: String,

        /// Prompt template name
        #[arg(long)]
        template: String,

        /// JSON Schema file the reply must satisfy
        #[arg(long)]
        schema: PathBuf,

        /// Template variable as key=value (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Restrict the run to these providers (repeatable, in preference order)
        #[arg(long = "provider", value_name = "ID")]
        providers: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured providers
    Providers {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration with source attribution
    Config,
}

/// Parse a `key=value` template variable
pub(crate) fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("variable name is empty in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Build the clap command (for completions and argument tests)
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
