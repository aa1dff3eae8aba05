//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, installs logging, discovers configuration and
//! dispatches to the command handlers. It owns ALL output, including errors.

use clap::Parser;

use super::args::{Cli, Commands};
use super::commands::{self, RunRequest};
use crate::{CliArgs, Config, ConfigError, ExitCode, UserFriendlyError};

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` after printing the error; main.rs only maps it to the
/// process exit status.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = relay_utils::logging::init_tracing(cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        budget_ms: cli.budget_ms,
        hedge_width: cli.hedge_width,
        prompts_dir: cli.prompts_dir.clone(),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            report_config_error(&err);
            return Err(ExitCode::CLI_ARGS);
        }
    };

    match cli.command {
        Commands::Config => commands::execute_config_command(&config),
        Commands::Providers { json } => commands::execute_providers_command(&config, json),
        Commands::Run {
            task_id,
            template,
            schema,
            vars,
            providers,
            json,
        } => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("Error: failed to create async runtime: {e}");
                    return Err(ExitCode::INTERNAL);
                }
            };
            let request = RunRequest {
                task_id,
                template,
                schema,
                vars,
                providers,
                json,
            };
            rt.block_on(commands::execute_run_command(&config, request))
        }
    }
}

/// Typed configuration errors get the full error/context/suggestions block
fn report_config_error(err: &anyhow::Error) {
    match err.downcast_ref::<ConfigError>() {
        Some(config_err) => eprint!("{}", config_err.display_for_user()),
        None => eprintln!("Error: {err:#}"),
    }
}
