//! Logging and observability setup
//!
//! Structured logging through `tracing`. Library crates only emit events; the binary
//! installs the subscriber via [`init_tracing`].

use std::io::IsTerminal;
use tracing::{Level, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::types::ErrorKind;

/// Check if colored output should be used.
///
/// Returns true only if stderr is a terminal and `NO_COLOR` is not set.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins when set. Otherwise verbose mode logs relay crates at debug level,
/// and the default logs them at info.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("relay=debug,info")
            } else {
                EnvFilter::try_new("relay=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering one orchestration run
pub fn run_span(task_id: &str) -> tracing::Span {
    span!(Level::INFO, "orchestration_run", task = %task_id)
}

/// Log the start of an orchestration run
pub fn log_run_start(task_id: &str, candidates: usize, budget_ms: u128) {
    info!(
        task = %task_id,
        candidates = candidates,
        budget_ms = %budget_ms,
        "Starting orchestration run"
    );
}

/// Log a successful run
pub fn log_run_complete(task_id: &str, provider: &str, retries: u32, elapsed_ms: u128) {
    info!(
        task = %task_id,
        provider = %provider,
        retries = retries,
        elapsed_ms = %elapsed_ms,
        "Orchestration run succeeded"
    );
}

/// Log a failed run
pub fn log_run_failure(task_id: &str, kind: ErrorKind, elapsed_ms: u128) {
    warn!(
        task = %task_id,
        error_kind = %kind,
        elapsed_ms = %elapsed_ms,
        "Orchestration run failed"
    );
}
