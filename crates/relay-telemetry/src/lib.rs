//! Attempt telemetry for relay
//!
//! The orchestrator emits exactly one [`AttemptEvent`] per provider attempt.
//! Sinks are append-only and best-effort.

mod event;
mod sink;

pub use event::{AttemptEvent, AttemptKind, Round};
pub use sink::{
    DEFAULT_QUEUE_CAPACITY, FanoutSink, JsonlSink, MemorySink, NullSink, TelemetrySink,
    TracingSink,
};

use relay_config::{Config, TelemetrySinkKind};
use relay_utils::ConfigError;
use std::sync::Arc;

/// Build the sink selected by `[telemetry] sink`.
///
/// A JSONL sink spawns its writer task, so this must run inside a tokio runtime
/// when `sink = "jsonl"`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingRequired`] if the JSONL sink has no path.
pub fn sink_from_config(config: &Config) -> Result<Arc<dyn TelemetrySink>, ConfigError> {
    let sink: Arc<dyn TelemetrySink> = match config.telemetry_sink() {
        TelemetrySinkKind::Tracing => Arc::new(TracingSink),
        TelemetrySinkKind::None => Arc::new(NullSink),
        TelemetrySinkKind::Jsonl => {
            let path = config.telemetry.path.clone().ok_or_else(|| {
                ConfigError::MissingRequired("telemetry.path (required when sink = \"jsonl\")".to_string())
            })?;
            Arc::new(JsonlSink::spawn(path))
        }
    };
    Ok(sink)
}
