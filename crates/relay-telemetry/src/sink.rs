//! Telemetry sinks
//!
//! `record` never blocks and never fails: telemetry is best-effort and must not
//! slow the orchestration path down.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::event::AttemptEvent;

/// Default capacity of the [`JsonlSink`] queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Receiver of attempt events
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: AttemptEvent);

    /// Stop accepting events and wait until everything queued has been written
    async fn close(&self) {}
}

/// Emits each event as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: AttemptEvent) {
        let error = event.error.map(|kind| kind.as_str());
        if event.success {
            debug!(
                target: "relay::telemetry",
                task = %event.task,
                provider = %event.provider,
                round = %event.round,
                attempt = %event.attempt,
                latency_ms = event.latency_ms,
                json_ok = ?event.json_ok,
                retries = event.retries,
                circuit_before = %event.circuit_before,
                circuit_after = %event.circuit_after,
                "attempt"
            );
        } else {
            info!(
                target: "relay::telemetry",
                task = %event.task,
                provider = %event.provider,
                round = %event.round,
                attempt = %event.attempt,
                latency_ms = event.latency_ms,
                error = ?error,
                retries = event.retries,
                circuit_before = %event.circuit_before,
                circuit_after = %event.circuit_after,
                "attempt failed"
            );
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&self, _event: AttemptEvent) {}
}

/// Keeps events in memory, for tests and embedding callers
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AttemptEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<AttemptEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: AttemptEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Forwards every event to each inner sink
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl TelemetrySink for FanoutSink {
    fn record(&self, event: AttemptEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }

    async fn close(&self) {
        for sink in &self.sinks {
            sink.close().await;
        }
    }
}

/// Appends one JSON object per line to a file.
///
/// Events go through a bounded queue to a background writer task. When the queue
/// is full the event is dropped and counted; `record` never waits.
pub struct JsonlSink {
    path: PathBuf,
    tx: Mutex<Option<mpsc::Sender<AttemptEvent>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    dropped: Arc<AtomicU64>,
}

impl JsonlSink {
    /// Start the writer task. Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, DEFAULT_QUEUE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let writer = tokio::spawn(write_events(path.clone(), rx));
        Self {
            path,
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events discarded because the queue was full or already closed
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TelemetrySink for JsonlSink {
    fn record(&self, event: AttemptEvent) {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        if let Err(e) = tx.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    debug!(path = %self.path.display(), "Telemetry queue full, event dropped");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    debug!(path = %self.path.display(), "Telemetry writer gone, event dropped");
                }
            }
        }
    }

    async fn close(&self) {
        drop(self.tx.lock().unwrap_or_else(PoisonError::into_inner).take());
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(writer) = writer
            && let Err(e) = writer.await
        {
            warn!(path = %self.path.display(), error = %e, "Telemetry writer task failed");
        }
    }
}

async fn write_events(path: PathBuf, mut rx: mpsc::Receiver<AttemptEvent>) {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        warn!(path = %path.display(), error = %e, "Cannot create telemetry directory");
    }

    let mut file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot open telemetry file, discarding events");
            while rx.recv().await.is_some() {}
            return;
        }
    };

    while let Some(event) = rx.recv().await {
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize telemetry event");
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!(path = %path.display(), error = %e, "Failed to append telemetry event");
        }
    }

    if let Err(e) = file.flush().await {
        warn!(path = %path.display(), error = %e, "Failed to flush telemetry file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AttemptKind, Round};
    use chrono::Utc;
    use relay_utils::CircuitState;

    fn event(provider: &str) -> AttemptEvent {
        AttemptEvent {
            ts: Utc::now(),
            task: "t".to_string(),
            provider: provider.to_string(),
            round: Round::Sequential,
            attempt: AttemptKind::Base,
            success: true,
            retries: 0,
            latency_ms: 10,
            json_ok: Some(true),
            circuit_before: CircuitState::Closed,
            circuit_after: CircuitState::Closed,
            error: None,
        }
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let fanout = FanoutSink::default()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(NullSink));

        fanout.record(event("x"));
        assert_eq!(a.len(), 1);
        assert_eq!(b.events()[0].provider, "x");
    }

    #[tokio::test]
    async fn test_jsonl_appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("attempts.jsonl");

        let sink = JsonlSink::spawn(&path);
        sink.record(event("a"));
        sink.record(event("b"));
        sink.close().await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: AttemptEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.provider, "b");
        assert_eq!(sink.dropped(), 0);
    }

    #[tokio::test]
    async fn test_jsonl_counts_events_after_close_as_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::spawn(dir.path().join("t.jsonl"));
        sink.close().await;

        sink.record(event("late"));
        assert_eq!(sink.dropped(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_jsonl_full_queue_drops_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::with_capacity(dir.path().join("t.jsonl"), 1);

        // The writer task cannot run until this task yields, so the queue holds one.
        for i in 0..5 {
            sink.record(event(&format!("p{i}")));
        }
        assert_eq!(sink.dropped(), 4);
        sink.close().await;
    }
}
