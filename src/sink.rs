use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// One rendered sink entry: elapsed seconds since pipeline start, a label,
/// and the payload that was logged.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkEntry {
    pub elapsed_secs: f64,
    pub label: String,
    pub payload: Value,
}

/// External display collaborator for instrumented-call and item logging.
///
/// The core guarantees it calls the sink synchronously from inside the
/// observer or processor; how the sink renders is its own business.
pub trait LogSink: Send + Sync {
    fn entry(&self, elapsed: Duration, label: &str, payload: &Value);
}

/// Sink that emits entries through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn entry(&self, elapsed: Duration, label: &str, payload: &Value) {
        info!(
            elapsed_secs = elapsed.as_secs_f64(),
            label, %payload, "telemetry log entry"
        );
    }
}

/// Sink that buffers entries in memory, for tests and in-process viewers.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<SinkEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<SinkEntry> {
        self.entries.lock().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.label.clone()).collect()
    }
}

impl LogSink for MemorySink {
    fn entry(&self, elapsed: Duration, label: &str, payload: &Value) {
        self.entries.lock().push(SinkEntry {
            elapsed_secs: elapsed.as_secs_f64(),
            label: label.to_string(),
            payload: payload.clone(),
        });
    }
}
