use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::instrument::{
    CallDetails, CallOutcome, HookCallbacks, HookRegistry, Instrumentable, ObserverHandle,
};
use crate::pipeline::{visible_capabilities, ChainCursor, InitContext, TelemetryItem, TelemetryPlugin};
use crate::sink::LogSink;

pub const DEBUG_IDENTIFIER: &str = "debug";

/// Debug observer plugin.
///
/// During initialization it resolves the watched siblings from the chain,
/// builds a per-sibling allow-list from each sibling's declared capability
/// set, and attaches pre/post hooks for every tracked method. Each
/// intercepted call increments the method's bin and produces a timestamped
/// sink entry; each item flowing through the chain is logged after
/// forwarding, so the entry reflects downstream mutations.
pub struct DebugPlugin {
    sink: Arc<dyn LogSink>,
    /// Explicit tracker override; falls back to the pipeline config.
    trackers: Option<Vec<String>>,
    /// Per-tracked-method interception counters.
    bins: Arc<Mutex<BTreeMap<String, u64>>>,
    /// Siblings resolved at initialization, kept for out-of-band access.
    resolved: Mutex<BTreeMap<String, Arc<dyn TelemetryPlugin>>>,
    handles: Mutex<Vec<ObserverHandle>>,
    registry: Mutex<Option<Arc<HookRegistry>>>,
    started_at: Mutex<Option<Instant>>,
}

impl DebugPlugin {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            trackers: None,
            bins: Arc::new(Mutex::new(BTreeMap::new())),
            resolved: Mutex::new(BTreeMap::new()),
            handles: Mutex::new(Vec::new()),
            registry: Mutex::new(None),
            started_at: Mutex::new(None),
        }
    }

    /// Track a specific method list instead of the configured one.
    pub fn with_trackers(sink: Arc<dyn LogSink>, trackers: Vec<String>) -> Self {
        Self {
            trackers: Some(trackers),
            ..Self::new(sink)
        }
    }

    /// Interception count for one tracked method.
    pub fn bin(&self, method: &str) -> u64 {
        self.bins.lock().get(method).copied().unwrap_or(0)
    }

    /// Snapshot of all bins.
    pub fn bins(&self) -> BTreeMap<String, u64> {
        self.bins.lock().clone()
    }

    /// A sibling resolved during initialization, if it was present.
    pub fn sibling(&self, identifier: &str) -> Option<Arc<dyn TelemetryPlugin>> {
        self.resolved.lock().get(identifier).cloned()
    }

    /// Detach every observer this plugin attached. After this the watched
    /// siblings behave exactly as before initialization.
    pub fn detach_all(&self) {
        let registry = self.registry.lock().clone();
        let Some(registry) = registry else {
            return;
        };
        for handle in self.handles.lock().drain(..) {
            registry.detach(&handle);
        }
    }

    fn elapsed(&self) -> Duration {
        match *self.started_at.lock() {
            Some(start) => start.elapsed(),
            None => Duration::ZERO,
        }
    }

    fn attach_trackers(
        &self,
        ctx: &InitContext<'_>,
        sibling: &Arc<dyn TelemetryPlugin>,
        trackers: &[String],
    ) {
        let allowed = visible_capabilities(sibling.as_ref(), trackers);
        for method in allowed {
            if !trackers.iter().any(|t| t == method) {
                continue;
            }

            let bins = self.bins.clone();
            let tracked = method.to_string();
            let pre = move |details: &mut CallDetails| {
                *bins.lock().entry(tracked.clone()).or_insert(0) += 1;
                debug!(
                    target_id = %details.target,
                    method = %details.method,
                    "intercepted call"
                );
            };

            let sink = self.sink.clone();
            let started = ctx.started_at;
            let post = move |details: &mut CallDetails, outcome: &CallOutcome| {
                let payload = json!({
                    "target": details.target,
                    "method": details.method,
                    "args": details.args,
                    "meta": details.meta,
                    "result": outcome.value(),
                    "failed": outcome.is_failure(),
                });
                let label = format!("{}.{}", details.target, details.method);
                sink.entry(started.elapsed(), &label, &payload);
            };

            match ctx.registry.attach(
                sibling.as_ref(),
                method,
                HookCallbacks::pre(pre).with_post(post),
            ) {
                Ok(handle) => self.handles.lock().push(handle),
                Err(err) => debug!(%err, "skipping tracker"),
            }
        }
    }
}

impl Instrumentable for DebugPlugin {
    fn identifier(&self) -> &str {
        DEBUG_IDENTIFIER
    }
}

impl TelemetryPlugin for DebugPlugin {
    fn initialize(&self, ctx: &InitContext<'_>) {
        *self.started_at.lock() = Some(ctx.started_at);
        *self.registry.lock() = Some(ctx.registry.clone());

        let trackers = self
            .trackers
            .clone()
            .unwrap_or_else(|| ctx.config.trackers.clone());

        for watched in &ctx.config.watch {
            let Some(sibling) = ctx.find_sibling(watched) else {
                debug!(identifier = %watched, "watched sibling absent; skipping");
                continue;
            };
            if sibling.identifier() == self.identifier() {
                continue;
            }
            self.attach_trackers(ctx, &sibling, &trackers);
            self.resolved.lock().insert(watched.clone(), sibling);
        }

        let config_payload =
            serde_json::to_value(ctx.config).unwrap_or(Value::Null);
        self.sink.entry(Duration::ZERO, "config", &config_payload);
    }

    fn process(&self, item: &mut TelemetryItem, cursor: ChainCursor<'_>) {
        debug!(name = %item.name, "debug plugin observed item");
        cursor.forward(item);
        let payload = serde_json::to_value(&*item).unwrap_or(Value::Null);
        self.sink.entry(self.elapsed(), &item.base_type, &payload);
    }
}
