use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::chain::{ChainCursor, ProcessorChain};
use super::item::TelemetryItem;
use crate::config::PipelineConfig;
use crate::instrument::{HookRegistry, Instrumentable};

/// Well-known sibling identifiers, agreed out-of-band with the extensions
/// that conventionally carry them. First match wins during discovery.
pub const ANALYTICS_IDENTIFIER: &str = "analytics";
pub const CHANNEL_IDENTIFIER: &str = "channel";
pub const PROPERTIES_IDENTIFIER: &str = "properties";
pub const DEPENDENCY_IDENTIFIER: &str = "dependency";

/// Everything a plugin may need while the pipeline is being assembled:
/// the configuration, the hook registry, the ordered sibling list, and the
/// pipeline start instant. Handed to [`TelemetryPlugin::initialize`]
/// synchronously, before assembly returns.
pub struct InitContext<'a> {
    pub config: &'a PipelineConfig,
    pub registry: &'a Arc<HookRegistry>,
    pub siblings: &'a [Arc<dyn TelemetryPlugin>],
    pub started_at: Instant,
}

impl InitContext<'_> {
    /// Linear scan of the sibling list by exact identifier. First match
    /// wins; `None` means the capability is absent, not an error.
    pub fn find_sibling(&self, identifier: &str) -> Option<Arc<dyn TelemetryPlugin>> {
        self.siblings
            .iter()
            .find(|sibling| sibling.identifier() == identifier)
            .cloned()
    }
}

/// One processor in the telemetry pipeline.
///
/// Plugins are also [`Instrumentable`]: a coordinating sibling may attach
/// hooks to the methods a plugin declares. `process` receives the shared
/// item and a cursor into the remaining chain; not calling
/// `cursor.forward(item)` deliberately drops the item.
pub trait TelemetryPlugin: Instrumentable {
    /// Called once during pipeline assembly, in chain order. The default
    /// does nothing.
    fn initialize(&self, _ctx: &InitContext<'_>) {}

    fn process(&self, item: &mut TelemetryItem, cursor: ChainCursor<'_>);
}

/// Enumerate the externally visible capabilities of a target.
///
/// Underscore-prefixed names are internal and are skipped unless the
/// caller-supplied tracking list names them explicitly (a channel's
/// `_sender` is the canonical case).
pub fn visible_capabilities<'a>(
    target: &'a dyn Instrumentable,
    trackers: &[String],
) -> Vec<&'a str> {
    target
        .instrumentable_methods()
        .iter()
        .copied()
        .filter(|method| !method.starts_with('_') || trackers.iter().any(|t| t == method))
        .collect()
}

/// The assembled pipeline: plugin list order is chain order.
///
/// Assembly initializes every plugin in order with an [`InitContext`]
/// carrying the sibling list, so coordinating plugins can resolve siblings
/// and attach hooks before the first item flows.
pub struct Pipeline {
    chain: ProcessorChain,
    registry: Arc<HookRegistry>,
    config: PipelineConfig,
    started_at: Instant,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, plugins: Vec<Arc<dyn TelemetryPlugin>>) -> Self {
        let registry = Arc::new(HookRegistry::new());
        let started_at = Instant::now();
        let chain = ProcessorChain::new(plugins);

        for plugin in chain.plugins() {
            debug!(plugin = plugin.identifier(), "initializing pipeline plugin");
            plugin.initialize(&InitContext {
                config: &config,
                registry: &registry,
                siblings: chain.plugins(),
                started_at,
            });
        }

        Self {
            chain,
            registry,
            config,
            started_at,
        }
    }

    /// Run one telemetry item through the chain. The item is mutated in
    /// place; a processor that declines to forward leaves it partially
    /// processed, which is a valid outcome.
    pub fn track(&self, item: &mut TelemetryItem) {
        self.chain.process(item);
    }

    pub fn chain(&self) -> &ProcessorChain {
        &self.chain
    }

    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Time since the pipeline was assembled.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
