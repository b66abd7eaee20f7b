use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

use super::item::TelemetryItem;
use super::plugin::TelemetryPlugin;

/// The ordered, immutable sequence of telemetry processors.
///
/// Construction order is traversal order and never changes for the lifetime
/// of the chain. The chain owns the plugin list; it does not own the items
/// it processes.
pub struct ProcessorChain {
    nodes: Vec<Arc<dyn TelemetryPlugin>>,
}

impl ProcessorChain {
    pub fn new(nodes: Vec<Arc<dyn TelemetryPlugin>>) -> Self {
        Self { nodes }
    }

    /// The ordered plugin list, as supplied at construction.
    pub fn plugins(&self) -> &[Arc<dyn TelemetryPlugin>] {
        &self.nodes
    }

    /// Linear scan for a sibling by exact identifier. First match wins; no
    /// match is not an error, the capability is simply absent.
    pub fn find(&self, identifier: &str) -> Option<Arc<dyn TelemetryPlugin>> {
        self.nodes
            .iter()
            .find(|node| node.identifier() == identifier)
            .cloned()
    }

    /// Run one item through the chain from the first node.
    ///
    /// A fresh cursor (and its traversal watermark) is created per item, so
    /// repeated traversals are independent and the shared chain is never
    /// mutated.
    pub fn process(&self, item: &mut TelemetryItem) {
        let watermark = Cell::new(0);
        let cursor = ChainCursor {
            nodes: &self.nodes,
            index: 0,
            watermark: &watermark,
        };
        cursor.forward(item);
    }
}

/// Cursor into the remaining chain after the current processor.
///
/// Passed by value and consumed by [`ChainCursor::forward`], so a processor
/// can forward an item at most once per traversal. A processor that returns
/// without calling `forward` deliberately terminates the traversal; that is
/// an observable outcome, not a failure.
pub struct ChainCursor<'a> {
    nodes: &'a [Arc<dyn TelemetryPlugin>],
    index: usize,
    /// Highest node index entered during this traversal, plus one. Keeps
    /// panic recovery from re-running processors that already saw the item.
    watermark: &'a Cell<usize>,
}

impl ChainCursor<'_> {
    /// Hand the item to the next processor in the chain.
    ///
    /// A panicking processor is logged and skipped: the traversal resumes at
    /// the next node that has not yet seen the item. Each processor is
    /// entered at most once per item per traversal.
    pub fn forward(self, item: &mut TelemetryItem) {
        let mut index = self.index.max(self.watermark.get());
        while index < self.nodes.len() {
            let node = &self.nodes[index];
            self.watermark.set(index + 1);
            let next = ChainCursor {
                nodes: self.nodes,
                index: index + 1,
                watermark: self.watermark,
            };
            match catch_unwind(AssertUnwindSafe(|| node.process(&mut *item, next))) {
                Ok(()) => return,
                Err(_) => {
                    error!(
                        plugin = node.identifier(),
                        "processor panicked; resuming chain at next node"
                    );
                    index = self.watermark.get();
                }
            }
        }
        debug!("telemetry item reached the end of the chain");
    }

    /// Number of processors remaining after the current one.
    pub fn remaining(&self) -> usize {
        self.nodes.len().saturating_sub(self.index)
    }
}
