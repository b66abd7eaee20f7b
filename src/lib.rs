//! tracekit — method-instrumentation hooks and a chained telemetry pipeline.
//!
//! Two primitives, built bottom-up:
//!
//! - [`instrument::HookRegistry`] wraps declared methods on a target so
//!   observers fire before and after the original call without changing its
//!   behavior, arguments, or result. Multiple independent attachments stack
//!   on the same method; the original runs exactly once per call.
//! - [`pipeline::ProcessorChain`] runs telemetry items through an ordered
//!   sequence of processors, each free to mutate the item, forward it, or
//!   deliberately drop it.
//!
//! Plugins consume both: they discover siblings in the chain by identifier,
//!   attach hooks on their declared methods, and forward items via the
//!   by-value chain cursor. [`plugins::DebugPlugin`] and
//!   [`plugins::DeviceInfoPlugin`] are the bundled consumers.
//!
//! The whole core is synchronous and run-to-completion: observers and
//! processors execute on the caller's stack, and failures inside them are
//! logged and contained rather than surfaced to the instrumented call.

pub mod config;
pub mod error;
pub mod instrument;
pub mod pipeline;
pub mod plugins;
pub mod sink;

pub use config::{load_config, PipelineConfig};
pub use error::{AttachError, InvokeError};
pub use instrument::{
    CallDetails, CallOutcome, HookCallbacks, HookRegistry, Instrumentable, ObserverHandle,
};
pub use pipeline::{ChainCursor, InitContext, Pipeline, ProcessorChain, TelemetryItem, TelemetryPlugin};
pub use plugins::{DebugPlugin, DeviceInfoPlugin};
pub use sink::{LogSink, MemorySink, TracingSink};
