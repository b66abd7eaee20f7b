pub mod details;
pub mod registry;
pub mod target;

pub use details::{CallDetails, CallOutcome};
pub use registry::{HookCallbacks, HookRegistry, ObserverHandle, PostObserver, PreObserver};
pub use target::Instrumentable;
