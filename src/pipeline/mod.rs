pub mod chain;
pub mod item;
pub mod plugin;

pub use chain::{ChainCursor, ProcessorChain};
pub use item::TelemetryItem;
pub use plugin::{
    visible_capabilities, InitContext, Pipeline, TelemetryPlugin, ANALYTICS_IDENTIFIER,
    CHANNEL_IDENTIFIER, DEPENDENCY_IDENTIFIER, PROPERTIES_IDENTIFIER,
};
