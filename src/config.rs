use anyhow::{bail, Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Pipeline configuration, loadable from TOML.
///
/// `trackers` is the list of method names the debug observer instruments;
/// `watch` names the sibling identifiers it instruments them on. Both have
/// defaults mirroring the conventional extension set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    /// Method names to intercept on watched siblings. Underscore-prefixed
    /// names are internal and must be listed here explicitly to be tracked.
    pub trackers: Vec<String>,

    /// Sibling identifiers whose methods get instrumented.
    pub watch: Vec<String>,

    /// Skip device-info enrichment entirely. Collection is on by default.
    pub disable_device_collection: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            trackers: default_trackers(),
            watch: default_watch(),
            disable_device_collection: false,
        }
    }
}

fn default_trackers() -> Vec<String> {
    [
        "track_event",
        "track_page_view",
        "track_page_view_performance",
        "track_exception",
        "track_trace",
        "track_metric",
        "track_dependency",
        "throw_internal",
        "log_internal_message",
        "trigger_send",
        "_sender",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_watch() -> Vec<String> {
    [
        crate::pipeline::ANALYTICS_IDENTIFIER,
        crate::pipeline::PROPERTIES_IDENTIFIER,
        crate::pipeline::DEPENDENCY_IDENTIFIER,
        crate::pipeline::CHANNEL_IDENTIFIER,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl PipelineConfig {
    /// Parse and validate a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(text).context("failed to parse pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.trackers.iter().any(|t| t.is_empty()) {
            bail!("tracker names must be non-empty");
        }
        if self.watch.iter().any(|w| w.is_empty()) {
            bail!("watched sibling identifiers must be non-empty");
        }
        Ok(())
    }
}

/// Load a pipeline config from a TOML file.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    PipelineConfig::from_toml(&text)
        .with_context(|| format!("invalid pipeline config {}", path.display()))
}
