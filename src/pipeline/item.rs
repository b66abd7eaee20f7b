use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One discrete telemetry record flowing through the processor chain.
///
/// The item is shared, mutable state for the duration of a single traversal:
/// every processor sees the mutations of the processors before it. `ext` is
/// an open set of named extension sections (device info, exception detail,
/// whatever a processor wants to contribute).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryItem {
    pub name: String,
    #[serde(default)]
    pub base_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ext: BTreeMap<String, Value>,
}

impl TelemetryItem {
    pub fn new(name: impl Into<String>, base_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: base_type.into(),
            ext: BTreeMap::new(),
        }
    }

    /// Read an extension section, if present.
    pub fn ext_section(&self, section: &str) -> Option<&Value> {
        self.ext.get(section)
    }

    /// Insert or replace an extension section.
    pub fn set_ext_section(&mut self, section: impl Into<String>, value: Value) {
        self.ext.insert(section.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ext_sections_round_trip_through_serde() {
        let mut item = TelemetryItem::new("pageview", "PageviewData");
        item.set_ext_section("device", json!({"localId": "d1"}));

        let encoded = serde_json::to_string(&item).unwrap();
        let decoded: TelemetryItem = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, item);
        assert_eq!(
            decoded.ext_section("device"),
            Some(&json!({"localId": "d1"}))
        );
    }

    #[test]
    fn missing_ext_is_not_serialized() {
        let item = TelemetryItem::new("event", "EventData");
        let encoded = serde_json::to_string(&item).unwrap();
        assert!(!encoded.contains("ext"));
    }
}
