use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::InvokeError;
use crate::instrument::Instrumentable;
use crate::pipeline::{ChainCursor, InitContext, TelemetryItem, TelemetryPlugin};

pub const DEVICE_IDENTIFIER: &str = "device";

/// Device metadata contributed to the `device` extension section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub local_id: Option<String>,
    pub model: Option<String>,
    pub device_class: Option<String>,
}

impl DeviceInfo {
    fn is_empty(&self) -> bool {
        self.local_id.is_none() && self.model.is_none() && self.device_class.is_none()
    }

    fn to_section(&self) -> Value {
        let mut section = serde_json::Map::new();
        if let Some(id) = &self.local_id {
            section.insert("localId".to_string(), json!(id));
        }
        if let Some(model) = &self.model {
            section.insert("model".to_string(), json!(model));
        }
        if let Some(class) = &self.device_class {
            section.insert("deviceClass".to_string(), json!(class));
        }
        Value::Object(section)
    }
}

/// Device-info enricher.
///
/// Writes the current [`DeviceInfo`] into every forwarded item's `device`
/// extension section. Collection is on by default and can be turned off via
/// `disable_device_collection` in the pipeline config; a disabled enricher
/// forwards items untouched.
///
/// The setters are part of the declared capability set, so a coordinating
/// sibling can observe them through the hook registry.
pub struct DeviceInfoPlugin {
    device: RwLock<DeviceInfo>,
    enabled: AtomicBool,
}

impl Default for DeviceInfoPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceInfoPlugin {
    pub fn new() -> Self {
        Self {
            device: RwLock::new(DeviceInfo::default()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn with_device(device: DeviceInfo) -> Self {
        Self {
            device: RwLock::new(device),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn device(&self) -> DeviceInfo {
        self.device.read().clone()
    }

    pub fn set_device_id(&self, id: impl Into<String>) {
        self.device.write().local_id = Some(id.into());
    }

    pub fn set_device_model(&self, model: impl Into<String>) {
        self.device.write().model = Some(model.into());
    }

    pub fn set_device_class(&self, class: impl Into<String>) {
        self.device.write().device_class = Some(class.into());
    }

    fn string_arg(&self, method: &str, args: &[Value]) -> Result<String, InvokeError> {
        args.first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                InvokeError::failed(DEVICE_IDENTIFIER, method, "expected one string argument")
            })
    }
}

impl Instrumentable for DeviceInfoPlugin {
    fn identifier(&self) -> &str {
        DEVICE_IDENTIFIER
    }

    fn instrumentable_methods(&self) -> &[&str] {
        &["set_device_id", "set_device_model", "set_device_class"]
    }

    fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
        match method {
            "set_device_id" => {
                self.set_device_id(self.string_arg(method, args)?);
                Ok(Value::Null)
            }
            "set_device_model" => {
                self.set_device_model(self.string_arg(method, args)?);
                Ok(Value::Null)
            }
            "set_device_class" => {
                self.set_device_class(self.string_arg(method, args)?);
                Ok(Value::Null)
            }
            other => Err(InvokeError::NotCallable {
                target: DEVICE_IDENTIFIER.to_string(),
                method: other.to_string(),
            }),
        }
    }
}

impl TelemetryPlugin for DeviceInfoPlugin {
    fn initialize(&self, ctx: &InitContext<'_>) {
        self.enabled
            .store(!ctx.config.disable_device_collection, Ordering::SeqCst);
    }

    fn process(&self, item: &mut TelemetryItem, cursor: ChainCursor<'_>) {
        if self.enabled.load(Ordering::SeqCst) {
            let device = self.device.read();
            if !device.is_empty() {
                item.set_ext_section("device", device.to_section());
            }
        }
        cursor.forward(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ProcessorChain;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn process_appends_device_fields() {
        let plugin = Arc::new(DeviceInfoPlugin::with_device(DeviceInfo {
            local_id: Some("some id".to_string()),
            model: Some("some model".to_string()),
            device_class: Some("some type".to_string()),
        }));
        let chain = ProcessorChain::new(vec![plugin as _]);

        let mut item = TelemetryItem::new("a name", "EventData");
        chain.process(&mut item);

        assert_eq!(
            item.ext_section("device"),
            Some(&json!({
                "localId": "some id",
                "model": "some model",
                "deviceClass": "some type",
            }))
        );
    }

    #[test]
    fn empty_device_adds_no_section() {
        let chain = ProcessorChain::new(vec![Arc::new(DeviceInfoPlugin::new()) as _]);
        let mut item = TelemetryItem::new("a name", "EventData");
        chain.process(&mut item);
        assert!(item.ext_section("device").is_none());
    }

    #[test]
    fn setters_update_the_device() {
        let plugin = DeviceInfoPlugin::new();
        plugin.set_device_id("something");
        plugin.set_device_model("model x");
        plugin.set_device_class("handheld");

        let device = plugin.device();
        assert_eq!(device.local_id.as_deref(), Some("something"));
        assert_eq!(device.model.as_deref(), Some("model x"));
        assert_eq!(device.device_class.as_deref(), Some("handheld"));
    }

    #[test]
    fn setters_are_invokable_capabilities() {
        let plugin = DeviceInfoPlugin::new();
        plugin
            .invoke("set_device_id", &[json!("dispatched id")])
            .unwrap();
        assert_eq!(plugin.device().local_id.as_deref(), Some("dispatched id"));

        let err = plugin.invoke("set_device_id", &[json!(42)]).unwrap_err();
        assert!(matches!(err, InvokeError::Failed { .. }));

        let err = plugin.invoke("reboot", &[]).unwrap_err();
        assert!(matches!(err, InvokeError::NotCallable { .. }));
    }
}
