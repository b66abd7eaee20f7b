use serde_json::Value;

use crate::error::InvokeError;

/// A target whose methods can be intercepted by the hook registry.
///
/// Instead of reflecting over a live object's members, a target declares a
/// closed set of interceptable method names and routes calls to them through
/// `invoke`. The registry validates attachment against the declared set and
/// dispatches through `invoke`, so the target stays the sole owner of its
/// behavior; the registry only observes.
pub trait Instrumentable: Send + Sync {
    /// Stable identifier for this target, also used for sibling discovery
    /// when the target participates in a processor chain.
    fn identifier(&self) -> &str;

    /// The declared, closed set of method names observers may be attached
    /// to. Names prefixed with `_` are treated as internal and are skipped
    /// by capability enumeration unless explicitly requested.
    fn instrumentable_methods(&self) -> &[&str] {
        &[]
    }

    /// Call a declared method with an opaque argument list.
    fn invoke(&self, method: &str, _args: &[Value]) -> Result<Value, InvokeError> {
        Err(InvokeError::NotCallable {
            target: self.identifier().to_string(),
            method: method.to_string(),
        })
    }
}
