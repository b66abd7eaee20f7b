use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::InvokeError;

/// Per-invocation record handed to every observer of an instrumented call.
///
/// Built once when the wrapper fires and scoped to that single invocation.
/// `meta` is a side channel: a pre-observer may record something there (an
/// error flag, a correlation id) and later observers of the same invocation
/// will see it. Once dispatch returns the record is dropped; observers that
/// keep a clone for asynchronous follow-up must treat it as a snapshot.
#[derive(Debug, Clone)]
pub struct CallDetails {
    /// Identifier of the instrumented target.
    pub target: String,
    /// Name of the intercepted method.
    pub method: String,
    /// The argument list, order-preserving and opaque to the registry.
    /// Pre-observers may mutate it; the original method receives the
    /// (possibly mutated) list.
    pub args: Vec<Value>,
    /// Side-channel metadata shared by observers of this invocation.
    pub meta: BTreeMap<String, Value>,
}

impl CallDetails {
    pub fn new(target: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            args,
            meta: BTreeMap::new(),
        }
    }

    /// Record a side-channel error flag visible to later observers.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.meta.insert("error".to_string(), Value::String(message.into()));
    }

    pub fn has_error(&self) -> bool {
        self.meta.contains_key("error")
    }
}

/// What the original method did, as shown to post-observers and returned to
/// the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The original method returned normally.
    Returned(Value),
    /// The original method failed. The error is re-raised to the caller
    /// unchanged after post-observers run.
    Failed(InvokeError),
}

impl CallOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CallOutcome::Failed(_))
    }

    /// The returned value, if the call succeeded.
    pub fn value(&self) -> Option<&Value> {
        match self {
            CallOutcome::Returned(v) => Some(v),
            CallOutcome::Failed(_) => None,
        }
    }

    pub(crate) fn into_result(self) -> Result<Value, InvokeError> {
        match self {
            CallOutcome::Returned(v) => Ok(v),
            CallOutcome::Failed(e) => Err(e),
        }
    }
}
