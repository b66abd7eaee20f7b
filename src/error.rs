use thiserror::Error;

/// Errors raised while attaching observers to a target method.
///
/// Attachment is all-or-nothing: when attach fails the registration table
/// is left untouched and the target behaves exactly as before.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The method is not in the target's declared capability set, so there
    /// is nothing callable to instrument.
    #[error("target `{target}` has no callable method `{method}`")]
    TargetNotCallable { target: String, method: String },
}

/// Errors surfaced by dispatching a call through the hook registry.
///
/// `Failed` carries the instrumented method's own failure and crosses the
/// instrumentation boundary unchanged; observer failures never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// The target does not expose the requested method.
    #[error("method `{method}` is not callable on `{target}`")]
    NotCallable { target: String, method: String },

    /// The original method itself failed. Re-raised verbatim so a caller
    /// cannot distinguish an instrumented call from an uninstrumented one.
    #[error("`{target}.{method}` failed: {message}")]
    Failed {
        target: String,
        method: String,
        message: String,
    },
}

impl InvokeError {
    pub fn failed(
        target: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        InvokeError::Failed {
            target: target.into(),
            method: method.into(),
            message: message.into(),
        }
    }
}
