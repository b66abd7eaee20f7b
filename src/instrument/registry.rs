use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use super::details::{CallDetails, CallOutcome};
use super::target::Instrumentable;
use crate::error::{AttachError, InvokeError};

/// Observer invoked before the original method runs. Receives the mutable
/// call record; argument mutations are forwarded to the original.
pub type PreObserver = Arc<dyn Fn(&mut CallDetails) + Send + Sync>;

/// Observer invoked after the original method returns or fails.
pub type PostObserver = Arc<dyn Fn(&mut CallDetails, &CallOutcome) + Send + Sync>;

/// The pre/post callback pair supplied to [`HookRegistry::attach`]. Either
/// side may be omitted.
#[derive(Default, Clone)]
pub struct HookCallbacks {
    pub pre: Option<PreObserver>,
    pub post: Option<PostObserver>,
}

impl HookCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre(f: impl Fn(&mut CallDetails) + Send + Sync + 'static) -> Self {
        Self {
            pre: Some(Arc::new(f)),
            post: None,
        }
    }

    pub fn post(f: impl Fn(&mut CallDetails, &CallOutcome) + Send + Sync + 'static) -> Self {
        Self {
            pre: None,
            post: Some(Arc::new(f)),
        }
    }

    pub fn with_post(
        mut self,
        f: impl Fn(&mut CallDetails, &CallOutcome) + Send + Sync + 'static,
    ) -> Self {
        self.post = Some(Arc::new(f));
        self
    }
}

/// Proof of one attachment, returned from [`HookRegistry::attach`].
///
/// Detach is keyed by this handle: it removes exactly the observers this
/// attach registered, never another caller's observers under the same
/// (target, method) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverHandle {
    target: String,
    method: String,
    pre_id: Option<u64>,
    post_id: Option<u64>,
}

impl ObserverHandle {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

#[derive(Default)]
struct Registration {
    pre: Vec<(u64, PreObserver)>,
    post: Vec<(u64, PostObserver)>,
}

impl Registration {
    fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

/// Registration table for method interception.
///
/// The table itself is the single source of truth for "is this method
/// instrumented": re-attaching the same (target, method) appends to the
/// existing observer lists rather than wrapping a wrapper, so the original
/// method runs exactly once per call no matter how many observers are
/// stacked. When the last observer is detached the table entry disappears
/// and dispatch degenerates to a plain `invoke` — observably identical to
/// the pre-attachment target.
///
/// Observer failures are swallowed and logged; they never reach the caller
/// of the instrumented method. The original method's own failure always
/// does, unchanged.
pub struct HookRegistry {
    table: RwLock<HashMap<(String, String), Registration>>,
    next_id: AtomicU64,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach a pre- and/or post-observer to `method` on `target`.
    ///
    /// Fails with [`AttachError::TargetNotCallable`] when the method is not
    /// in the target's declared capability set; the table is left untouched
    /// in that case.
    pub fn attach(
        &self,
        target: &dyn Instrumentable,
        method: &str,
        callbacks: HookCallbacks,
    ) -> Result<ObserverHandle, AttachError> {
        if !target.instrumentable_methods().contains(&method) {
            return Err(AttachError::TargetNotCallable {
                target: target.identifier().to_string(),
                method: method.to_string(),
            });
        }

        let key = (target.identifier().to_string(), method.to_string());
        let mut table = self.table.write();
        let reg = table.entry(key).or_default();

        let pre_id = callbacks.pre.map(|cb| {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            reg.pre.push((id, cb));
            id
        });
        let post_id = callbacks.post.map(|cb| {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            reg.post.push((id, cb));
            id
        });

        debug!(
            target_id = target.identifier(),
            method, "attached observers to instrumented method"
        );

        Ok(ObserverHandle {
            target: target.identifier().to_string(),
            method: method.to_string(),
            pre_id,
            post_id,
        })
    }

    /// Remove the observers registered by `handle`. Returns `true` when at
    /// least one observer was removed. Removing the last observer for a
    /// (target, method) key drops the table entry entirely.
    pub fn detach(&self, handle: &ObserverHandle) -> bool {
        let key = (handle.target.clone(), handle.method.clone());
        let mut table = self.table.write();
        let Some(reg) = table.get_mut(&key) else {
            return false;
        };

        let before = reg.pre.len() + reg.post.len();
        if let Some(id) = handle.pre_id {
            reg.pre.retain(|(observer_id, _)| *observer_id != id);
        }
        if let Some(id) = handle.post_id {
            reg.post.retain(|(observer_id, _)| *observer_id != id);
        }
        let removed = before != reg.pre.len() + reg.post.len();

        if reg.is_empty() {
            table.remove(&key);
        }
        removed
    }

    /// Whether any observer is currently registered for (target, method).
    pub fn is_instrumented(&self, target_id: &str, method: &str) -> bool {
        self.table
            .read()
            .contains_key(&(target_id.to_string(), method.to_string()))
    }

    /// Number of observers (pre + post) registered for (target, method).
    pub fn observer_count(&self, target_id: &str, method: &str) -> usize {
        self.table
            .read()
            .get(&(target_id.to_string(), method.to_string()))
            .map(|reg| reg.pre.len() + reg.post.len())
            .unwrap_or(0)
    }

    /// Invoke `method` on `target` through the instrumentation wrapper.
    ///
    /// Uninstrumented methods take the fast path straight to `invoke`.
    /// Instrumented ones get the full sequence: build [`CallDetails`], run
    /// pre-observers in registration order, call the original with the
    /// (possibly observer-mutated) arguments, run post-observers with the
    /// captured outcome, then return that outcome unchanged.
    pub fn dispatch(
        &self,
        target: &dyn Instrumentable,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, InvokeError> {
        let key = (target.identifier().to_string(), method.to_string());
        let observers = {
            let table = self.table.read();
            table
                .get(&key)
                .map(|reg| (reg.pre.clone(), reg.post.clone()))
        };
        let Some((pre, post)) = observers else {
            return target.invoke(method, &args);
        };

        let mut details = CallDetails::new(target.identifier(), method, args);

        for (id, cb) in &pre {
            if catch_unwind(AssertUnwindSafe(|| cb(&mut details))).is_err() {
                error!(
                    target_id = %details.target,
                    method = %details.method,
                    observer = id,
                    "pre-observer panicked; continuing with original call"
                );
            }
        }

        let outcome = match target.invoke(&details.method, &details.args) {
            Ok(value) => CallOutcome::Returned(value),
            Err(err) => CallOutcome::Failed(err),
        };

        for (id, cb) in &post {
            if catch_unwind(AssertUnwindSafe(|| cb(&mut details, &outcome))).is_err() {
                error!(
                    target_id = %details.target,
                    method = %details.method,
                    observer = id,
                    "post-observer panicked; result is unaffected"
                );
            }
        }

        outcome.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    /// Test target: sums integer arguments, counts invocations.
    struct Calculator {
        calls: AtomicU32,
    }

    impl Calculator {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Instrumentable for Calculator {
        fn identifier(&self) -> &str {
            "calculator"
        }

        fn instrumentable_methods(&self) -> &[&str] {
            &["add", "fail"]
        }

        fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match method {
                "add" => {
                    let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                    Ok(json!(sum))
                }
                "fail" => Err(InvokeError::failed("calculator", "fail", "division by zero")),
                other => Err(InvokeError::NotCallable {
                    target: "calculator".to_string(),
                    method: other.to_string(),
                }),
            }
        }
    }

    fn event_log() -> (
        Arc<Mutex<Vec<String>>>,
        impl Fn(&str) -> PreObserver,
    ) {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |tag: &str| -> PreObserver {
                let log = log.clone();
                let tag = tag.to_string();
                Arc::new(move |_details: &mut CallDetails| {
                    log.lock().push(tag.clone());
                })
            }
        };
        (log, make)
    }

    #[test]
    fn uninstrumented_dispatch_is_a_plain_invoke() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();

        let result = registry.dispatch(&calc, "add", vec![json!(2), json!(3)]);
        assert_eq!(result.unwrap(), json!(5));
        assert_eq!(calc.call_count(), 1);
    }

    #[test]
    fn transparency_return_value_unchanged_after_attach() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();

        let before = registry
            .dispatch(&calc, "add", vec![json!(40), json!(2)])
            .unwrap();

        registry
            .attach(&calc, "add", HookCallbacks::pre(|_| {}))
            .unwrap();

        let after = registry
            .dispatch(&calc, "add", vec![json!(40), json!(2)])
            .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn original_failure_passes_through_unchanged() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();
        let post_saw_failure = Arc::new(AtomicU32::new(0));

        let seen = post_saw_failure.clone();
        registry
            .attach(
                &calc,
                "fail",
                HookCallbacks::post(move |_, outcome| {
                    if outcome.is_failure() {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .unwrap();

        let err = registry.dispatch(&calc, "fail", vec![]).unwrap_err();
        assert_eq!(
            err,
            InvokeError::failed("calculator", "fail", "division by zero")
        );
        assert_eq!(post_saw_failure.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attach_refused_for_undeclared_method() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();

        let err = registry
            .attach(&calc, "multiply", HookCallbacks::pre(|_| {}))
            .unwrap_err();
        assert_eq!(
            err,
            AttachError::TargetNotCallable {
                target: "calculator".to_string(),
                method: "multiply".to_string(),
            }
        );
        assert!(!registry.is_instrumented("calculator", "multiply"));
    }

    #[test]
    fn second_attach_appends_instead_of_double_wrapping() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();
        let (log, observer) = event_log();

        registry
            .attach(
                &calc,
                "add",
                HookCallbacks {
                    pre: Some(observer("p1")),
                    post: None,
                },
            )
            .unwrap();
        registry
            .attach(
                &calc,
                "add",
                HookCallbacks {
                    pre: Some(observer("p2")),
                    post: None,
                },
            )
            .unwrap();

        registry.dispatch(&calc, "add", vec![json!(1)]).unwrap();

        // Original exactly once; observers once each, in registration order.
        assert_eq!(calc.call_count(), 1);
        assert_eq!(*log.lock(), vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(registry.observer_count("calculator", "add"), 2);
    }

    #[test]
    fn detach_restores_uninstrumented_behavior() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();
        let (log, observer) = event_log();

        let handle = registry
            .attach(
                &calc,
                "add",
                HookCallbacks {
                    pre: Some(observer("p1")),
                    post: None,
                },
            )
            .unwrap();
        assert!(registry.is_instrumented("calculator", "add"));

        assert!(registry.detach(&handle));
        assert!(!registry.is_instrumented("calculator", "add"));

        let result = registry.dispatch(&calc, "add", vec![json!(7)]).unwrap();
        assert_eq!(result, json!(7));
        assert!(log.lock().is_empty());

        // Detaching again is a no-op.
        assert!(!registry.detach(&handle));
    }

    #[test]
    fn detach_removes_only_the_handles_observers() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();
        let (log, observer) = event_log();

        let first = registry
            .attach(
                &calc,
                "add",
                HookCallbacks {
                    pre: Some(observer("p1")),
                    post: None,
                },
            )
            .unwrap();
        let _second = registry
            .attach(
                &calc,
                "add",
                HookCallbacks {
                    pre: Some(observer("p2")),
                    post: None,
                },
            )
            .unwrap();

        registry.detach(&first);
        registry.dispatch(&calc, "add", vec![json!(1)]).unwrap();

        assert_eq!(*log.lock(), vec!["p2".to_string()]);
        assert!(registry.is_instrumented("calculator", "add"));
    }

    #[test]
    fn panicking_pre_observer_is_isolated() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();
        let post_ran = Arc::new(AtomicU32::new(0));

        registry
            .attach(
                &calc,
                "add",
                HookCallbacks::pre(|_| panic!("observer bug")),
            )
            .unwrap();
        let ran = post_ran.clone();
        registry
            .attach(
                &calc,
                "add",
                HookCallbacks::post(move |_, _| {
                    ran.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        let result = registry.dispatch(&calc, "add", vec![json!(5), json!(5)]);

        // Original ran, returned its value, and the post phase still fired.
        assert_eq!(result.unwrap(), json!(10));
        assert_eq!(calc.call_count(), 1);
        assert_eq!(post_ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn meta_slot_is_visible_to_later_observers() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();
        let post_saw_flag = Arc::new(AtomicU32::new(0));

        registry
            .attach(
                &calc,
                "add",
                HookCallbacks::pre(|details| details.mark_error("suspicious input")),
            )
            .unwrap();
        let saw = post_saw_flag.clone();
        registry
            .attach(
                &calc,
                "add",
                HookCallbacks::post(move |details, _| {
                    if details.has_error() {
                        saw.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .unwrap();

        registry.dispatch(&calc, "add", vec![json!(1)]).unwrap();
        assert_eq!(post_saw_flag.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pre_observer_argument_mutation_reaches_original() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();

        registry
            .attach(
                &calc,
                "add",
                HookCallbacks::pre(|details| {
                    details.args.push(json!(100));
                }),
            )
            .unwrap();

        let result = registry.dispatch(&calc, "add", vec![json!(1)]).unwrap();
        assert_eq!(result, json!(101));
    }

    #[test]
    fn pre_and_post_share_one_attachment() {
        let registry = HookRegistry::new();
        let calc = Calculator::new();

        let handle = registry
            .attach(
                &calc,
                "add",
                HookCallbacks::pre(|_| {}).with_post(|_, _| {}),
            )
            .unwrap();
        assert_eq!(registry.observer_count("calculator", "add"), 2);

        registry.detach(&handle);
        assert_eq!(registry.observer_count("calculator", "add"), 0);
        assert!(!registry.is_instrumented("calculator", "add"));
    }
}
