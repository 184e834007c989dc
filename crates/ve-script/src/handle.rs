use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Map, Scope};
use tracing::{debug, warn};

use crate::bridge::dynamic_to_text;
use crate::registry::CompiledBehavior;

pub struct ScriptRuntime {
    behavior: Arc<CompiledBehavior>,
    engine: Engine,
    state: Mutex<Dynamic>,
    gate: Mutex<()>,
    in_flight: Mutex<Option<InFlight>>,
}

// The shared `this` of the `pass` currently running, and the thread running it.
struct InFlight {
    thread: ThreadId,
    this: Dynamic,
}

impl ScriptRuntime {
    pub fn new(behavior: Arc<CompiledBehavior>, engine: Engine) -> Self {
        Self {
            behavior,
            engine,
            state: Mutex::new(Dynamic::from_map(Map::new())),
            gate: Mutex::new(()),
            in_flight: Mutex::new(None),
        }
    }

    pub fn behavior(&self) -> &Arc<CompiledBehavior> {
        &self.behavior
    }

    pub fn behavior_name(&self) -> &str {
        self.behavior.name()
    }

    // Runs a state-changing function. Calls on one runtime are serialized and the
    // new state is kept only when the function returns without a fault. Getters
    // called back from host functions on the same thread see the state as the
    // function has changed it so far.
    pub fn pass(&self, function: &str, args: impl FuncArgs) -> bool {
        let _turn = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let mut this = self.state_snapshot().into_shared();
        self.set_in_flight(Some(InFlight {
            thread: thread::current().id(),
            this: this.clone(),
        }));
        let result = self.invoke(&mut this, function, args);
        self.set_in_flight(None);
        match result {
            Ok(_) => {
                *self.state.lock().unwrap_or_else(PoisonError::into_inner) = this.flatten();
                true
            }
            Err(err) => {
                self.report(function, &err);
                false
            }
        }
    }

    pub fn call(&self, function: &str) -> String {
        let mut this = self.current_state();
        match self.invoke(&mut this, function, ()) {
            Ok(value) => dynamic_to_text(&value),
            Err(err) => {
                self.report(function, &err);
                String::new()
            }
        }
    }

    // Other threads only ever see committed state.
    fn current_state(&self) -> Dynamic {
        let live = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|in_flight| in_flight.thread == thread::current().id())
            .map(|in_flight| in_flight.this.flatten_clone());
        live.unwrap_or_else(|| self.state_snapshot())
    }

    fn set_in_flight(&self, in_flight: Option<InFlight>) {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = in_flight;
    }

    pub fn state_snapshot(&self) -> Dynamic {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn invoke(
        &self,
        this: &mut Dynamic,
        function: &str,
        args: impl FuncArgs,
    ) -> Result<Dynamic, Box<EvalAltResult>> {
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(this);
        self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut Scope::new(),
            self.behavior.ast(),
            function,
            args,
        )
    }

    fn report(&self, function: &str, err: &EvalAltResult) {
        if is_missing(function, err) {
            debug!(
                target: "ve_script",
                behavior = self.behavior_name(),
                function,
                "behavior does not define function"
            );
        } else {
            warn!(
                target: "ve_script",
                behavior = self.behavior_name(),
                function,
                error = %err,
                "script call failed"
            );
        }
    }
}

fn is_missing(function: &str, err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorFunctionNotFound(signature, _) => signature
            .split(|ch: char| ch == '(' || ch.is_whitespace())
            .next()
            .is_some_and(|name| name == function),
        _ => false,
    }
}

#[cfg(test)]
mod handle_tests {
    use super::*;
    use crate::limits::{sandboxed_engine, ScriptLimits};
    use rhai::INT;
    use std::sync::{OnceLock, Weak};

    const COUNTER: &str = r#"
        fn setup() { this.count = 0; this.label = "counter"; }
        fn bump(step) { this.count += step; }
        fn explode() { this.count = 99; throw "boom"; }
        fn getCount() { this.count }
        fn getData() { #{ count: this.count } }
        fn getLabel() { this.label }
    "#;

    fn runtime(source: &str) -> ScriptRuntime {
        let engine = sandboxed_engine(&ScriptLimits::default());
        let ast = engine.compile(source).expect("test source should compile");
        ScriptRuntime::new(Arc::new(CompiledBehavior::new("counter", ast)), engine)
    }

    #[test]
    fn pass_commits_state_between_calls() {
        let runtime = runtime(COUNTER);
        assert!(runtime.pass("setup", ()));
        assert!(runtime.pass("bump", (3 as INT,)));
        assert!(runtime.pass("bump", (4 as INT,)));
        assert_eq!(runtime.call("getCount"), "7");
        assert_eq!(runtime.call("getLabel"), "counter");
    }

    #[test]
    fn faulting_pass_leaves_state_untouched() {
        let runtime = runtime(COUNTER);
        runtime.pass("setup", ());
        assert!(!runtime.pass("explode", ()));
        assert_eq!(runtime.call("getCount"), "0");
    }

    #[test]
    fn missing_function_is_a_soft_failure() {
        let runtime = runtime(COUNTER);
        assert!(!runtime.pass("tick", (1 as INT, 0 as INT)));
        assert_eq!(runtime.call("getWidth"), "");
    }

    #[test]
    fn call_does_not_commit() {
        let runtime = runtime(
            r#"
            fn setup() { this.count = 1; }
            fn sneaky() { this.count = 50; this.count }
            "#,
        );
        runtime.pass("setup", ());
        assert_eq!(runtime.call("sneaky"), "50");
        let state = runtime.state_snapshot().cast::<Map>();
        assert_eq!(state.get("count").map(|value| value.as_int()), Some(Ok(1)));
    }

    #[test]
    fn call_serializes_maps_as_json() {
        let runtime = runtime(COUNTER);
        runtime.pass("setup", ());
        assert_eq!(runtime.call("getData"), r#"{"count":0}"#);
    }

    #[test]
    fn getters_called_back_during_pass_see_uncommitted_changes() {
        let slot: Arc<OnceLock<Weak<ScriptRuntime>>> = Arc::new(OnceLock::new());
        let lookup = Arc::clone(&slot);
        let mut engine = sandboxed_engine(&ScriptLimits::default());
        engine.register_fn("peekX", move || -> String {
            lookup
                .get()
                .and_then(Weak::upgrade)
                .map(|runtime| runtime.call("getX"))
                .unwrap_or_default()
        });
        let ast = engine
            .compile(
                r#"
                fn setup() { this.x = 1.0; }
                fn step() { this.x = 3.0; this.seen = peekX(); }
                fn stepAndFail() { this.x = 9.0; this.seen = peekX(); throw "late"; }
                fn getX() { this.x }
                fn getSeen() { this.seen }
                "#,
            )
            .expect("test source should compile");
        let runtime = Arc::new(ScriptRuntime::new(
            Arc::new(CompiledBehavior::new("mover", ast)),
            engine,
        ));
        slot.set(Arc::downgrade(&runtime))
            .expect("slot should be empty");

        assert!(runtime.pass("setup", ()));
        assert!(runtime.pass("step", ()));
        assert_eq!(runtime.call("getSeen"), "3.0");
        assert_eq!(runtime.call("getX"), "3.0");

        assert!(!runtime.pass("stepAndFail", ()));
        assert_eq!(runtime.call("getX"), "3.0");
        assert!(!runtime.state_snapshot().is_shared());
    }

    #[test]
    fn missing_detection_matches_only_the_called_function() {
        let err = EvalAltResult::ErrorFunctionNotFound("tick (i64, i64)".into(), rhai::Position::NONE);
        assert!(is_missing("tick", &err));
        assert!(!is_missing("setup", &err));
    }
}
