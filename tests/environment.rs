//! Execution environment: fresh isolated loads, stream capture, identity
//! registration and load failures.

mod common;

use indexmap::IndexMap;

use common::unit;
use verdict::environment::ExecutionEnvironment;
use verdict::errors::VerdictError;
use verdict::script::{TargetUnit, Value};

fn invoke(env: &ExecutionEnvironment, name: &str, args: Vec<Value>) -> (Value, String) {
    let (result, output) = env
        .run_isolated(None, |module| module.invoke(name, args, IndexMap::new()))
        .unwrap();
    let value = result.expect("callable exists").expect("call succeeds");
    (value, output.stdout)
}

#[test]
fn module_state_does_not_leak_between_loads() {
    let env = ExecutionEnvironment::prepare(unit("counter"));
    let (first, first_out) = invoke(&env, "bump", vec![]);
    let (second, second_out) = invoke(&env, "bump", vec![]);
    assert!(first.equals(&Value::Int(1)));
    assert!(second.equals(&Value::Int(1)));
    assert_eq!(first_out, "loaded\ncount 1\n");
    assert_eq!(first_out, second_out);
}

#[test]
fn running_a_script_twice_gives_identical_output() {
    let env = ExecutionEnvironment::prepare(unit("counter"));
    let first = env.run_script(None).unwrap();
    let second = env.run_script(None).unwrap();
    assert_eq!(first.output, second.output);
    assert_eq!(first.output.stdout, "loaded\n");
}

#[test]
fn identity_is_registered_only_during_the_run() {
    let env = ExecutionEnvironment::prepare(unit("counter"));
    let (seen, _) = env
        .run_isolated(None, |module| {
            let name = module.globals.get_local("__name__");
            (env.active_units(), name)
        })
        .unwrap();
    let (active, name) = seen;
    assert_eq!(active.len(), 1);
    assert!(active[0].starts_with("unit_counter_"));
    assert_eq!(name.as_ref().and_then(Value::as_str), Some(active[0].as_str()));
    assert!(env.active_units().is_empty());
}

#[test]
fn each_load_gets_a_new_identity() {
    let env = ExecutionEnvironment::prepare(unit("counter"));
    let identity = || {
        env.run_isolated(None, |module| module.identity.clone())
            .unwrap()
            .0
    };
    assert_ne!(identity(), identity());
}

#[test]
fn stdin_and_both_streams_are_captured() {
    let env = ExecutionEnvironment::prepare(unit("greeter"));
    let run = env.run_script(Some("Ada\n")).unwrap();
    assert!(run.exception.is_none());
    assert_eq!(run.output.stdout, "Hello, Ada\n");
    assert_eq!(run.output.stderr, "done\n");
}

#[test]
fn script_exception_keeps_partial_output() {
    let env = ExecutionEnvironment::prepare(unit("failing_script"));
    let run = env.run_script(None).unwrap();
    let raised = run.exception.expect("script raises");
    assert_eq!(raised.type_name(), "ValueError");
    assert_eq!(raised.message(), "boom");
    assert_eq!(run.output.stdout, "before\n");
    assert!(env.active_units().is_empty());
}

#[test]
fn missing_file_is_file_not_found() {
    let env = ExecutionEnvironment::prepare(unit("does_not_exist"));
    let err = env.run_isolated(None, |_| ()).unwrap_err();
    assert!(matches!(err, VerdictError::FileNotFound { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn parse_error_is_a_load_failure() {
    let env = ExecutionEnvironment::prepare(unit("bad_parse"));
    let err = env.run_script(None).err().expect("parse error");
    assert!(matches!(err, VerdictError::LoadFailure { .. }), "got {err}");
    assert!(env.active_units().is_empty());
}

#[test]
fn exception_during_initialization_is_a_load_failure() {
    let env = ExecutionEnvironment::prepare(unit("init_error"));
    let err = env.run_isolated(None, |_| ()).unwrap_err();
    match &err {
        VerdictError::LoadFailure { cause, .. } => {
            assert!(cause.contains("RuntimeError: init failed"), "cause: {cause}")
        }
        other => panic!("expected load failure, got {other}"),
    }
    assert!(env.active_units().is_empty());
}

#[test]
fn identity_is_released_when_the_body_panics() {
    let env = ExecutionEnvironment::prepare(unit("counter"));
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = env.run_isolated(None, |_| panic!("body failed"));
    }));
    assert!(result.is_err());
    assert!(env.active_units().is_empty());
}
