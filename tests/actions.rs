//! Core actions run directly against an environment and context.

mod common;

use serde_json::json;
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

use common::unit;
use verdict::actions::ActionRegistry;
use verdict::config::PerformSpec;
use verdict::context::ExecutionContext;
use verdict::environment::ExecutionEnvironment;
use verdict::errors::{Result, VerdictError};
use verdict::outcome::Outcome;
use verdict::script::Value;

fn spec(value: serde_json::Value) -> PerformSpec {
    serde_json::from_value(value).unwrap()
}

fn perform(env: &ExecutionEnvironment, context: &mut ExecutionContext, value: serde_json::Value) -> Result<Outcome> {
    let registry = ActionRegistry::with_core_actions();
    registry.create(&spec(value))?.run(env, context)
}

fn calculator() -> (ExecutionEnvironment, ExecutionContext) {
    (ExecutionEnvironment::prepare(unit("calculator")), ExecutionContext::new())
}

// ============================================================================
// REGISTRY
// ============================================================================

#[test]
fn registry_exposes_the_core_actions() {
    let registry = ActionRegistry::with_core_actions();
    for name in [
        "run_script",
        "call_function",
        "create_object",
        "call_method",
        "get_attribute",
        "read_file_content",
    ] {
        assert!(registry.contains(name), "missing {name}");
    }
}

#[test]
fn unknown_action_is_a_configuration_error() {
    let registry = ActionRegistry::with_core_actions();
    let err = registry.create(&PerformSpec::new("teleport")).err().expect("unknown");
    assert!(matches!(err, VerdictError::UnknownAction { ref name } if name == "teleport"));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn missing_target_is_rejected_when_compiled() {
    let registry = ActionRegistry::with_core_actions();
    let err = registry.create(&PerformSpec::new("call_function")).err().expect("invalid");
    assert!(matches!(err, VerdictError::InvalidParams { .. }));
}

// ============================================================================
// CALLS
// ============================================================================

#[test]
fn call_function_returns_value_only() {
    let (env, mut context) = calculator();
    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "call_function", "target": "add", "params": {"args": [2, 3]}}),
    )
    .unwrap();
    assert!(outcome.return_value().is_some_and(|v| v.equals(&Value::Int(5))));
    assert!(outcome.exception().is_none());
}

#[test]
fn call_function_binds_keyword_arguments() {
    let (env, mut context) = calculator();
    let outcome = perform(
        &env,
        &mut context,
        json!({
            "action": "call_function",
            "target": "greet",
            "params": {"args": ["Ada"], "kwargs": {"greeting": "Hi"}}
        }),
    )
    .unwrap();
    assert_eq!(outcome.return_value().and_then(Value::as_str), Some("Hi, Ada!"));
}

#[test]
fn call_function_captures_both_streams() {
    let (env, mut context) = calculator();
    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "call_function", "target": "shout", "params": {"args": ["hey"]}}),
    )
    .unwrap();
    assert_eq!(outcome.stdout.as_deref(), Some("HEY\n"));
    assert_eq!(outcome.stderr.as_deref(), Some("warned\n"));
}

#[test]
fn raised_exception_is_captured_not_returned() {
    let (env, mut context) = calculator();
    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "call_function", "target": "divide", "params": {"args": [1, 0]}}),
    )
    .unwrap();
    assert!(outcome.return_value().is_none());
    assert_eq!(outcome.exception().map(|r| r.type_name()).as_deref(), Some("ZeroDivisionError"));
}

#[test]
fn calling_a_missing_function_is_a_harness_error() {
    let (env, mut context) = calculator();
    let err = perform(&env, &mut context, json!({"action": "call_function", "target": "nope"}))
        .unwrap_err();
    assert!(matches!(err, VerdictError::MissingMember { kind: "function", .. }));
    assert!(!err.is_fatal());
}

// ============================================================================
// OBJECTS AND CONTEXT
// ============================================================================

#[test]
fn created_objects_are_saved_and_mutated_in_place() {
    let (env, mut context) = calculator();
    perform(
        &env,
        &mut context,
        json!({"action": "create_object", "target": "Calculator", "save_as": "calc"}),
    )
    .unwrap();
    assert!(context.has("calc"));

    for args in [[1, 2], [3, 4]] {
        perform(
            &env,
            &mut context,
            json!({"action": "call_method", "target": "apply", "params": {"object_ref": "calc", "args": args}}),
        )
        .unwrap();
    }

    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "get_attribute", "target": "calls", "params": {"object_ref": "calc"}}),
    )
    .unwrap();
    assert!(outcome.return_value().is_some_and(|v| v.equals(&Value::Int(2))));
}

#[test]
fn call_method_captures_output_of_the_owning_unit() {
    let (env, mut context) = calculator();
    perform(
        &env,
        &mut context,
        json!({"action": "create_object", "target": "Calculator", "save_as": "calc"}),
    )
    .unwrap();
    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "call_method", "target": "describe", "params": {"object_ref": "calc"}}),
    )
    .unwrap();
    assert_eq!(outcome.stdout.as_deref(), Some("calls: 0\n"));
}

#[test]
fn inherited_methods_are_callable() {
    let (env, mut context) = calculator();
    perform(
        &env,
        &mut context,
        json!({"action": "create_object", "target": "ScientificCalculator", "save_as": "sci"}),
    )
    .unwrap();
    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "call_method", "target": "apply", "params": {"object_ref": "sci", "args": [2, 2]}}),
    )
    .unwrap();
    assert!(outcome.return_value().is_some_and(|v| v.equals(&Value::Int(4))));
}

#[test]
fn unknown_object_ref_is_a_missing_reference() {
    let (env, mut context) = calculator();
    let err = perform(
        &env,
        &mut context,
        json!({"action": "call_method", "target": "apply", "params": {"object_ref": "ghost"}}),
    )
    .unwrap_err();
    assert!(matches!(err, VerdictError::MissingReference { ref name } if name == "ghost"));
}

#[test]
fn missing_attribute_is_a_harness_error() {
    let (env, mut context) = calculator();
    perform(
        &env,
        &mut context,
        json!({"action": "create_object", "target": "Calculator", "save_as": "calc"}),
    )
    .unwrap();
    let err = perform(
        &env,
        &mut context,
        json!({"action": "get_attribute", "target": "colour", "params": {"object_ref": "calc"}}),
    )
    .unwrap_err();
    assert!(matches!(err, VerdictError::MissingMember { kind: "attribute", .. }));
}

#[test]
fn run_script_saves_the_module() {
    let env = ExecutionEnvironment::prepare(unit("greeter"));
    let mut context = ExecutionContext::new();
    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "run_script", "params": {"stdin": "Grace\n"}, "save_as": "script"}),
    )
    .unwrap();
    assert_eq!(outcome.stdout.as_deref(), Some("Hello, Grace\n"));
    assert!(matches!(context.get("script").unwrap(), Value::Module(_)));
}

// ============================================================================
// FILES
// ============================================================================

#[test]
fn read_file_content_decodes_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.txt");
    fs::write(&path, "line one\n").unwrap();
    let (env, mut context) = calculator();
    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "read_file_content", "target": path.to_str().unwrap()}),
    )
    .unwrap();
    assert_eq!(outcome.return_value().and_then(Value::as_str), Some("line one\n"));
}

#[test]
fn read_file_content_latin1_and_ascii() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("latin.txt");
    fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();
    let (env, mut context) = calculator();

    let latin = perform(
        &env,
        &mut context,
        json!({"action": "read_file_content", "target": path.to_str().unwrap(), "params": {"encoding": "latin-1"}}),
    )
    .unwrap();
    assert_eq!(latin.return_value().and_then(Value::as_str), Some("café"));

    let ascii = perform(
        &env,
        &mut context,
        json!({"action": "read_file_content", "target": path.to_str().unwrap(), "params": {"encoding": "ascii"}}),
    )
    .unwrap();
    assert_eq!(ascii.exception().map(|r| r.type_name()).as_deref(), Some("ValueError"));
}

#[test]
fn read_file_content_missing_file_raises() {
    let (env, mut context) = calculator();
    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "read_file_content", "target": "/definitely/not/here.txt"}),
    )
    .unwrap();
    let raised = outcome.exception().expect("captured");
    assert_eq!(raised.type_name(), "FileNotFoundError");
    assert!(raised.is_a("OSError"));
    assert!(raised.message().contains("No such file or directory"));
}

#[test]
fn read_file_content_rejects_unknown_encodings() {
    let registry = ActionRegistry::with_core_actions();
    let err = registry
        .create(&spec(json!({
            "action": "read_file_content",
            "target": "x.txt",
            "params": {"encoding": "ebcdic"}
        })))
        .err()
        .expect("invalid");
    assert!(matches!(err, VerdictError::InvalidParams { .. }));
}

#[test]
fn read_errors_use_the_shared_exception_classes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.txt");
    let (env, mut context) = calculator();
    let outcome = perform(
        &env,
        &mut context,
        json!({"action": "read_file_content", "target": path.to_str().unwrap()}),
    )
    .unwrap();
    let raised = outcome.exception().expect("exception");
    assert_eq!(raised.type_name(), "FileNotFoundError");
    assert!(raised.is_a("OSError"));
    let class = env.builtin_class("FileNotFoundError").unwrap();
    let instance = raised.exception.as_instance().unwrap();
    assert!(Rc::ptr_eq(&instance.class, &class));
}

// ============================================================================
// RETENTION
// ============================================================================

#[test]
fn only_units_owning_saved_values_stay_loaded() {
    let (env, mut context) = calculator();
    let add = json!({"action": "call_function", "target": "add", "params": {"args": [1, 2]}});
    perform(&env, &mut context, add).unwrap();
    assert!(env.retained_units().is_empty());

    let saved_sum = json!({"action": "call_function", "target": "add", "params": {"args": [1, 2]}, "save_as": "sum"});
    perform(&env, &mut context, saved_sum).unwrap();
    assert!(env.retained_units().is_empty());

    let create = json!({"action": "create_object", "target": "Calculator", "save_as": "calc"});
    perform(&env, &mut context, create).unwrap();
    assert_eq!(env.retained_units().len(), 1);

    let apply = json!({"action": "call_method", "target": "apply", "params": {"object_ref": "calc", "args": [2, 2]}});
    let outcome = perform(&env, &mut context, apply).unwrap();
    assert!(outcome.return_value().is_some_and(|v| v.equals(&Value::Int(4))));
    assert_eq!(env.retained_units().len(), 1);
}
