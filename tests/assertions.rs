//! Assertion semantics, including type mismatches and mock-call checks.

use serde_json::{json, Value as Json};

use verdict::assertions::AssertionRegistry;
use verdict::config::ExpectSpec;
use verdict::errors::VerdictError;
use verdict::script::convert::from_json;
use verdict::script::exceptions::{builtin_exception_classes, new_exception};
use verdict::script::Value;

fn holds(assertion: &str, expected: Json, actual: &Value) -> bool {
    holds_spec(&ExpectSpec::new(assertion, expected), actual)
}

fn holds_spec(spec: &ExpectSpec, actual: &Value) -> bool {
    AssertionRegistry::with_core_assertions()
        .create(spec)
        .unwrap_or_else(|e| panic!("cannot create {}: {e}", spec.assertion))
        .check(actual)
}

fn exception(class_name: &str, message: &str) -> Value {
    let classes = builtin_exception_classes();
    new_exception(&classes[class_name], message)
}

#[test]
fn equals_trims_only_top_level_strings() {
    assert!(holds("equals", json!("x"), &Value::str("  x  ")));
    assert!(holds("equals", json!("x"), &Value::str("x\n")));
    assert!(!holds("equals", json!([1, "x"]), &from_json(&json!([1, " x "]))));
    assert!(holds("equals", json!([1, "x"]), &from_json(&json!([1, "x"]))));
}

#[test]
fn equals_compares_numbers_across_types() {
    assert!(holds("equals", json!(5), &Value::Float(5.0)));
    assert!(!holds("equals", json!(1), &Value::Bool(true)));
    assert!(!holds("equals", json!(5), &Value::str("5")));
}

#[test]
fn equals_with_tolerance_is_close_to() {
    let spec = ExpectSpec {
        tolerance: Some(0.01),
        ..ExpectSpec::new("equals", json!(3.14))
    };
    assert!(holds_spec(&spec, &Value::Float(3.141)));
    assert!(!holds_spec(&spec, &Value::Float(3.2)));
}

#[test]
fn is_close_to_default_and_explicit_tolerance() {
    assert!(holds("is_close_to", json!(0.3), &Value::Float(0.1 + 0.2)));
    let spec = ExpectSpec {
        tolerance: Some(0.5),
        ..ExpectSpec::new("is_close_to", json!(10))
    };
    assert!(holds_spec(&spec, &Value::Float(10.5)));
    assert!(!holds_spec(&spec, &Value::Float(10.6)));
}

#[test]
fn contains_on_strings_lists_and_dicts() {
    assert!(holds("contains", json!("ell"), &Value::str("hello")));
    assert!(holds("contains", json!(2), &from_json(&json!([1, 2, 3]))));
    assert!(holds("contains", json!("a"), &from_json(&json!({"a": 1}))));
    assert!(!holds("contains", json!("z"), &Value::Int(5)));
}

#[test]
fn is_in_range_is_inclusive_and_numeric_only() {
    let range = json!({"min": 1, "max": 10});
    assert!(holds("is_in_range", range.clone(), &Value::Int(1)));
    assert!(holds("is_in_range", range.clone(), &Value::Float(10.0)));
    assert!(!holds("is_in_range", range.clone(), &Value::Int(11)));
    assert!(!holds("is_in_range", range, &Value::str("5")));
}

#[test]
fn has_length_counts_chars_items_and_keys() {
    assert!(holds("has_length", json!(3), &Value::str("héé")));
    assert!(holds("has_length", json!(2), &from_json(&json!([1, 2]))));
    assert!(holds("has_length", json!(1), &from_json(&json!({"k": null}))));
    assert!(!holds("has_length", json!(1), &Value::Int(7)));
}

#[test]
fn is_instance_of_by_name_is_exact() {
    assert!(holds("is_instance_of", json!("int"), &Value::Int(1)));
    assert!(holds("is_instance_of", json!("str"), &Value::str("a")));
    assert!(holds("is_instance_of", json!("NoneType"), &Value::Nil));
    let error = exception("ZeroDivisionError", "division by zero");
    assert!(!holds("is_instance_of", json!("ArithmeticError"), &error));
}

#[test]
fn raises_exception_by_reference_follows_inheritance() {
    let error = exception("ZeroDivisionError", "division by zero");
    assert!(holds("raises_exception", json!("ZeroDivisionError"), &error));
    assert!(!holds("raises_exception", json!("ArithmeticError"), &error));
    assert!(holds("raises_exception", json!({"type": "ArithmeticError"}), &error));
    assert!(holds("raises_exception", json!({"type": "Exception"}), &error));
    assert!(!holds("raises_exception", json!("ZeroDivisionError"), &Value::Nil));
}

#[test]
fn unknown_assertion_is_a_configuration_error() {
    let err = AssertionRegistry::with_core_assertions()
        .create(&ExpectSpec::new("looks_right", json!(1)))
        .err()
        .expect("unknown");
    assert!(matches!(err, VerdictError::UnknownAssertion { .. }));
    assert_eq!(err.exit_code(), 3);
}

// ============================================================================
// MOCK CALLS
// ============================================================================

fn mock_spec(assertion: &str, value: Json) -> ExpectSpec {
    ExpectSpec {
        target_mock: Some("fetch".into()),
        ..ExpectSpec::new(assertion, value)
    }
}

#[test]
fn mock_call_assertions() {
    let calls = from_json(&json!({"fetch": [["a"], ["b", 2]], "idle": []}));
    assert!(holds_spec(&mock_spec("was_called", json!(null)), &calls));
    assert!(holds_spec(&mock_spec("call_count", json!(2)), &calls));
    assert!(holds_spec(&mock_spec("called_with", json!(["a"])), &calls));
    assert!(holds_spec(&mock_spec("last_called_with", json!(["b", 2])), &calls));
    assert!(!holds_spec(&mock_spec("last_called_with", json!(["a"])), &calls));
    assert!(!holds_spec(&mock_spec("not_called", json!(null)), &calls));

    let idle = ExpectSpec {
        target_mock: Some("idle".into()),
        ..ExpectSpec::new("not_called", json!(null))
    };
    assert!(holds_spec(&idle, &calls));
}

#[test]
fn mock_assertions_require_target_mock() {
    let err = AssertionRegistry::with_core_assertions()
        .create(&ExpectSpec::new("was_called", json!(null)))
        .err()
        .expect("invalid");
    assert!(matches!(err, VerdictError::InvalidParams { .. }));
}
