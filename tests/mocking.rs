//! Behavior patches declared per check, and the calls they record.

mod common;

use serde_json::{json, Value as Json};

use common::{check, run, test_case, try_run};
use verdict::errors::VerdictError;
use verdict::orchestrator::RunOptions;

fn mocked_check(perform: Json, mocks: Json, expect: Json) -> Json {
    let mut check = check(1, perform, expect);
    check["spec"]["mocks"] = mocks;
    check
}

fn call(target: &str, args: Json) -> Json {
    json!({"action": "call_function", "target": target, "params": {"args": args}})
}

#[test]
fn return_value_mock_replaces_a_collaborator() {
    let case = test_case(vec![mocked_check(
        call("price-with-tax", json!(["apple"])),
        json!([{"target": "fetch-price", "behavior": {"return_value": 21}}]),
        json!({
            "return_value": {"assertion": "equals", "value": 42},
            "mock_calls": [
                {"assertion": "was_called", "target_mock": "fetch-price"},
                {"assertion": "called_with", "value": ["apple"], "target_mock": "fetch-price"},
                {"assertion": "call_count", "value": 1, "target_mock": "fetch-price"}
            ]
        }),
    )]);
    let report = run("service", &case);
    assert!(report.passed(), "failures: {:?}", report.failures().collect::<Vec<_>>());
}

#[test]
fn side_effect_sequence_cycles_then_repeats() {
    let case = test_case(vec![mocked_check(
        call("try-twice", json!(["pear"])),
        json!([{
            "target": "fetch-price",
            "behavior": {"side_effect": {"sequence": [
                {"return_value": 10},
                {"raises_exception": {"type": "ValueError", "message": "bad price"}}
            ]}}
        }]),
        json!({
            "return_value": {"assertion": "equals", "value": [10, "bad price"]},
            "mock_calls": [{"assertion": "call_count", "value": 2, "target_mock": "fetch-price"}]
        }),
    )]);
    assert!(run("service", &case).passed());
}

#[test]
fn raising_mock_defaults_to_exception() {
    let case = test_case(vec![mocked_check(
        call("price-with-tax", json!(["fig"])),
        json!([{"target": "fetch-price", "behavior": {"side_effect": {"raises_exception": {}}}}]),
        json!({"exception": {"assertion": "raises_exception", "value": "Exception"}}),
    )]);
    assert!(run("service", &case).passed());
}

#[test]
fn raising_mock_can_use_a_unit_exception_class() {
    let case = test_case(vec![mocked_check(
        call("price-with-tax", json!(["fig"])),
        json!([{
            "target": "fetch-price",
            "behavior": {"side_effect": {"raises_exception": {"type": "InvalidItem", "message": "no figs"}}}
        }]),
        json!({"exception": {"assertion": "raises_exception", "value": {"type": "ValueError"}}}),
    )]);
    assert!(run("service", &case).passed());
}

#[test]
fn return_object_mock_records_method_calls() {
    let case = test_case(vec![mocked_check(
        call("username", json!([7])),
        json!([{
            "target": "connect",
            "save_as": "client",
            "behavior": {"return_object": {
                "attributes": {"host": "db.local"},
                "methods": {"fetch": {"return_value": "grace"}}
            }}
        }]),
        json!({
            "return_value": {"assertion": "equals", "value": "grace"},
            "mock_calls": [
                {"assertion": "was_called", "target_mock": "client"},
                {"assertion": "last_called_with", "value": [7], "target_mock": "client.fetch"}
            ]
        }),
    )]);
    let report = run("service", &case);
    assert!(report.passed(), "failures: {:?}", report.failures().collect::<Vec<_>>());
}

#[test]
fn return_object_attributes_are_readable() {
    let case = test_case(vec![mocked_check(
        call("server-host", json!([])),
        json!([{
            "target": "connect",
            "behavior": {"return_object": {"attributes": {"host": "db.local"}}}
        }]),
        json!({"return_value": {"assertion": "equals", "value": "db.local"}}),
    )]);
    assert!(run("service", &case).passed());
}

#[test]
fn builtins_can_be_mocked_and_uncalled_mocks_are_tracked() {
    let case = test_case(vec![mocked_check(
        call("log-total", json!([[1, 2, 3]])),
        json!([
            {"target": "print", "behavior": {"return_value": null}},
            {"target": "fetch-price", "behavior": {"return_value": 0}}
        ]),
        json!({
            "return_value": {"assertion": "equals", "value": 6},
            "stdout": {"assertion": "equals", "value": ""},
            "mock_calls": [
                {"assertion": "called_with", "value": ["total", 6], "target_mock": "print"},
                {"assertion": "not_called", "target_mock": "fetch-price"},
                {"assertion": "call_count", "value": 0, "target_mock": "fetch-price"}
            ]
        }),
    )]);
    let report = run("service", &case);
    assert!(report.passed(), "failures: {:?}", report.failures().collect::<Vec<_>>());
}

#[test]
fn patches_are_restored_after_the_check() {
    let unmocked = check(
        2,
        call("price-with-tax", json!(["apple"])),
        json!({"exception": {"assertion": "raises_exception", "value": "ConnectionError"}}),
    );
    let case = test_case(vec![
        mocked_check(
            call("price-with-tax", json!(["apple"])),
            json!([{"target": "fetch-price", "behavior": {"return_value": 1}}]),
            json!({"return_value": {"assertion": "equals", "value": 2}}),
        ),
        unmocked,
    ]);
    assert!(run("service", &case).passed());
}

#[test]
fn mock_behavior_needs_exactly_one_kind() {
    let case = test_case(vec![mocked_check(
        call("price-with-tax", json!(["apple"])),
        json!([{"target": "fetch-price", "behavior": {"return_value": 1, "side_effect": {}}}]),
        json!({}),
    )]);
    let err = try_run("service", &case, RunOptions::default()).unwrap_err();
    assert!(matches!(err, VerdictError::InvalidParams { .. }), "got {err}");
}

#[test]
fn mocking_an_undefined_name_fails_the_check() {
    let case = test_case(vec![mocked_check(
        call("price-with-tax", json!(["apple"])),
        json!([{"target": "no-such-helper", "behavior": {"return_value": 1}}]),
        json!({}),
    )]);
    let report = run("service", &case);
    let message = report.results[0].message.clone().unwrap();
    assert!(message.contains("cannot mock 'no-such-helper'"), "{message}");
}
