//! The setup/checks/teardown state machine, run end to end against the
//! fixture units.

mod common;

use serde_json::json;
use tempfile::TempDir;

use common::{check, run, test_case, try_run};
use verdict::errors::VerdictError;
use verdict::orchestrator::{RunOptions, RunPhase};
use verdict::script::UnitOptions;

fn add_check(id: i64, expected: i64) -> serde_json::Value {
    check(
        id,
        json!({"action": "call_function", "target": "add", "params": {"args": [2, 3]}}),
        json!({"return_value": {"assertion": "equals", "value": expected}}),
    )
}

// ============================================================================
// END TO END
// ============================================================================

#[test]
fn passing_check_passes_the_run() {
    let report = run("calculator", &test_case(vec![add_check(1, 5)]));
    assert!(report.passed());
    assert!(report.failed_checks().is_empty());
    assert_eq!(report.phase, RunPhase::Done);
    assert_eq!(report.executed(), 1);
}

#[test]
fn failing_check_renders_expected_and_actual() {
    let report = run("calculator", &test_case(vec![add_check(1, 10)]));
    assert!(!report.passed());
    assert_eq!(report.failed_checks(), vec![1]);
    let message = report.results[0].message.clone().unwrap();
    assert!(message.contains("10"), "message: {message}");
    assert!(message.contains('5'), "message: {message}");
    assert_eq!(report.results[0].explanation, "check 1 failed");
}

#[test]
fn text_mismatch_is_recorded_for_string_equals() {
    let case = test_case(vec![check(
        1,
        json!({"action": "call_function", "target": "greet", "params": {"args": ["Ada"]}}),
        json!({"return_value": {"assertion": "equals", "value": "Hi, Ada!"}}),
    )]);
    let report = run("calculator", &case);
    let mismatch = report.results[0].mismatch.clone().expect("text diff");
    assert_eq!(mismatch.expected, "Hi, Ada!");
    assert_eq!(mismatch.actual, "Hello, Ada!");
}

// ============================================================================
// ABORT POLICY
// ============================================================================

#[test]
fn critical_failure_skips_remaining_checks() {
    let mut critical = add_check(1, 99);
    critical["is_critical"] = json!(true);
    let report = run("calculator", &test_case(vec![critical, add_check(2, 5)]));
    assert!(!report.passed());
    assert_eq!(report.failed_checks(), vec![1]);
    assert_eq!(report.executed(), 1);
    assert_eq!(report.aborted_after, Some(1));
    assert_eq!(report.total_checks, 2);
}

#[test]
fn non_critical_failure_continues() {
    let report = run("calculator", &test_case(vec![add_check(1, 99), add_check(2, 5)]));
    assert_eq!(report.failed_checks(), vec![1]);
    assert_eq!(report.executed(), 2);
    assert!(report.results[1].passed);
}

#[test]
fn stop_on_first_failure_aborts_without_critical() {
    let options = RunOptions {
        stop_on_first_failure: true,
        ..RunOptions::default()
    };
    let case = test_case(vec![add_check(1, 99), add_check(2, 5)]);
    let report = try_run("calculator", &case, options).unwrap();
    assert_eq!(report.executed(), 1);
    assert_eq!(report.aborted_after, Some(1));
}

// ============================================================================
// SETUP AND TEARDOWN
// ============================================================================

#[test]
fn setup_exception_aborts_before_checks() {
    let mut case = test_case(vec![add_check(1, 5)]);
    case["setup_actions"] = json!([
        {"action": "call_function", "target": "divide", "params": {"args": [1, 0]}}
    ]);
    let report = run("calculator", &case);
    assert!(!report.passed());
    assert_eq!(report.executed(), 0);
    let failure = report.setup_failure.expect("setup failure");
    assert!(failure.starts_with("Setup action 1 (call_function) failed"), "{failure}");
    assert!(failure.contains("ZeroDivisionError"));
}

#[test]
fn teardown_runs_after_a_failed_check() {
    let dir = TempDir::new().unwrap();
    let note = dir.path().join("note.txt");
    let note_arg = note.to_str().unwrap();

    let mut case = test_case(vec![add_check(1, 99)]);
    case["setup_actions"] = json!([
        {"action": "call_function", "target": "write-note", "params": {"args": [note_arg, "temp"]}}
    ]);
    case["teardown_actions"] = json!([
        {"action": "call_function", "target": "cleanup", "params": {"args": [note_arg]}}
    ]);

    let report = run("calculator", &case);
    assert!(report.setup_failure.is_none());
    assert!(!report.passed());
    assert!(!note.exists(), "teardown should delete the file");
}

#[test]
fn teardown_failures_do_not_change_the_result() {
    let mut case = test_case(vec![add_check(1, 5)]);
    case["teardown_actions"] = json!([
        {"action": "call_function", "target": "divide", "params": {"args": [1, 0]}},
        {"action": "call_function", "target": "missing_function"}
    ]);
    let report = run("calculator", &case);
    assert!(report.passed());
}

// ============================================================================
// CONTEXT
// ============================================================================

#[test]
fn saved_objects_carry_state_across_checks() {
    let case = test_case(vec![
        check(
            1,
            json!({"action": "create_object", "target": "Calculator", "save_as": "calc"}),
            json!({"return_value": {"assertion": "is_instance_of", "value": "Calculator"}}),
        ),
        check(
            2,
            json!({"action": "call_method", "target": "apply", "params": {"object_ref": "calc", "args": [1, 2]}}),
            json!({"return_value": {"assertion": "equals", "value": 3}}),
        ),
        check(
            3,
            json!({"action": "call_method", "target": "apply", "params": {"object_ref": "calc", "args": [5, 5]}}),
            json!({"return_value": {"assertion": "equals", "value": 10}}),
        ),
        check(
            4,
            json!({"action": "get_attribute", "target": "calls", "params": {"object_ref": "calc"}}),
            json!({"return_value": {"assertion": "equals", "value": 2}}),
        ),
        check(
            5,
            json!({"action": "get_attribute", "target": "history", "params": {"object_ref": "calc"}}),
            json!({"return_value": {"assertion": "equals", "value": [[1, 2], [5, 5]]}}),
        ),
    ]);
    let report = run("calculator", &case);
    assert!(report.passed(), "failures: {:?}", report.failures().collect::<Vec<_>>());
}

#[test]
fn missing_reference_fails_only_that_check() {
    let case = test_case(vec![
        check(
            1,
            json!({"action": "call_method", "target": "apply", "params": {"object_ref": "calc"}}),
            json!({"return_value": {"assertion": "equals", "value": 3}}),
        ),
        add_check(2, 5),
    ]);
    let report = run("calculator", &case);
    assert_eq!(report.failed_checks(), vec![1]);
    let message = report.results[0].message.clone().unwrap();
    assert!(message.starts_with("Check execution failed:"), "{message}");
    assert!(message.contains("calc"));
}

// ============================================================================
// EXCEPTIONS
// ============================================================================

#[test]
fn expected_exception_passes() {
    let case = test_case(vec![check(
        1,
        json!({"action": "call_function", "target": "divide", "params": {"args": [1, 0]}}),
        json!({"exception": {"assertion": "raises_exception", "value": {"type": "ArithmeticError"}}}),
    )]);
    assert!(run("calculator", &case).passed());
}

#[test]
fn raises_exception_under_return_value_checks_the_exception() {
    let case = test_case(vec![check(
        1,
        json!({"action": "call_function", "target": "divide", "params": {"args": [1, 0]}}),
        json!({"return_value": {"assertion": "raises_exception", "value": "ZeroDivisionError"}}),
    )]);
    assert!(run("calculator", &case).passed());
}

#[test]
fn unexpected_exception_fails_before_other_expectations() {
    let case = test_case(vec![check(
        1,
        json!({"action": "call_function", "target": "divide", "params": {"args": [1, 0]}}),
        json!({"stdout": {"assertion": "equals", "value": ""}}),
    )]);
    let report = run("calculator", &case);
    let message = report.results[0].message.clone().unwrap();
    assert_eq!(
        message,
        "Action failed with exception: ZeroDivisionError: division by zero"
    );
}

#[test]
fn default_recursion_limit_is_a_captured_exception() {
    let case = test_case(vec![check(
        1,
        json!({"action": "call_function", "target": "forever", "params": {"args": [0]}}),
        json!({"exception": {"assertion": "raises_exception", "value": "RecursionError"}}),
    )]);
    let report = try_run("calculator", &case, RunOptions::default()).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures().collect::<Vec<_>>());
}

#[test]
fn custom_recursion_limit_is_a_captured_exception() {
    let case = test_case(vec![check(
        1,
        json!({"action": "call_function", "target": "forever", "params": {"args": [0]}}),
        json!({"exception": {"assertion": "raises_exception", "value": "RecursionError"}}),
    )]);
    let options = RunOptions {
        unit: UnitOptions {
            max_depth: 40,
            ..UnitOptions::default()
        },
        ..RunOptions::default()
    };
    assert!(try_run("calculator", &case, options).unwrap().passed());
}

#[test]
fn self_containing_return_value_is_checked_and_rendered() {
    let case = test_case(vec![
        check(
            1,
            json!({"action": "call_function", "target": "self-loop"}),
            json!({"return_value": {"assertion": "equals", "value": [1, [1]]}}),
        ),
        check(
            2,
            json!({"action": "call_function", "target": "self-loop"}),
            json!({"return_value": {"assertion": "contains", "value": 1}}),
        ),
    ]);
    let report = run("calculator", &case);
    assert_eq!(report.failed_checks(), vec![1]);
    let message = report.results[0].message.clone().unwrap();
    assert_eq!(message, "Expected [1, [1]], got [1, [...]]");
}

#[test]
fn run_script_is_dual_channel() {
    let case = test_case(vec![check(
        1,
        json!({"action": "run_script"}),
        json!({
            "stdout": {"assertion": "contains", "value": "before"},
            "exception": {"assertion": "raises_exception", "value": "ValueError"}
        }),
    )]);
    assert!(run("failing_script", &case).passed());
}

#[test]
fn stdin_reaches_the_script() {
    let case = test_case(vec![check(
        1,
        json!({"action": "run_script", "params": {"stdin": "Ada\n"}}),
        json!({
            "stdout": {"assertion": "equals", "value": "Hello, Ada"},
            "stderr": {"assertion": "contains", "value": "done"}
        }),
    )]);
    assert!(run("greeter", &case).passed());
}

// ============================================================================
// FATAL ERRORS
// ============================================================================

#[test]
fn unknown_action_fails_before_anything_runs() {
    let case = test_case(vec![check(1, json!({"action": "teleport"}), json!({}))]);
    let err = try_run("calculator", &case, RunOptions::default()).unwrap_err();
    assert!(matches!(err, VerdictError::UnknownAction { .. }));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn unknown_assertion_fails_before_anything_runs() {
    let case = test_case(vec![check(
        1,
        json!({"action": "call_function", "target": "add"}),
        json!({"return_value": {"assertion": "is_good"}}),
    )]);
    let err = try_run("calculator", &case, RunOptions::default()).unwrap_err();
    assert!(matches!(err, VerdictError::UnknownAssertion { .. }));
}

#[test]
fn missing_solution_is_fatal() {
    let err = try_run("no_such_unit", &test_case(vec![add_check(1, 5)]), RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, VerdictError::FileNotFound { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn load_failure_fails_the_check() {
    let case = test_case(vec![check(
        1,
        json!({"action": "call_function", "target": "anything"}),
        json!({}),
    )]);
    let report = run("init_error", &case);
    let message = report.results[0].message.clone().unwrap();
    assert!(message.contains("RuntimeError: init failed"), "{message}");
}
