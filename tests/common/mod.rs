//! Shared helpers for the integration tests: fixture paths and JSON
//! builders for test cases.

#![allow(dead_code)]

use serde_json::{json, Value as Json};
use std::path::PathBuf;

use verdict::actions::ActionRegistry;
use verdict::assertions::AssertionRegistry;
use verdict::config::TestCase;
use verdict::errors::Result;
use verdict::orchestrator::{Orchestrator, RunOptions, RunReport};

pub fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn unit(name: &str) -> PathBuf {
    fixture(&format!("units/{}.vs", name))
}

/// One check with the standard output templates.
pub fn check(id: i64, perform: Json, expect: Json) -> Json {
    json!({
        "check_id": id,
        "name_for_output": format!("check {}", id),
        "reason_for_output": "Expected {expected}, got {actual}",
        "explain_for_error": format!("check {} failed", id),
        "spec": { "perform": perform, "expect": expect }
    })
}

pub fn test_case(checks: Vec<Json>) -> Json {
    json!({
        "test_id": 1,
        "test_name": "integration",
        "description": "integration test case",
        "checks": checks
    })
}

pub fn parse_case(case: &Json) -> TestCase {
    TestCase::from_json_str(&case.to_string()).unwrap()
}

pub fn try_run(solution: &str, case: &Json, options: RunOptions) -> Result<RunReport> {
    let actions = ActionRegistry::with_core_actions();
    let assertions = AssertionRegistry::with_core_assertions();
    let test_case = TestCase::from_json_str(&case.to_string())?;
    Orchestrator::new(&actions, &assertions)
        .with_options(options)
        .run(&test_case, &unit(solution))
}

pub fn run(solution: &str, case: &Json) -> RunReport {
    try_run(solution, case, RunOptions::default()).unwrap()
}
