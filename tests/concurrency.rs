//! Independent runs share only the registries and may execute in parallel.

mod common;

use std::thread;

use common::{fixture, unit};
use verdict::actions::ActionRegistry;
use verdict::assertions::AssertionRegistry;
use verdict::cli::{discover_test_cases, run_batch};
use verdict::orchestrator::{Orchestrator, RunOptions};

#[test]
fn discovery_finds_json_and_yaml_sorted() {
    let cases = discover_test_cases(&fixture("cases/batch")).unwrap();
    let names: Vec<String> = cases
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["fail.json", "keyword.yaml", "pass.json"]);
}

#[test]
fn batch_results_come_back_in_input_order() {
    let cases = discover_test_cases(&fixture("cases/batch")).unwrap();
    let results = run_batch(&unit("calculator"), &cases, RunOptions::default(), 2);
    let passed: Vec<bool> = results
        .iter()
        .map(|r| r.as_ref().unwrap().passed())
        .collect();
    assert_eq!(passed, [false, true, true]);
}

#[test]
fn parallel_runs_of_the_same_case_agree() {
    let actions = ActionRegistry::with_core_actions();
    let assertions = AssertionRegistry::with_core_assertions();
    let orchestrator = Orchestrator::new(&actions, &assertions);
    let solution = unit("calculator");
    let case = fixture("cases/calculator_fail.json");

    let reports: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| orchestrator.run_file(&solution, &case).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for report in &reports {
        assert_eq!(report.failed_checks(), vec![1, 2, 3]);
    }
}

#[test]
fn missing_directory_is_file_not_found() {
    let err = discover_test_cases(&fixture("cases/absent")).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
