//! The Verdict Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands. It parses
//! arguments, installs logging, and maps every result to a process exit
//! code:
//!
//! | code | meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | all checks passed                         |
//! | 1    | at least one check failed                 |
//! | 2    | a file was not found                      |
//! | 3    | malformed test case or configuration      |
//! | 10   | unexpected error                          |

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use walkdir::WalkDir;

use crate::actions::ActionRegistry;
use crate::assertions::AssertionRegistry;
use crate::cli::args::{Command, VerdictArgs};
use crate::cli::output::{BatchLine, ReportStyle};
use crate::config::{AppConfig, TestCase};
use crate::errors::{print_error, Result, VerdictError};
use crate::logging::{self, LogLevel};
use crate::orchestrator::{Orchestrator, RunOptions, RunReport};
use crate::script::UnitOptions;

pub mod args;
pub mod output;

pub const EXIT_PASSED: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_UNEXPECTED: i32 = 10;

/// The main entry point for the CLI.
pub fn run() {
    let args = VerdictArgs::parse();

    let code = match args.command {
        Command::Run {
            solution,
            test_case,
            log,
            quiet,
            no_verdict,
            max_messages,
            stop_on_first_failure,
            seed,
        } => {
            let config = AppConfig {
                log_level: log,
                quiet,
                show_verdict: !no_verdict,
                max_messages,
                stop_on_first_failure,
                seed,
                ..AppConfig::new(solution, test_case)
            };
            handle_run(&config)
        }
        Command::Validate { test_case } => handle_validate(&test_case),
        Command::Init { name, output } => handle_init(&name, &output),
        Command::Batch {
            solution,
            dir,
            log,
            jobs,
            seed,
        } => handle_batch(&solution, &dir, log, jobs, seed),
    };

    process::exit(code);
}

fn exit_with(error: VerdictError) -> i32 {
    let code = error.exit_code();
    print_error(error);
    code
}

// ============================================================================
// RUN
// ============================================================================

fn handle_run(config: &AppConfig) -> i32 {
    logging::init(config.log_level);
    let actions = ActionRegistry::with_core_actions();
    let assertions = AssertionRegistry::with_core_assertions();
    let options = config.run_options();

    let report = match Orchestrator::new(&actions, &assertions)
        .with_options(options)
        .run_file(&config.solution_path, &config.test_case_path)
    {
        Ok(report) => report,
        Err(e) => return exit_with(e),
    };

    if !config.quiet {
        let style = ReportStyle {
            show_verdict: config.show_verdict,
            max_messages: config.max_messages,
        };
        let mut out = output::stdout();
        if let Err(e) = output::print_report(&mut out, &report, style) {
            return exit_with(VerdictError::io("<stdout>", e));
        }
    }
    if report.passed() {
        EXIT_PASSED
    } else {
        EXIT_FAILED
    }
}

// ============================================================================
// VALIDATE
// ============================================================================

fn handle_validate(path: &Path) -> i32 {
    match validate_file(path) {
        Ok(test_case) => {
            let mocks: usize = test_case.checks.iter().map(|c| c.spec.mocks.len()).sum();
            println!(
                "✓ {} (test {}): {} checks, {} setup actions, {} teardown actions, {} mocks",
                test_case.test_name,
                test_case.test_id,
                test_case.checks.len(),
                test_case.setup_actions.len(),
                test_case.teardown_actions.len(),
                mocks
            );
            EXIT_PASSED
        }
        Err(e) => exit_with(e),
    }
}

/// Loads a test case and compiles it against the core registries.
fn validate_file(path: &Path) -> Result<TestCase> {
    let test_case = TestCase::load(path)?;
    let actions = ActionRegistry::with_core_actions();
    let assertions = AssertionRegistry::with_core_assertions();
    Orchestrator::new(&actions, &assertions).validate(&test_case)?;
    Ok(test_case)
}

// ============================================================================
// INIT
// ============================================================================

const SAMPLE_SOLUTION: &str = r#"; A small calculator unit.

(define (add a b) (+ a b))

(define (divide a b) (/ a b))

(class Calculator ()
  (define (init self)
    (set! self.history (list)))
  (define (apply self a b)
    (append! self.history (list a b))
    (add a b)))
"#;

const SAMPLE_TEST_CASE: &str = r#"{
  "test_id": 1,
  "test_name": "Calculator basics",
  "description": "Checks add, divide and the Calculator class.",
  "checks": [
    {
      "check_id": 1,
      "name_for_output": "add(2, 3)",
      "reason_for_output": "Expected {expected}, got {actual}",
      "explain_for_error": "add should return the sum of its arguments.",
      "is_critical": true,
      "spec": {
        "perform": { "action": "call_function", "target": "add", "params": { "args": [2, 3] } },
        "expect": { "return_value": { "assertion": "equals", "value": 5 } }
      }
    },
    {
      "check_id": 2,
      "name_for_output": "divide by zero",
      "reason_for_output": "Expected an exception, got {actual}",
      "explain_for_error": "Dividing by zero should raise ZeroDivisionError.",
      "spec": {
        "perform": { "action": "call_function", "target": "divide", "params": { "args": [1, 0] } },
        "expect": { "exception": { "assertion": "raises_exception", "value": "ZeroDivisionError" } }
      }
    },
    {
      "check_id": 3,
      "name_for_output": "Calculator.apply",
      "reason_for_output": "Expected {expected}, got {actual}",
      "explain_for_error": "apply should add its arguments.",
      "spec": {
        "perform": { "action": "create_object", "target": "Calculator", "save_as": "calc" },
        "expect": { "return_value": { "assertion": "is_instance_of", "value": "Calculator" } }
      }
    },
    {
      "check_id": 4,
      "name_for_output": "calc.apply(4, 6)",
      "reason_for_output": "Expected {expected}, got {actual}",
      "explain_for_error": "apply should add its arguments.",
      "spec": {
        "perform": { "action": "call_method", "target": "apply", "params": { "object_ref": "calc", "args": [4, 6] } },
        "expect": { "return_value": { "assertion": "equals", "value": 10 } }
      }
    }
  ]
}
"#;

fn sample_readme(name: &str) -> String {
    format!(
        "# {name}\n\n\
         Solutions live in `solutions/`, test cases in `test_cases/`.\n\n\
         ```sh\n\
         verdict run solutions/calculator.vs test_cases/calculator.json\n\
         verdict batch solutions/calculator.vs test_cases\n\
         ```\n"
    )
}

fn handle_init(name: &str, output: &Path) -> i32 {
    match scaffold(name, output) {
        Ok(root) => {
            println!("Created project at {}", root.display());
            EXIT_PASSED
        }
        Err(e) => exit_with(e),
    }
}

fn scaffold(name: &str, output: &Path) -> Result<PathBuf> {
    let root = output.join(name);
    if root.exists() {
        return Err(VerdictError::io(
            &root,
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "directory already exists"),
        ));
    }
    let files = [
        (root.join("solutions").join("calculator.vs"), SAMPLE_SOLUTION.to_string()),
        (root.join("test_cases").join("calculator.json"), SAMPLE_TEST_CASE.to_string()),
        (root.join("README.md"), sample_readme(name)),
    ];
    for (path, contents) in files {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| VerdictError::io(parent, e))?;
        }
        fs::write(&path, contents).map_err(|e| VerdictError::io(&path, e))?;
    }
    Ok(root)
}

// ============================================================================
// BATCH
// ============================================================================

/// Test case files under `dir`, sorted by path.
pub fn discover_test_cases(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(VerdictError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| VerdictError::io(dir, e.into()))?;
        let is_case = matches!(
            entry.path().extension().and_then(|e| e.to_str()),
            Some("json" | "yaml" | "yml")
        );
        if entry.file_type().is_file() && is_case {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Runs every test case in `cases` against `solution`, at most `jobs` at a
/// time. Results come back in input order.
pub fn run_batch(
    solution: &Path,
    cases: &[PathBuf],
    options: RunOptions,
    jobs: usize,
) -> Vec<Result<RunReport>> {
    let actions = ActionRegistry::with_core_actions();
    let assertions = AssertionRegistry::with_core_assertions();
    let orchestrator = Orchestrator::new(&actions, &assertions).with_options(options);
    let jobs = match jobs {
        0 => thread::available_parallelism().map_or(1, |n| n.get()),
        n => n,
    };

    let mut results = Vec::with_capacity(cases.len());
    for chunk in cases.chunks(jobs) {
        thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|case| {
                    let orchestrator = &orchestrator;
                    scope.spawn(move || orchestrator.run_file(solution, case))
                })
                .collect();
            for (handle, case) in handles.into_iter().zip(chunk) {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(VerdictError::LoadFailure {
                        path: case.clone(),
                        cause: "run thread panicked".into(),
                    })
                });
                results.push(result);
            }
        });
    }
    results
}

fn handle_batch(solution: &Path, dir: &Path, log: LogLevel, jobs: usize, seed: Option<u64>) -> i32 {
    logging::init(log);
    let cases = match discover_test_cases(dir) {
        Ok(cases) => cases,
        Err(e) => return exit_with(e),
    };
    let options = RunOptions {
        stop_on_first_failure: false,
        unit: UnitOptions {
            seed,
            ..UnitOptions::default()
        },
    };

    let results = run_batch(solution, &cases, options, jobs);
    let mut out = output::stdout();
    let mut code = EXIT_PASSED;
    for (case, result) in cases.iter().zip(&results) {
        let path = case.display().to_string();
        let line = match result {
            Ok(report) => {
                if !report.passed() {
                    code = EXIT_FAILED;
                }
                BatchLine::Finished { path: &path, report }
            }
            Err(e) => {
                code = EXIT_FAILED;
                BatchLine::Errored {
                    path: &path,
                    error: e.to_string(),
                }
            }
        };
        if let Err(e) = output::print_batch_line(&mut out, line) {
            return exit_with(VerdictError::io("<stdout>", e));
        }
    }
    println!(
        "{} test cases, {} passed",
        results.len(),
        results.iter().filter(|r| r.as_ref().is_ok_and(|r| r.passed())).count()
    );
    code
}
