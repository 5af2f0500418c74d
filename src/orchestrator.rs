//! # Check Orchestrator
//!
//! Runs one test case against one solution:
//!
//! ```text
//! Loaded -> SettingUp -> Running(check) -> TearingDown -> Done
//! ```
//!
//! ## Failure Policy
//!
//! - **Compile**: unknown actions/assertions and bad parameters end the run
//!   before any code executes
//! - **Setup**: any failure aborts the run; no checks execute
//! - **Checks**: a failing check is recorded; a critical one (or any one,
//!   with `stop_on_first_failure`) skips the remaining checks
//! - **Teardown**: always runs; failures are logged and never change the
//!   result
//! - **File not found**: fatal wherever it occurs, after teardown ran

use std::path::Path;
use std::thread;
use tracing::{debug, debug_span, error, info, info_span, warn};

use crate::actions::{ActionRegistry, PreparedAction};
use crate::assertions::{Assertion, AssertionRegistry};
use crate::config::{Check, ExpectSpec, PerformSpec, TestCase};
use crate::context::ExecutionContext;
use crate::environment::ExecutionEnvironment;
use crate::errors::{Result, VerdictError};
use crate::formatter;
use crate::mocking::MockPlan;
use crate::outcome::Outcome;
use crate::script::UnitOptions;

/// Stack of the thread each run executes on. Unit calls nest native frames,
/// and the default depth limit needs this much room.
pub const RUN_STACK_SIZE: usize = 64 * 1024 * 1024;

// ============================================================================
// REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Loaded,
    SettingUp,
    Running(i64),
    TearingDown,
    Done,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub stop_on_first_failure: bool,
    pub unit: UnitOptions,
}

/// Expected and actual text of a failed text `equals`, for diff display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMismatch {
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub check_id: i64,
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
    pub explanation: String,
    pub mismatch: Option<TextMismatch>,
}

impl CheckResult {
    fn passed(check: &Check) -> Self {
        Self {
            check_id: check.check_id,
            name: check.name_for_output.clone(),
            passed: true,
            message: None,
            explanation: check.explain_for_error.clone(),
            mismatch: None,
        }
    }

    fn failed(check: &Check, message: String) -> Self {
        Self {
            passed: false,
            message: Some(message),
            ..Self::passed(check)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub test_id: i64,
    pub test_name: String,
    pub phase: RunPhase,
    pub total_checks: usize,
    /// Results of the checks that executed, in order.
    pub results: Vec<CheckResult>,
    pub setup_failure: Option<String>,
    /// The check whose failure skipped the rest, if any.
    pub aborted_after: Option<i64>,
}

impl RunReport {
    fn new(test_case: &TestCase) -> Self {
        Self {
            test_id: test_case.test_id,
            test_name: test_case.test_name.clone(),
            phase: RunPhase::Loaded,
            total_checks: test_case.checks.len(),
            results: Vec::new(),
            setup_failure: None,
            aborted_after: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.setup_failure.is_none() && self.results.iter().all(|r| r.passed)
    }

    pub fn failed_checks(&self) -> Vec<i64> {
        self.failures().map(|r| r.check_id).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn executed(&self) -> usize {
        self.results.len()
    }
}

// ============================================================================
// COMPILED RUN
// ============================================================================

struct CompiledExpectation<'t> {
    field: &'static str,
    spec: &'t ExpectSpec,
    assertion: Box<dyn Assertion>,
}

struct CompiledCheck<'t> {
    check: &'t Check,
    action: PreparedAction,
    expectations: Vec<CompiledExpectation<'t>>,
    mocks: MockPlan,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct Orchestrator<'r> {
    actions: &'r ActionRegistry,
    assertions: &'r AssertionRegistry,
    options: RunOptions,
}

impl<'r> Orchestrator<'r> {
    pub fn new(actions: &'r ActionRegistry, assertions: &'r AssertionRegistry) -> Self {
        Self {
            actions,
            assertions,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Loads the test case at `test_case_path` and runs it.
    pub fn run_file(&self, solution: &Path, test_case_path: &Path) -> Result<RunReport> {
        let test_case = TestCase::load(test_case_path)?;
        self.run(&test_case, solution)
    }

    /// Runs `test_case` on a thread of its own with [`RUN_STACK_SIZE`] of
    /// stack, so unit recursion reaches its depth limit and raises
    /// `RecursionError` whatever thread the caller is on.
    pub fn run(&self, test_case: &TestCase, solution: &Path) -> Result<RunReport> {
        thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name("verdict-run".into())
                .stack_size(RUN_STACK_SIZE)
                .spawn_scoped(scope, || self.run_here(test_case, solution))
                .map_err(|e| VerdictError::io(solution, e))?;
            handle.join().unwrap_or_else(|_| {
                error!("run thread panicked");
                Err(VerdictError::LoadFailure {
                    path: solution.to_path_buf(),
                    cause: "run thread panicked".into(),
                })
            })
        })
    }

    fn run_here(&self, test_case: &TestCase, solution: &Path) -> Result<RunReport> {
        let span = info_span!("run", test_id = test_case.test_id);
        let _enter = span.enter();

        let setup = self.compile_actions(&test_case.setup_actions)?;
        let checks = test_case
            .checks
            .iter()
            .map(|check| self.compile_check(check))
            .collect::<Result<Vec<_>>>()?;
        let teardown = self.compile_actions(&test_case.teardown_actions)?;

        let env = ExecutionEnvironment::prepare(solution).with_options(self.options.unit);
        let mut context = ExecutionContext::new();
        let mut report = RunReport::new(test_case);
        info!(test_name = %test_case.test_name, checks = checks.len(), "test case loaded");

        let result = self
            .set_up(&env, &mut context, &setup, &mut report)
            .and_then(|ready| {
                if ready {
                    self.run_checks(&env, &mut context, &checks, &mut report)
                } else {
                    Ok(())
                }
            });

        transition(&mut report, RunPhase::TearingDown);
        self.tear_down(&env, &mut context, &teardown);
        context.clear();
        transition(&mut report, RunPhase::Done);

        result?;
        info!(
            passed = report.passed(),
            failed = report.failed_checks().len(),
            "run finished"
        );
        Ok(report)
    }

    /// Compiles every action, assertion and mock of `test_case` without
    /// running anything.
    pub fn validate(&self, test_case: &TestCase) -> Result<()> {
        self.compile_actions(&test_case.setup_actions)?;
        for check in &test_case.checks {
            self.compile_check(check)?;
        }
        self.compile_actions(&test_case.teardown_actions)?;
        Ok(())
    }

    // --- compile -------------------------------------------------------------

    fn compile_actions(&self, specs: &[PerformSpec]) -> Result<Vec<PreparedAction>> {
        specs.iter().map(|spec| self.actions.create(spec)).collect()
    }

    fn compile_check<'t>(&self, check: &'t Check) -> Result<CompiledCheck<'t>> {
        let expectations = check
            .spec
            .expect
            .entries()
            .into_iter()
            .map(|(field, spec)| {
                Ok(CompiledExpectation {
                    field,
                    spec,
                    assertion: self.assertions.create(spec)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledCheck {
            check,
            action: self.actions.create(&check.spec.perform)?,
            expectations,
            mocks: MockPlan::compile(&check.spec.mocks)?,
        })
    }

    // --- phases --------------------------------------------------------------

    /// Returns `Ok(false)` when setup failed and checks must not run.
    fn set_up(
        &self,
        env: &ExecutionEnvironment,
        context: &mut ExecutionContext,
        setup: &[PreparedAction],
        report: &mut RunReport,
    ) -> Result<bool> {
        transition(report, RunPhase::SettingUp);
        for (index, action) in setup.iter().enumerate() {
            let number = index + 1;
            let failure = match action.run(env, context) {
                Ok(outcome) => match outcome.exception() {
                    Some(raised) => format!("Setup action {} ({}) failed: {}", number, action.name(), raised),
                    None => {
                        debug!(action = action.name(), "setup action completed");
                        continue;
                    }
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => format!("Setup action {} ({}) failed with error: {}", number, action.name(), e),
            };
            error!(%failure, "setup failed, aborting run");
            report.setup_failure = Some(failure);
            return Ok(false);
        }
        Ok(true)
    }

    fn run_checks(
        &self,
        env: &ExecutionEnvironment,
        context: &mut ExecutionContext,
        checks: &[CompiledCheck<'_>],
        report: &mut RunReport,
    ) -> Result<()> {
        for compiled in checks {
            let check = compiled.check;
            transition(report, RunPhase::Running(check.check_id));
            let span = debug_span!("check", check_id = check.check_id);
            let result = span.in_scope(|| self.execute_check(env, context, compiled))?;
            debug!(check_id = check.check_id, passed = result.passed, "check finished");

            let failed = !result.passed;
            report.results.push(result);
            if failed && (check.is_critical || self.options.stop_on_first_failure) {
                info!(
                    check_id = check.check_id,
                    critical = check.is_critical,
                    "aborting remaining checks"
                );
                report.aborted_after = Some(check.check_id);
                break;
            }
        }
        Ok(())
    }

    fn execute_check(
        &self,
        env: &ExecutionEnvironment,
        context: &mut ExecutionContext,
        compiled: &CompiledCheck<'_>,
    ) -> Result<CheckResult> {
        let check = compiled.check;
        let (staged, recorder) = compiled.mocks.stage();
        env.stage_mocks(staged);
        let executed = compiled.action.run(env, context);
        env.clear_mocks();

        let mut outcome = match executed {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(check_id = check.check_id, error = %e, "check execution failed");
                return Ok(CheckResult::failed(check, format!("Check execution failed: {}", e)));
            }
        };
        if !compiled.mocks.is_empty() {
            outcome.mock_calls = recorder.snapshot();
        }

        if let Some(raised) = outcome.exception() {
            if !check.spec.expect.expects_exception() {
                return Ok(CheckResult::failed(
                    check,
                    format!("Action failed with exception: {}", raised),
                ));
            }
        }

        for expectation in &compiled.expectations {
            let field = match expectation.spec.assertion.as_str() {
                "raises_exception" => "exception",
                _ => expectation.field,
            };
            let actual = outcome.field(field);
            if expectation.assertion.check(&actual) {
                continue;
            }
            debug!(field, assertion = %expectation.spec.assertion, "expectation failed");
            let message = formatter::render(check, &outcome);
            return Ok(CheckResult {
                mismatch: text_mismatch(expectation.spec, &outcome, field),
                ..CheckResult::failed(check, message)
            });
        }
        Ok(CheckResult::passed(check))
    }

    fn tear_down(
        &self,
        env: &ExecutionEnvironment,
        context: &mut ExecutionContext,
        teardown: &[PreparedAction],
    ) {
        for (index, action) in teardown.iter().enumerate() {
            match action.run(env, context) {
                Ok(outcome) => match outcome.exception() {
                    Some(raised) => {
                        warn!(action = action.name(), number = index + 1, exception = %raised, "teardown action failed")
                    }
                    None => debug!(action = action.name(), "teardown action completed"),
                },
                Err(e) => warn!(action = action.name(), number = index + 1, error = %e, "teardown action failed"),
            }
        }
    }
}

fn transition(report: &mut RunReport, phase: RunPhase) {
    info!(from = ?report.phase, to = ?phase, "phase transition");
    report.phase = phase;
}

fn text_mismatch(spec: &ExpectSpec, outcome: &Outcome, field: &str) -> Option<TextMismatch> {
    if spec.assertion != "equals" {
        return None;
    }
    let expected = spec.value.as_str()?;
    let actual = outcome.field(field);
    Some(TextMismatch {
        expected: expected.to_string(),
        actual: actual.as_str()?.to_string(),
    })
}
