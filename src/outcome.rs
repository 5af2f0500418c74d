//! The normalized record every action produces.

use indexmap::IndexMap;

use crate::mocking::MockCalls;
use crate::script::{CapturedOutput, EvalResult, Raised, Value};

/// How the tested code finished.
#[derive(Debug, Clone, Default)]
pub enum Completion {
    Value(Value),
    Exception(Raised),
    /// The action has no return channel (`run_script`).
    #[default]
    Empty,
}

/// Everything observable from one action.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub completion: Completion,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub mock_calls: MockCalls,
    /// Handle of the unit loaded by `run_script`, for `save_as`.
    pub unit: Option<Value>,
}

impl Outcome {
    pub fn from_result(result: EvalResult) -> Self {
        let completion = match result {
            Ok(value) => Completion::Value(value),
            Err(raised) => Completion::Exception(raised),
        };
        Self {
            completion,
            ..Self::default()
        }
    }

    pub fn value(value: Value) -> Self {
        Self::from_result(Ok(value))
    }

    pub fn with_output(mut self, output: CapturedOutput) -> Self {
        self.stdout = Some(output.stdout);
        self.stderr = Some(output.stderr);
        self
    }

    pub fn return_value(&self) -> Option<&Value> {
        match &self.completion {
            Completion::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn exception(&self) -> Option<&Raised> {
        match &self.completion {
            Completion::Exception(raised) => Some(raised),
            _ => None,
        }
    }

    /// The value `save_as` stores: a non-nil return value, else the unit.
    pub fn saveable(&self) -> Option<Value> {
        match self.return_value() {
            Some(value) if !value.is_nil() => Some(value.clone()),
            _ => self.unit.clone(),
        }
    }

    /// Reads one outcome field as a script value. Absent fields are `nil`.
    pub fn field(&self, name: &str) -> Value {
        let text = |s: &Option<String>| s.clone().map(Value::Str).unwrap_or_default();
        match name {
            "return_value" => self.return_value().cloned().unwrap_or_default(),
            "stdout" => text(&self.stdout),
            "stderr" => text(&self.stderr),
            "exception" => self
                .exception()
                .map(|raised| raised.exception.clone())
                .unwrap_or_default(),
            "mock_calls" => mock_calls_value(&self.mock_calls),
            _ => Value::Nil,
        }
    }
}

/// `mock_calls` as a dict of name to list of argument lists.
pub fn mock_calls_value(calls: &MockCalls) -> Value {
    let entries: IndexMap<String, Value> = calls
        .iter()
        .map(|(name, calls)| {
            let calls = calls.iter().map(|args| Value::list(args.clone())).collect();
            (name.clone(), Value::list(calls))
        })
        .collect();
    Value::dict(entries)
}
