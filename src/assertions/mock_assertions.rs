//! # Mock Assertions
//!
//! Evaluated against the outcome's `mock_calls` dict; each one names the
//! mock it inspects with `target_mock`.

use crate::assertions::{Assertion, AssertionRegistry};
use crate::config::ExpectSpec;
use crate::errors::{Result, VerdictError};
use crate::script::convert::from_json;
use crate::script::Value;

fn target_mock(spec: &ExpectSpec) -> Result<String> {
    spec.target_mock
        .clone()
        .ok_or_else(|| VerdictError::invalid_params(&spec.assertion, "`target_mock` is required"))
}

/// Recorded argument lists of one mock; `None` if it was never staged.
fn calls_of(actual: &Value, name: &str) -> Option<Vec<Value>> {
    let Value::Dict(map) = actual else {
        return None;
    };
    let calls = match map.borrow().get(name) {
        Some(Value::List(calls)) => Some(calls.borrow().clone()),
        _ => None,
    };
    calls
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallCheck {
    WasCalled,
    NotCalled,
    CallCount,
    CalledWith,
    LastCalledWith,
}

pub struct MockCallAssertion {
    kind: CallCheck,
    target: String,
    expected: Value,
}

impl MockCallAssertion {
    fn build(spec: &ExpectSpec, kind: CallCheck) -> Result<Box<dyn Assertion>> {
        Ok(Box::new(Self {
            kind,
            target: target_mock(spec)?,
            expected: from_json(&spec.value),
        }))
    }

    pub fn was_called(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Self::build(spec, CallCheck::WasCalled)
    }

    pub fn not_called(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Self::build(spec, CallCheck::NotCalled)
    }

    pub fn call_count(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Self::build(spec, CallCheck::CallCount)
    }

    pub fn called_with(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Self::build(spec, CallCheck::CalledWith)
    }

    pub fn last_called_with(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Self::build(spec, CallCheck::LastCalledWith)
    }
}

impl Assertion for MockCallAssertion {
    fn check(&self, actual: &Value) -> bool {
        let calls = calls_of(actual, &self.target);
        match self.kind {
            CallCheck::WasCalled => calls.is_some_and(|c| !c.is_empty()),
            CallCheck::NotCalled => calls.map_or(true, |c| c.is_empty()),
            CallCheck::CallCount => match (calls, &self.expected) {
                (Some(c), Value::Int(n)) => i64::try_from(c.len()).is_ok_and(|len| len == *n),
                (None, Value::Int(0)) => true,
                _ => false,
            },
            CallCheck::CalledWith => calls.is_some_and(|c| c.iter().any(|call| call.equals(&self.expected))),
            CallCheck::LastCalledWith => calls
                .and_then(|c| c.last().cloned())
                .is_some_and(|call| call.equals(&self.expected)),
        }
    }
}

pub fn register_mock_assertions(registry: &mut AssertionRegistry) {
    registry.register("was_called", MockCallAssertion::was_called);
    registry.register("not_called", MockCallAssertion::not_called);
    registry.register("call_count", MockCallAssertion::call_count);
    registry.register("called_with", MockCallAssertion::called_with);
    registry.register("last_called_with", MockCallAssertion::last_called_with);
}
