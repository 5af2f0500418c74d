//! # Core Assertions
//!
//! ## Assertions Provided
//!
//! - **Equality**: `equals` (top-level strings compared trimmed)
//! - **Membership**: `contains`, `has_length`
//! - **Numeric**: `is_in_range`, `is_close_to`
//! - **Types**: `is_instance_of`, `raises_exception`

use crate::assertions::{Assertion, AssertionRegistry, TypeMatcher};
use crate::config::ExpectSpec;
use crate::errors::Result;
use crate::script::convert::from_json;
use crate::script::Value;

/// Tolerance used by `is_close_to` when none is declared.
pub const DEFAULT_EPSILON: f64 = 1e-9;

fn close(actual: &Value, expected: &Value, tolerance: f64) -> bool {
    match (number(actual), number(expected)) {
        (Some(a), Some(e)) => (a - e).abs() <= tolerance,
        _ => false,
    }
}

/// Numeric view of ints and floats only; bools are not numbers here.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(_) | Value::Float(_) => value.as_number(),
        _ => None,
    }
}

// ============================================================================
// EQUALITY
// ============================================================================

pub struct Equals {
    expected: Value,
    tolerance: Option<f64>,
}

impl Equals {
    pub fn create(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Ok(Box::new(Self {
            expected: from_json(&spec.value),
            tolerance: spec.tolerance,
        }))
    }
}

impl Assertion for Equals {
    fn check(&self, actual: &Value) -> bool {
        if let (Some(tolerance), Some(a), Some(e)) =
            (self.tolerance, number(actual), number(&self.expected))
        {
            return (a - e).abs() <= tolerance;
        }
        match (actual, &self.expected) {
            (Value::Str(a), Value::Str(e)) => a.trim() == e.trim(),
            (a, e) => a.equals(e),
        }
    }
}

// ============================================================================
// MEMBERSHIP
// ============================================================================

pub struct Contains {
    expected: Value,
}

impl Contains {
    pub fn create(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Ok(Box::new(Self {
            expected: from_json(&spec.value),
        }))
    }
}

impl Assertion for Contains {
    fn check(&self, actual: &Value) -> bool {
        match actual {
            Value::Str(text) => match &self.expected {
                Value::Str(needle) => text.contains(needle.as_str()),
                _ => false,
            },
            Value::List(items) => items.borrow().iter().any(|item| item.equals(&self.expected)),
            Value::Dict(map) => match &self.expected {
                Value::Str(key) => map.borrow().contains_key(key),
                _ => false,
            },
            _ => false,
        }
    }
}

pub struct HasLength {
    expected: Option<usize>,
}

impl HasLength {
    pub fn create(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        let expected = spec.value.as_u64().and_then(|n| usize::try_from(n).ok());
        Ok(Box::new(Self { expected }))
    }
}

impl Assertion for HasLength {
    fn check(&self, actual: &Value) -> bool {
        match (actual.length(), self.expected) {
            (Some(length), Some(expected)) => length == expected,
            _ => false,
        }
    }
}

// ============================================================================
// NUMERIC
// ============================================================================

pub struct IsInRange {
    bounds: Option<(f64, f64)>,
}

impl IsInRange {
    pub fn create(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        let bound = |key: &str| spec.value.get(key).and_then(serde_json::Value::as_f64);
        let bounds = match (bound("min"), bound("max")) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        };
        Ok(Box::new(Self { bounds }))
    }
}

impl Assertion for IsInRange {
    fn check(&self, actual: &Value) -> bool {
        match (number(actual), self.bounds) {
            (Some(value), Some((min, max))) => min <= value && value <= max,
            _ => false,
        }
    }
}

pub struct IsCloseTo {
    expected: Value,
    tolerance: f64,
}

impl IsCloseTo {
    pub fn create(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Ok(Box::new(Self {
            expected: from_json(&spec.value),
            tolerance: spec.tolerance.unwrap_or(DEFAULT_EPSILON),
        }))
    }
}

impl Assertion for IsCloseTo {
    fn check(&self, actual: &Value) -> bool {
        close(actual, &self.expected, self.tolerance)
    }
}

// ============================================================================
// TYPES
// ============================================================================

pub struct IsInstanceOf {
    matcher: Option<TypeMatcher>,
}

impl IsInstanceOf {
    pub fn create(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Ok(Box::new(Self {
            matcher: TypeMatcher::from_json(&spec.value),
        }))
    }
}

impl Assertion for IsInstanceOf {
    fn check(&self, actual: &Value) -> bool {
        self.matcher.as_ref().is_some_and(|m| m.matches(actual))
    }
}

/// Checked against the outcome's `exception` field.
pub struct RaisesException {
    matcher: Option<TypeMatcher>,
}

impl RaisesException {
    pub fn create(spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        Ok(Box::new(Self {
            matcher: TypeMatcher::from_json(&spec.value),
        }))
    }
}

impl Assertion for RaisesException {
    fn check(&self, actual: &Value) -> bool {
        if actual.as_exception().is_none() {
            return false;
        }
        self.matcher.as_ref().is_some_and(|m| m.matches(actual))
    }
}

pub fn register_core_assertions(registry: &mut AssertionRegistry) {
    registry.register("equals", Equals::create);
    registry.register("contains", Contains::create);
    registry.register("is_in_range", IsInRange::create);
    registry.register("is_close_to", IsCloseTo::create);
    registry.register("is_instance_of", IsInstanceOf::create);
    registry.register("raises_exception", RaisesException::create);
    registry.register("has_length", HasLength::create);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assertion(name: &str, value: serde_json::Value) -> Box<dyn Assertion> {
        let registry = AssertionRegistry::with_core_assertions();
        registry.create(&ExpectSpec::new(name, value)).unwrap()
    }

    #[test]
    fn test_equals_trims_only_top_level_strings() {
        assert!(assertion("equals", json!("x")).check(&Value::str("  x  ")));
        let nested = Value::list(vec![Value::Int(1), Value::str(" x ")]);
        assert!(!assertion("equals", json!([1, "x"])).check(&nested));
    }

    #[test]
    fn test_bools_are_not_numbers() {
        assert!(!assertion("equals", json!(1)).check(&Value::Bool(true)));
        assert!(!assertion("is_in_range", json!({"min": 0, "max": 2})).check(&Value::Bool(true)));
    }

    #[test]
    fn test_close_to_is_inclusive() {
        let spec = ExpectSpec {
            tolerance: Some(0.5),
            ..ExpectSpec::new("is_close_to", json!(1.0))
        };
        let close = IsCloseTo::create(&spec).unwrap();
        assert!(close.check(&Value::Float(1.5)));
        assert!(!close.check(&Value::Float(1.6)));
    }
}
