//! # Assertions
//!
//! An assertion evaluates one declared expectation against one field of an
//! `Outcome`.
//!
//! ## Module Structure
//!
//! - **`core_assertions`**: `equals`, `contains`, `is_in_range`,
//!   `is_close_to`, `is_instance_of`, `raises_exception`, `has_length`
//! - **`mock_assertions`**: `was_called`, `not_called`, `call_count`,
//!   `called_with`, `last_called_with`
//!
//! ## Design Principles
//!
//! - **Pure Checks**: `check` never fails; a value of the wrong kind is
//!   simply not a match
//! - **Errors Only at Creation**: unknown names and unusable declarations
//!   are configuration errors raised when the run is compiled

use indexmap::IndexMap;
use tracing::debug;

use crate::config::ExpectSpec;
use crate::errors::{Result, VerdictError};
use crate::script::Value;

pub mod core_assertions;
pub mod mock_assertions;

// ============================================================================
// CORE TYPES
// ============================================================================

pub trait Assertion {
    fn check(&self, actual: &Value) -> bool;
}

/// Builds an assertion from its declaration.
pub type AssertionFactory = fn(&ExpectSpec) -> Result<Box<dyn Assertion>>;

/// How an expected type is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMatcher {
    /// `"Name"`: exact runtime type name, no inheritance.
    Name(String),
    /// `{"type": "Name"}`: the named type or any subclass of it.
    Reference(String),
}

impl TypeMatcher {
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(name) => Some(Self::Name(name.clone())),
            serde_json::Value::Object(map) => map
                .get("type")
                .and_then(serde_json::Value::as_str)
                .map(|name| Self::Reference(name.to_string())),
            _ => None,
        }
    }

    pub fn matches(&self, actual: &Value) -> bool {
        match self {
            Self::Name(name) => actual.type_name() == *name,
            Self::Reference(name) => actual.type_lineage().iter().any(|n| n == name),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Clone, Default)]
pub struct AssertionRegistry {
    factories: IndexMap<String, AssertionFactory>,
}

impl AssertionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Core and mock assertions.
    pub fn with_core_assertions() -> Self {
        let mut registry = Self::new();
        core_assertions::register_core_assertions(&mut registry);
        mock_assertions::register_mock_assertions(&mut registry);
        registry
    }

    pub fn register(&mut self, name: &str, factory: AssertionFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(&self, spec: &ExpectSpec) -> Result<Box<dyn Assertion>> {
        let name = spec.assertion.trim();
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| VerdictError::UnknownAssertion {
                name: name.to_string(),
            })?;
        debug!(assertion = name, "assertion compiled");
        factory(spec)
    }
}
